//! Cached message attributes.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::handles::MessageRef;
use crate::parser::{BodyStructure, Envelope, FetchItem};
use crate::types::{Flags, ModSeq, SeqNum, Uid};

/// Which attributes have been fetched for a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Fetched {
    /// UID
    pub uid: bool,
    /// FLAGS
    pub flags: bool,
    /// ENVELOPE
    pub envelope: bool,
    /// BODYSTRUCTURE
    pub body_structure: bool,
    /// INTERNALDATE
    pub internal_date: bool,
    /// RFC822.SIZE
    pub size: bool,
    /// MODSEQ
    pub mod_seq: bool,
}

/// One row of a selection's message table.
#[derive(Debug, Clone, Default)]
pub(crate) struct MessageEntry {
    /// `None` once expunged.
    pub seq: Option<SeqNum>,
    pub uid: Option<Uid>,
    pub flags: Option<Flags>,
    pub envelope: Option<Box<Envelope>>,
    pub body_structure: Option<BodyStructure>,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub size: Option<u32>,
    pub mod_seq: Option<ModSeq>,
}

/// Result of merging FETCH items into an entry.
pub(crate) struct Merge {
    /// Flags before the merge, when they were known and changed.
    pub flags_changed: bool,
    /// UID before the merge, when it differed.
    pub old_uid: Option<Uid>,
}

impl MessageEntry {
    pub fn live(seq: SeqNum) -> Self {
        Self {
            seq: Some(seq),
            ..Self::default()
        }
    }

    pub const fn is_vanished(&self) -> bool {
        self.seq.is_none()
    }

    /// Merges FETCH data. FLAGS replaces the cached set wholesale.
    pub fn merge(&mut self, items: Vec<FetchItem>) -> Merge {
        let mut merge = Merge {
            flags_changed: false,
            old_uid: None,
        };
        for item in items {
            match item {
                FetchItem::Flags(flags) => {
                    merge.flags_changed |= self
                        .flags
                        .as_ref()
                        .is_some_and(|old| !old.same_members(&flags));
                    self.flags = Some(flags);
                }
                FetchItem::Uid(uid) => {
                    if self.uid.is_some_and(|old| old != uid) {
                        merge.old_uid = self.uid;
                    }
                    self.uid = Some(uid);
                }
                FetchItem::Envelope(envelope) => self.envelope = Some(envelope),
                FetchItem::BodyStructure(structure) => self.body_structure = Some(structure),
                FetchItem::InternalDate(date) => self.internal_date = Some(date),
                FetchItem::Rfc822Size(size) => self.size = Some(size),
                FetchItem::ModSeq(mod_seq) => self.mod_seq = Some(mod_seq),
                // Bodies are returned to the caller, never cached.
                FetchItem::Body { .. } => {}
            }
        }
        merge
    }

    pub const fn fetched(&self) -> Fetched {
        Fetched {
            uid: self.uid.is_some(),
            flags: self.flags.is_some(),
            envelope: self.envelope.is_some(),
            body_structure: self.body_structure.is_some(),
            internal_date: self.internal_date.is_some(),
            size: self.size.is_some(),
            mod_seq: self.mod_seq.is_some(),
        }
    }

    pub fn snapshot(&self, handle: MessageRef) -> Message {
        Message {
            handle,
            sequence: self.seq,
            uid: self.uid,
            flags: self.flags.clone(),
            envelope: self.envelope.clone(),
            body_structure: self.body_structure.clone(),
            internal_date: self.internal_date,
            size: self.size,
            mod_seq: self.mod_seq,
        }
    }
}

/// Point-in-time view of a message.
///
/// Pass [`handle`](Self::handle) back to the session to operate on it; the
/// session resolves it against the live table, so a snapshot taken before
/// an EXPUNGE still addresses the right message (or fails with
/// [`Error::MessageDeleted`](crate::Error::MessageDeleted)).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Handle for later operations.
    pub handle: MessageRef,
    /// Sequence number at snapshot time; `None` if expunged.
    pub sequence: Option<SeqNum>,
    /// UID, if fetched.
    pub uid: Option<Uid>,
    /// Last known flags.
    pub flags: Option<Flags>,
    /// ENVELOPE, if fetched.
    pub envelope: Option<Box<Envelope>>,
    /// BODYSTRUCTURE, if fetched.
    pub body_structure: Option<BodyStructure>,
    /// INTERNALDATE, if fetched.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// RFC822.SIZE, if fetched.
    pub size: Option<u32>,
    /// MODSEQ, if fetched.
    pub mod_seq: Option<ModSeq>,
}

impl Message {
    /// Returns true if the message was expunged.
    #[must_use]
    pub const fn is_vanished(&self) -> bool {
        self.sequence.is_none()
    }

    /// Which attributes were present at snapshot time.
    #[must_use]
    pub const fn fetched(&self) -> Fetched {
        Fetched {
            uid: self.uid.is_some(),
            flags: self.flags.is_some(),
            envelope: self.envelope.is_some(),
            body_structure: self.body_structure.is_some(),
            internal_date: self.internal_date.is_some(),
            size: self.size.is_some(),
            mod_seq: self.mod_seq.is_some(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::types::Flag;

    fn flags(list: &[Flag]) -> Flags {
        list.iter().cloned().collect()
    }

    #[test]
    fn flags_replace_wholesale() {
        let mut entry = MessageEntry::live(SeqNum::new(1).unwrap());
        let first = entry.merge(vec![FetchItem::Flags(flags(&[Flag::Seen]))]);
        assert!(!first.flags_changed, "first sighting is not a change");

        let second = entry.merge(vec![FetchItem::Flags(flags(&[Flag::Flagged]))]);
        assert!(second.flags_changed);
        assert_eq!(entry.flags, Some(flags(&[Flag::Flagged])));

        let same = entry.merge(vec![FetchItem::Flags(flags(&[Flag::Flagged]))]);
        assert!(!same.flags_changed);
    }

    #[test]
    fn fetched_bits_follow_cache() {
        let mut entry = MessageEntry::live(SeqNum::new(3).unwrap());
        entry.merge(vec![
            FetchItem::Uid(Uid::new(30).unwrap()),
            FetchItem::Rfc822Size(100),
            FetchItem::Body {
                section: None,
                origin: None,
                data: Some(b"x".to_vec()),
            },
        ]);
        let fetched = entry.fetched();
        assert!(fetched.uid && fetched.size);
        assert!(!fetched.flags && !fetched.envelope);
    }
}
