//! The selected mailbox and its message table.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::handles::{MailboxHandle, MessageRef};
use super::message::{Message, MessageEntry};
use crate::command::{StoreAction, StoreMode};
use crate::error::{Error, Result, Violation};
use crate::events::ChangeEvent;
use crate::parser::FetchItem;
use crate::types::{
    Flags, Mailbox, ModSeq, ResponseCode, SeqNum, SequenceSet, Uid, UidValidity,
};

/// Snapshot of the selected mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedMailbox {
    /// Handle for this selection.
    pub handle: MailboxHandle,
    /// Full name.
    pub name: Mailbox,
    /// Opened with EXAMINE, or the server answered `[READ-ONLY]`.
    pub read_only: bool,
    /// EXISTS
    pub exists: u32,
    /// RECENT
    pub recent: u32,
    /// Sequence number of the first unseen message.
    pub first_unseen: Option<SeqNum>,
    /// UIDVALIDITY
    pub uid_validity: Option<UidValidity>,
    /// UIDNEXT
    pub uid_next: Option<Uid>,
    /// HIGHESTMODSEQ
    pub highest_mod_seq: Option<ModSeq>,
    /// The server answered `[NOMODSEQ]`.
    pub no_mod_seq: bool,
    /// FLAGS
    pub applicable_flags: Flags,
    /// PERMANENTFLAGS
    pub permanent_flags: Flags,
    /// The server answered `[UIDNOTSTICKY]`.
    pub uid_not_sticky: bool,
}

/// Live state of the selected mailbox.
///
/// Slots are never reused within a selection, so a [`MessageRef`] keeps
/// pointing at the same message however the sequence numbers shift.
#[derive(Debug)]
pub(crate) struct SelectedMailbox {
    pub handle: MailboxHandle,
    pub name: Mailbox,
    pub read_only: bool,
    pub exists: u32,
    pub recent: u32,
    pub first_unseen: Option<SeqNum>,
    pub uid_validity: Option<UidValidity>,
    pub uid_next: Option<Uid>,
    pub highest_mod_seq: Option<ModSeq>,
    pub no_mod_seq: bool,
    pub applicable_flags: Flags,
    pub permanent_flags: Flags,
    pub uid_not_sticky: bool,
    entries: Vec<MessageEntry>,
    /// Slots of materialized messages by sequence number. Sparse: EXISTS
    /// alone never allocates.
    by_seq: BTreeMap<u32, usize>,
    by_uid: HashMap<Uid, usize>,
    /// Messages present at the last [`mark_arrivals`](Self::mark_arrivals)
    /// that are still present; everything above is new.
    baseline: u32,
}

impl SelectedMailbox {
    pub fn new(handle: MailboxHandle, name: Mailbox, read_only: bool) -> Self {
        Self {
            handle,
            name,
            read_only,
            exists: 0,
            recent: 0,
            first_unseen: None,
            uid_validity: None,
            uid_next: None,
            highest_mod_seq: None,
            no_mod_seq: false,
            applicable_flags: Flags::new(),
            permanent_flags: Flags::new(),
            uid_not_sticky: false,
            entries: Vec::new(),
            by_seq: BTreeMap::new(),
            by_uid: HashMap::new(),
            baseline: 0,
        }
    }

    pub fn snapshot(&self) -> OpenedMailbox {
        OpenedMailbox {
            handle: self.handle,
            name: self.name.clone(),
            read_only: self.read_only,
            exists: self.exists,
            recent: self.recent,
            first_unseen: self.first_unseen,
            uid_validity: self.uid_validity,
            uid_next: self.uid_next,
            highest_mod_seq: self.highest_mod_seq,
            no_mod_seq: self.no_mod_seq,
            applicable_flags: self.applicable_flags.clone(),
            permanent_flags: self.permanent_flags.clone(),
            uid_not_sticky: self.uid_not_sticky,
        }
    }

    const fn message_ref(&self, slot: usize) -> MessageRef {
        MessageRef {
            mailbox: self.handle,
            slot,
        }
    }

    pub fn message(&self, slot: usize) -> Option<Message> {
        self.entries
            .get(slot)
            .map(|entry| entry.snapshot(self.message_ref(slot)))
    }

    pub fn entry(&self, slot: usize) -> Option<&MessageEntry> {
        self.entries.get(slot)
    }

    /// Checks that `handle` addresses a live message of this selection.
    pub fn resolve(&self, handle: MessageRef) -> Result<usize> {
        if handle.mailbox.session != self.handle.session {
            return Err(Violation::CrossSession.into());
        }
        if handle.mailbox.generation != self.handle.generation {
            return Err(Error::MailboxClosed);
        }
        let entry = self
            .entries
            .get(handle.slot)
            .ok_or(Error::ProtocolViolation(Violation::StaleHandle))?;
        if entry.is_vanished() {
            return Err(Error::MessageDeleted);
        }
        Ok(handle.slot)
    }

    pub fn slot_for_uid(&self, uid: Uid) -> Option<usize> {
        self.by_uid.get(&uid).copied()
    }

    pub fn slot_for_seq(&self, seq: SeqNum) -> Option<usize> {
        self.by_seq.get(&seq.get()).copied()
    }

    /// Materialized live messages in sequence order.
    pub fn live_messages(&self) -> Vec<Message> {
        self.by_seq
            .values()
            .filter_map(|&slot| self.message(slot))
            .collect()
    }

    /// Starts counting arrivals from the current message count.
    pub const fn mark_arrivals(&mut self) {
        self.baseline = self.exists;
    }

    /// Sequence numbers of messages that arrived since
    /// [`mark_arrivals`](Self::mark_arrivals), net of expunges.
    pub fn arrivals(&self) -> Option<SequenceSet> {
        if self.exists > self.baseline {
            SequenceSet::range(self.baseline + 1, self.exists)
        } else {
            None
        }
    }

    fn push_entry(&mut self, entry: MessageEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Marks the slot vanished and returns its final snapshot.
    fn vanish(&mut self, slot: Option<usize>) -> Option<Message> {
        let slot = slot.unwrap_or_else(|| self.push_entry(MessageEntry::default()));
        let entry = self.entries.get_mut(slot)?;
        entry.seq = None;
        if let Some(uid) = entry.uid {
            self.by_uid.remove(&uid);
        }
        self.message(slot)
    }

    /// `* n EXPUNGE`: vanish message `n` and shift everything above it down.
    pub fn apply_expunge(&mut self, seq: SeqNum, events: &mut Vec<ChangeEvent>) {
        let n = seq.get();
        if n > self.exists {
            tracing::warn!(seq = n, exists = self.exists, "EXPUNGE beyond mailbox size");
            return;
        }
        let later = self.by_seq.split_off(&(n + 1));
        let slot = self.by_seq.remove(&n);
        let removed = self.vanish(slot);
        for (above, slot) in later {
            let shifted = above - 1;
            if let Some(entry) = self.entries.get_mut(slot) {
                entry.seq = SeqNum::new(shifted);
            }
            self.by_seq.insert(shifted, slot);
        }
        if n <= self.baseline {
            self.baseline -= 1;
        }

        let old = self.exists;
        self.exists -= 1;
        events.extend(removed.map(|m| ChangeEvent::MessagesDeleted { messages: vec![m] }));
        events.push(ChangeEvent::ExistsChanged {
            old,
            new: self.exists,
        });
    }

    /// `* n EXISTS`. A shrinking count expunges the messages above `n`.
    pub fn apply_exists(&mut self, count: u32, events: &mut Vec<ChangeEvent>) {
        let old = self.exists;
        if count == old {
            return;
        }
        if count < old {
            tracing::warn!(old, new = count, "EXISTS decreased without EXPUNGE");
            let tail = self.by_seq.split_off(&(count + 1));
            let removed: Vec<_> = tail
                .into_values()
                .filter_map(|slot| self.vanish(Some(slot)))
                .collect();
            if !removed.is_empty() {
                events.push(ChangeEvent::MessagesDeleted { messages: removed });
            }
            self.baseline = self.baseline.min(count);
        }
        self.exists = count;
        events.push(ChangeEvent::ExistsChanged { old, new: count });
    }

    /// `* n FETCH (...)`: merge into the message at `n`, creating it if needed.
    pub fn apply_fetch(
        &mut self,
        seq: SeqNum,
        items: Vec<FetchItem>,
        events: &mut Vec<ChangeEvent>,
    ) -> usize {
        if seq.get() > self.exists {
            self.apply_exists(seq.get(), events);
        }
        let slot = match self.by_seq.get(&seq.get()) {
            Some(&slot) => slot,
            None => {
                let slot = self.push_entry(MessageEntry::live(seq));
                self.by_seq.insert(seq.get(), slot);
                slot
            }
        };

        let entry = &mut self.entries[slot];
        let merge = entry.merge(items);
        let (uid, mod_seq) = (entry.uid, entry.mod_seq);
        let flags = entry.flags.clone();

        if let Some(old) = merge.old_uid {
            self.by_uid.remove(&old);
        }
        if let Some(uid) = uid {
            self.by_uid.insert(uid, slot);
        }
        if let Some(mod_seq) = mod_seq {
            self.advance_mod_seq(mod_seq, events);
        }
        if merge.flags_changed {
            if let Some(flags) = flags {
                events.push(ChangeEvent::FlagsChanged {
                    message: self.message_ref(slot),
                    uid,
                    flags,
                });
            }
        }
        slot
    }

    /// Applies a STORE the server will not echo (`.SILENT`).
    pub fn apply_silent_store(
        &mut self,
        slot: usize,
        action: &StoreAction,
        events: &mut Vec<ChangeEvent>,
    ) {
        let message = self.message_ref(slot);
        let Some(entry) = self.entries.get_mut(slot) else {
            return;
        };
        let updated = match (action.mode, entry.flags.as_ref()) {
            (StoreMode::Replace, _) => action.flags.clone(),
            (StoreMode::Add, Some(current)) => {
                let mut flags = current.clone();
                flags.union_with(&action.flags);
                flags
            }
            (StoreMode::Remove, Some(current)) => {
                let mut flags = current.clone();
                flags.subtract(&action.flags);
                flags
            }
            // Cannot derive the result from unknown flags.
            (_, None) => return,
        };
        let changed = entry
            .flags
            .as_ref()
            .is_some_and(|old| !old.same_members(&updated));
        entry.flags = Some(updated.clone());
        if changed {
            events.push(ChangeEvent::FlagsChanged {
                message,
                uid: entry.uid,
                flags: updated,
            });
        }
    }

    pub fn apply_recent(&mut self, count: u32, events: &mut Vec<ChangeEvent>) {
        if count != self.recent {
            events.push(ChangeEvent::RecentChanged {
                old: self.recent,
                new: count,
            });
            self.recent = count;
        }
    }

    pub fn apply_flags(&mut self, flags: Flags, events: &mut Vec<ChangeEvent>) {
        if !flags.same_members(&self.applicable_flags) {
            let old = std::mem::replace(&mut self.applicable_flags, flags.clone());
            events.push(ChangeEvent::ApplicableFlagsChanged { old, new: flags });
        }
    }

    fn advance_mod_seq(&mut self, mod_seq: ModSeq, events: &mut Vec<ChangeEvent>) {
        if self.highest_mod_seq.is_none_or(|current| mod_seq > current) {
            events.push(ChangeEvent::HighestModSeqChanged {
                old: self.highest_mod_seq,
                new: mod_seq,
            });
            self.highest_mod_seq = Some(mod_seq);
        }
    }

    /// Applies mailbox-level response codes.
    pub fn apply_code(&mut self, code: &ResponseCode, events: &mut Vec<ChangeEvent>) {
        match code {
            ResponseCode::UidValidity(validity) => {
                if self.uid_validity.is_some_and(|old| old != *validity) {
                    tracing::warn!(mailbox = %self.name, "UIDVALIDITY changed, forgetting cached UIDs");
                    for entry in &mut self.entries {
                        entry.uid = None;
                    }
                    self.by_uid.clear();
                }
                self.uid_validity = Some(*validity);
            }
            ResponseCode::UidNext(uid) => self.uid_next = Some(*uid),
            ResponseCode::Unseen(seq) => self.first_unseen = Some(*seq),
            ResponseCode::PermanentFlags(flags) => {
                if !flags.same_members(&self.permanent_flags) {
                    let old = std::mem::replace(&mut self.permanent_flags, flags.clone());
                    events.push(ChangeEvent::PermanentFlagsChanged {
                        old,
                        new: flags.clone(),
                    });
                }
            }
            ResponseCode::HighestModSeq(mod_seq) => self.advance_mod_seq(*mod_seq, events),
            ResponseCode::NoModSeq => self.no_mod_seq = true,
            ResponseCode::UidNotSticky => self.uid_not_sticky = true,
            ResponseCode::ReadOnly => self.read_only = true,
            ResponseCode::ReadWrite => self.read_only = false,
            _ => {}
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
    use crate::model::SessionId;
    use crate::types::Flag;
    use proptest::prelude::*;

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn mailbox_with(count: u32) -> SelectedMailbox {
        let handle = MailboxHandle {
            session: SessionId::next(),
            generation: 1,
        };
        let mut mailbox = SelectedMailbox::new(handle, Mailbox::inbox(), false);
        let mut events = Vec::new();
        mailbox.apply_exists(count, &mut events);
        for n in 1..=count {
            mailbox.apply_fetch(seq(n), vec![FetchItem::Uid(uid(n * 10))], &mut events);
        }
        mailbox
    }

    mod expunge_tests {
        use super::*;

        #[test]
        fn renumbers_later_messages() {
            let mut mailbox = mailbox_with(4);
            let mut events = Vec::new();
            mailbox.apply_expunge(seq(2), &mut events);

            assert_eq!(mailbox.exists, 3);
            let live: Vec<_> = mailbox
                .live_messages()
                .into_iter()
                .map(|m| (m.sequence.unwrap().get(), m.uid.unwrap().get()))
                .collect();
            assert_eq!(live, vec![(1, 10), (2, 30), (3, 40)]);
            assert!(mailbox.slot_for_uid(uid(20)).is_none());

            match &events[0] {
                ChangeEvent::MessagesDeleted { messages } => {
                    assert_eq!(messages[0].uid, Some(uid(20)));
                    assert!(messages[0].is_vanished());
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(events[1], ChangeEvent::ExistsChanged { old: 4, new: 3 });
        }

        #[test]
        fn batch_observes_prior_shifts() {
            let mut mailbox = mailbox_with(5);
            let mut events = Vec::new();
            // "3 EXPUNGE, 3 EXPUNGE" removes original 3 then original 4.
            mailbox.apply_expunge(seq(3), &mut events);
            mailbox.apply_expunge(seq(3), &mut events);
            let uids: Vec<_> = mailbox
                .live_messages()
                .iter()
                .map(|m| m.uid.unwrap().get())
                .collect();
            assert_eq!(uids, vec![10, 20, 50]);
        }

        #[test]
        fn unmaterialized_expunge_still_reports() {
            let handle = MailboxHandle {
                session: SessionId::next(),
                generation: 1,
            };
            let mut mailbox = SelectedMailbox::new(handle, Mailbox::inbox(), false);
            let mut events = Vec::new();
            mailbox.apply_exists(3, &mut events);
            events.clear();
            mailbox.apply_expunge(seq(1), &mut events);
            assert_eq!(mailbox.exists, 2);
            assert!(matches!(&events[0], ChangeEvent::MessagesDeleted { messages } if messages[0].uid.is_none()));
        }

        #[test]
        fn out_of_range_is_ignored() {
            let mut mailbox = mailbox_with(1);
            let mut events = Vec::new();
            mailbox.apply_expunge(seq(5), &mut events);
            assert_eq!(mailbox.exists, 1);
            assert!(events.is_empty());
        }

        #[test]
        fn shrinking_exists_vanishes_tail() {
            let mut mailbox = mailbox_with(4);
            let tail = mailbox.slot_for_uid(uid(40)).unwrap();
            let mut events = Vec::new();
            mailbox.apply_exists(2, &mut events);
            assert!(mailbox.entry(tail).unwrap().is_vanished());
            assert_eq!(mailbox.live_messages().len(), 2);
            match &events[0] {
                ChangeEvent::MessagesDeleted { messages } => assert_eq!(messages.len(), 2),
                other => panic!("unexpected {other:?}"),
            }
        }

        proptest! {
            #[test]
            fn renumbering_invariant(n in 1u32..40, picks in proptest::collection::vec(any::<u32>(), 0..40)) {
                let mut mailbox = mailbox_with(n);
                let slots: Vec<usize> = (1..=n).map(|i| mailbox.slot_for_uid(uid(i * 10)).unwrap()).collect();
                let mut events = Vec::new();
                let mut removed = Vec::new();
                for pick in picks {
                    if mailbox.exists == 0 {
                        break;
                    }
                    let target = seq(pick % mailbox.exists + 1);
                    removed.push(mailbox.slot_for_seq(target).unwrap());
                    mailbox.apply_expunge(target, &mut events);
                }
                let k = removed.len() as u32;
                let live = mailbox.live_messages();
                prop_assert_eq!(live.len() as u32, n - k);
                for (i, message) in live.iter().enumerate() {
                    prop_assert_eq!(message.sequence.unwrap().get(), i as u32 + 1);
                }
                for (i, slot) in slots.iter().enumerate() {
                    let entry = mailbox.entry(*slot).unwrap();
                    prop_assert_eq!(entry.uid, Some(uid((i as u32 + 1) * 10)));
                    prop_assert_eq!(entry.is_vanished(), removed.contains(slot));
                }
            }
        }
    }

    mod arrival_tests {
        use super::*;

        #[test]
        fn largest_exists_materializes_nothing() {
            let mut mailbox = mailbox_with(2);
            let mut events = Vec::new();
            mailbox.apply_exists(u32::MAX, &mut events);
            assert_eq!(mailbox.exists, u32::MAX);
            assert_eq!(mailbox.live_messages().len(), 2);
            assert_eq!(events, vec![ChangeEvent::ExistsChanged { old: 2, new: u32::MAX }]);

            mailbox.apply_fetch(seq(u32::MAX), vec![FetchItem::Uid(uid(7))], &mut events);
            assert_eq!(mailbox.slot_for_uid(uid(7)), mailbox.slot_for_seq(seq(u32::MAX)));
            mailbox.apply_expunge(seq(1), &mut events);
            assert_eq!(
                mailbox.message(mailbox.slot_for_uid(uid(7)).unwrap()).unwrap().sequence,
                SeqNum::new(u32::MAX - 1)
            );
        }

        #[test]
        fn expunge_then_exists_still_counts_the_new_message() {
            let mut mailbox = mailbox_with(2);
            mailbox.mark_arrivals();
            let mut events = Vec::new();
            mailbox.apply_expunge(seq(1), &mut events);
            mailbox.apply_exists(2, &mut events);
            assert_eq!(mailbox.arrivals(), SequenceSet::range(2, 2));
        }

        #[test]
        fn expunging_a_new_message_cancels_it() {
            let mut mailbox = mailbox_with(2);
            mailbox.mark_arrivals();
            let mut events = Vec::new();
            mailbox.apply_exists(4, &mut events);
            mailbox.apply_expunge(seq(4), &mut events);
            mailbox.apply_expunge(seq(1), &mut events);
            assert_eq!(mailbox.exists, 2);
            assert_eq!(mailbox.arrivals(), SequenceSet::range(2, 2));
            mailbox.apply_exists(1, &mut events);
            assert_eq!(mailbox.arrivals(), None);
        }
    }

    mod fetch_tests {
        use super::*;

        fn flags(list: &[Flag]) -> Flags {
            list.iter().cloned().collect()
        }

        #[test]
        fn fetch_beyond_exists_grows_mailbox() {
            let mut mailbox = mailbox_with(2);
            let mut events = Vec::new();
            mailbox.apply_fetch(seq(3), vec![FetchItem::Uid(uid(99))], &mut events);
            assert_eq!(mailbox.exists, 3);
            assert_eq!(events[0], ChangeEvent::ExistsChanged { old: 2, new: 3 });
        }

        #[test]
        fn flags_change_event_only_on_difference() {
            let mut mailbox = mailbox_with(1);
            let mut events = Vec::new();
            mailbox.apply_fetch(seq(1), vec![FetchItem::Flags(flags(&[Flag::Seen]))], &mut events);
            assert!(events.is_empty());
            mailbox.apply_fetch(seq(1), vec![FetchItem::Flags(flags(&[Flag::Seen]))], &mut events);
            assert!(events.is_empty());
            mailbox.apply_fetch(seq(1), vec![FetchItem::Flags(flags(&[Flag::Flagged]))], &mut events);
            assert!(matches!(
                &events[0],
                ChangeEvent::FlagsChanged { uid: Some(u), flags: f, .. }
                    if u.get() == 10 && f.same_members(&flags(&[Flag::Flagged]))
            ));
        }

        #[test]
        fn silent_store_modes() {
            let mut mailbox = mailbox_with(1);
            let mut events = Vec::new();
            let slot = mailbox.apply_fetch(seq(1), vec![FetchItem::Flags(flags(&[Flag::Seen]))], &mut events);

            mailbox.apply_silent_store(slot, &StoreAction::add(flags(&[Flag::Draft])), &mut events);
            assert!(mailbox.entry(slot).unwrap().flags.as_ref().unwrap().same_members(&flags(&[Flag::Seen, Flag::Draft])));

            mailbox.apply_silent_store(slot, &StoreAction::remove(flags(&[Flag::Seen])), &mut events);
            assert!(mailbox.entry(slot).unwrap().flags.as_ref().unwrap().same_members(&flags(&[Flag::Draft])));

            mailbox.apply_silent_store(slot, &StoreAction::replace(flags(&[Flag::Flagged])), &mut events);
            assert!(mailbox.entry(slot).unwrap().flags.as_ref().unwrap().same_members(&flags(&[Flag::Flagged])));
            assert_eq!(events.len(), 3);
        }

        #[test]
        fn mod_seq_only_advances() {
            let mut mailbox = mailbox_with(1);
            let mut events = Vec::new();
            mailbox.apply_code(&ResponseCode::HighestModSeq(ModSeq::new(10).unwrap()), &mut events);
            mailbox.apply_code(&ResponseCode::HighestModSeq(ModSeq::new(5).unwrap()), &mut events);
            assert_eq!(mailbox.highest_mod_seq, ModSeq::new(10));
            assert_eq!(events.len(), 1);
        }

        #[test]
        fn uid_validity_change_forgets_uids() {
            let mut mailbox = mailbox_with(2);
            let mut events = Vec::new();
            mailbox.apply_code(&ResponseCode::UidValidity(UidValidity::new(1).unwrap()), &mut events);
            assert!(mailbox.slot_for_uid(uid(10)).is_some());
            mailbox.apply_code(&ResponseCode::UidValidity(UidValidity::new(2).unwrap()), &mut events);
            assert!(mailbox.slot_for_uid(uid(10)).is_none());
        }
    }

    mod handle_tests {
        use super::*;

        #[test]
        fn resolution_errors() {
            let mut mailbox = mailbox_with(2);
            let slot = mailbox.slot_for_uid(uid(10)).unwrap();
            let good = MessageRef {
                mailbox: mailbox.handle,
                slot,
            };
            assert_eq!(mailbox.resolve(good).unwrap(), slot);

            let foreign = MessageRef {
                mailbox: MailboxHandle {
                    session: SessionId::next(),
                    generation: 1,
                },
                slot,
            };
            assert!(matches!(
                mailbox.resolve(foreign),
                Err(Error::ProtocolViolation(Violation::CrossSession))
            ));

            let stale = MessageRef {
                mailbox: MailboxHandle {
                    generation: 0,
                    ..mailbox.handle
                },
                slot,
            };
            assert!(matches!(mailbox.resolve(stale), Err(Error::MailboxClosed)));

            let bogus = MessageRef { slot: 99, ..good };
            assert!(matches!(
                mailbox.resolve(bogus),
                Err(Error::ProtocolViolation(Violation::StaleHandle))
            ));

            let mut events = Vec::new();
            mailbox.apply_expunge(seq(1), &mut events);
            assert!(matches!(mailbox.resolve(good), Err(Error::MessageDeleted)));
        }
    }
}
