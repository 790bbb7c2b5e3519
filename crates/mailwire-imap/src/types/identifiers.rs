//! Protocol identifiers: command tags, sequence numbers, UIDs and mod-sequences.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Command tag correlating a command with its tagged completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a new tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Wraps `n`, returning `None` for zero.
            #[must_use]
            pub const fn new(n: u32) -> Option<Self> {
                match NonZeroU32::new(n) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            /// Returns the raw value.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// 1-based position of a message in the selected mailbox.
    ///
    /// Shifts down by one for every expunge of a lower-numbered message.
    SeqNum
);

nonzero_id!(
    /// Stable message identifier within one UIDVALIDITY epoch.
    Uid
);

nonzero_id!(
    /// Mailbox epoch; cached UIDs are meaningless once it changes.
    UidValidity
);

/// CONDSTORE modification sequence (RFC 7162), a 63-bit unsigned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModSeq(pub u64);

impl ModSeq {
    /// Largest value the protocol allows.
    pub const MAX: u64 = i64::MAX as u64;

    /// Wraps `n`, returning `None` when it exceeds the 63-bit range.
    #[must_use]
    pub const fn new(n: u64) -> Option<Self> {
        if n > Self::MAX { None } else { Some(Self(n)) }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ModSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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

    mod tag_tests {
        use super::*;

        #[test]
        fn display_matches_text() {
            let tag = Tag::new("A0007");
            assert_eq!(tag.as_str(), "A0007");
            assert_eq!(tag.to_string(), "A0007");
        }
    }

    mod nonzero_tests {
        use super::*;

        #[test]
        fn zero_is_rejected() {
            assert!(SeqNum::new(0).is_none());
            assert!(Uid::new(0).is_none());
            assert!(UidValidity::new(0).is_none());
        }

        #[test]
        fn max_is_accepted() {
            assert_eq!(Uid::new(u32::MAX).unwrap().get(), u32::MAX);
        }

        #[test]
        fn ordering_follows_value() {
            assert!(SeqNum::new(3).unwrap() < SeqNum::new(9).unwrap());
        }

        #[test]
        fn serializes_transparently() {
            let json = serde_json::to_string(&Uid::new(42).unwrap()).unwrap();
            assert_eq!(json, "42");
        }
    }

    mod mod_seq_tests {
        use super::*;

        #[test]
        fn rejects_values_above_63_bits() {
            assert!(ModSeq::new(ModSeq::MAX).is_some());
            assert!(ModSeq::new(ModSeq::MAX + 1).is_none());
        }
    }
}
