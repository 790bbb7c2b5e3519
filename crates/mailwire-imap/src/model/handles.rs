//! Checked handles into a session's object graph.
//!
//! Messages and mailboxes never hold references back to their session.
//! They carry ids that the session validates on every use.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for logs.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Identifies one selection of a mailbox on one session.
///
/// The generation changes on every SELECT, EXAMINE, CLOSE or UNSELECT, so a
/// handle from an earlier selection is detectably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MailboxHandle {
    /// Owning session.
    pub session: SessionId,
    /// Selection generation.
    pub generation: u64,
}

/// Identifies one message slot within a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MessageRef {
    /// Selection the message belongs to.
    pub mailbox: MailboxHandle,
    /// Index into the selection's message table.
    pub slot: usize,
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

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
