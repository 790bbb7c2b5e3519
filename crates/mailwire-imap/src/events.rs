//! Change notifications published during response dispatch.
//!
//! IMAP servers push state at any response boundary: new messages arrive,
//! others are expunged, flags change under another client. The session
//! applies these to its model and then hands a [`ChangeEvent`] to every
//! registered [`ChangeListener`], synchronously and in wire order.
//!
//! # Example
//!
//! ```
//! use mailwire_imap::events::{ChangeEvent, ChangeListener};
//!
//! struct Counter {
//!     arrivals: u32,
//! }
//!
//! impl ChangeListener for Counter {
//!     fn on_change(&mut self, event: &ChangeEvent) {
//!         if let ChangeEvent::ExistsChanged { old, new } = event {
//!             self.arrivals += new.saturating_sub(*old);
//!         }
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::model::{MailboxHandle, Message, MessageRef, OpenedMailbox};
use crate::types::{Flags, ModSeq, Uid};

/// A change to session or mailbox state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChangeEvent {
    /// The selected mailbox's message count changed.
    ExistsChanged {
        /// Previous count.
        old: u32,
        /// New count.
        new: u32,
    },
    /// The RECENT count changed.
    RecentChanged {
        /// Previous count.
        old: u32,
        /// New count.
        new: u32,
    },
    /// A message's flags differ from what was cached.
    FlagsChanged {
        /// The message.
        message: MessageRef,
        /// Its UID, if known.
        uid: Option<Uid>,
        /// The new flag set.
        flags: Flags,
    },
    /// Messages were expunged. The snapshots are already marked vanished.
    MessagesDeleted {
        /// The removed messages.
        messages: Vec<Message>,
    },
    /// The server sent an `[ALERT]`, which must be shown to the user.
    AlertReceived {
        /// Alert text.
        text: String,
    },
    /// The mailbox's FLAGS vocabulary changed.
    ApplicableFlagsChanged {
        /// Previous set.
        old: Flags,
        /// New set.
        new: Flags,
    },
    /// PERMANENTFLAGS changed.
    PermanentFlagsChanged {
        /// Previous set.
        old: Flags,
        /// New set.
        new: Flags,
    },
    /// HIGHESTMODSEQ advanced.
    HighestModSeqChanged {
        /// Previous value.
        old: Option<ModSeq>,
        /// New value.
        new: ModSeq,
    },
    /// A mailbox was selected.
    MailboxOpened {
        /// Snapshot taken when SELECT/EXAMINE completed.
        mailbox: OpenedMailbox,
    },
    /// The selected mailbox was closed, explicitly or by selecting another.
    MailboxClosed {
        /// The selection that ended.
        mailbox: MailboxHandle,
    },
    /// The session lost its connection.
    Disconnected {
        /// BYE text, if the server said goodbye.
        text: Option<String>,
    },
}

/// Receives change notifications.
///
/// Called on the task driving the session, while the session's exchange is
/// in progress. Implementations must not block.
pub trait ChangeListener: Send {
    /// Called once per change, in the order the server reported them.
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: FnMut(&ChangeEvent) + Send,
{
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event);
    }
}

/// Forwards every change to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ChangeListener for LoggingListener {
    fn on_change(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::ExistsChanged { old, new } => {
                tracing::debug!(old, new, "message count changed");
            }
            ChangeEvent::RecentChanged { old, new } => {
                tracing::debug!(old, new, "recent count changed");
            }
            ChangeEvent::FlagsChanged { uid, flags, .. } => {
                tracing::debug!(uid = ?uid, %flags, "flags changed");
            }
            ChangeEvent::MessagesDeleted { messages } => {
                tracing::debug!(count = messages.len(), "messages expunged");
            }
            ChangeEvent::AlertReceived { text } => {
                tracing::warn!(%text, "server alert");
            }
            ChangeEvent::ApplicableFlagsChanged { new, .. } => {
                tracing::debug!(flags = %new, "applicable flags changed");
            }
            ChangeEvent::PermanentFlagsChanged { new, .. } => {
                tracing::debug!(flags = %new, "permanent flags changed");
            }
            ChangeEvent::HighestModSeqChanged { new, .. } => {
                tracing::debug!(mod_seq = new.get(), "highest mod-sequence changed");
            }
            ChangeEvent::MailboxOpened { mailbox } => {
                tracing::info!(mailbox = %mailbox.name, exists = mailbox.exists, "mailbox opened");
            }
            ChangeEvent::MailboxClosed { .. } => tracing::info!("mailbox closed"),
            ChangeEvent::Disconnected { text } => {
                tracing::info!(reason = text.as_deref().unwrap_or(""), "disconnected");
            }
        }
    }
}

/// Records every change in a buffer shared with its clones.
///
/// Register one clone with the session and keep another to inspect.
#[derive(Debug, Default, Clone)]
pub struct CollectingListener {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl CollectingListener {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything collected so far.
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeListener for CollectingListener {
    fn on_change(&mut self, event: &ChangeEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Sends every change down an unbounded tokio channel.
///
/// Once the receiver is dropped, further changes are discarded.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChannelListener {
    /// Creates a listener and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChangeListener for ChannelListener {
    fn on_change(&mut self, event: &ChangeEvent) {
        let _ = self.tx.send(event.clone());
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

    #[test]
    fn collecting_listener_shares_buffer() {
        let collector = CollectingListener::new();
        let mut registered = collector.clone();
        registered.on_change(&ChangeEvent::ExistsChanged { old: 1, new: 2 });
        registered.on_change(&ChangeEvent::AlertReceived {
            text: "quota".into(),
        });

        assert_eq!(collector.len(), 2);
        let events = collector.take();
        assert_eq!(events[0], ChangeEvent::ExistsChanged { old: 1, new: 2 });
        assert!(collector.is_empty());
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0;
        {
            let mut listener = |_: &ChangeEvent| seen += 1;
            listener.on_change(&ChangeEvent::Disconnected { text: None });
        }
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn channel_listener_forwards() {
        let (mut listener, mut rx) = ChannelListener::new();
        listener.on_change(&ChangeEvent::RecentChanged { old: 0, new: 3 });
        assert_eq!(
            rx.recv().await,
            Some(ChangeEvent::RecentChanged { old: 0, new: 3 })
        );

        drop(rx);
        listener.on_change(&ChangeEvent::Disconnected { text: None });
    }

    #[test]
    fn events_serialize() {
        let json = serde_json::to_value(ChangeEvent::ExistsChanged { old: 4, new: 5 }).unwrap();
        assert_eq!(json["ExistsChanged"]["new"], 5);
    }
}
