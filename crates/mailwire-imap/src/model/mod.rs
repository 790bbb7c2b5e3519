//! Session object model: handles, message cache and the selected mailbox.

mod handles;
mod mailbox;
mod message;

pub use handles::{MailboxHandle, MessageRef, SessionId};
pub use mailbox::OpenedMailbox;
pub(crate) use mailbox::SelectedMailbox;
pub use message::{Fetched, Message};

use serde::Serialize;

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Transport or authentication in progress.
    Connecting,
    /// Greeted, not yet logged in.
    NotAuthenticated,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    Selected,
    /// LOGOUT sent.
    LoggingOut,
}

impl SessionState {
    /// Returns true if commands may be sent.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::LoggingOut)
    }

    /// Returns true once LOGIN or AUTHENTICATE succeeded.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected)
    }
}
