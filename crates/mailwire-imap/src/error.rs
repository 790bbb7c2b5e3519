//! Error types for the IMAP engine.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::types::{Mailbox, ResponseCode, SequenceSet, Status};

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport, greeting or server-initiated disconnect. Fatal to the session.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// An operation exceeded its deadline. The session is now disconnected.
    #[error("{kind} timed out after {after:?}")]
    Timeout {
        /// Which deadline expired.
        kind: TimeoutKind,
        /// The configured limit.
        after: Duration,
    },

    /// The byte stream could not be split into response lines.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// A response line could not be decoded. Aborts the current command only.
    #[error("malformed response at byte {position}: {message}")]
    MalformedResponse {
        /// Byte offset within the line.
        position: usize,
        /// What was expected.
        message: String,
    },

    /// The server completed the command with NO or BAD.
    #[error("server returned {status}: {text}")]
    ErrorResponse {
        /// NO or BAD.
        status: Status,
        /// Decoded response code, if any.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },

    /// The caller used the session in a way the protocol state does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(Violation),

    /// The mailbox handle refers to a mailbox that is no longer open.
    #[error("mailbox is closed")]
    MailboxClosed,

    /// The message has been expunged.
    #[error("message has been deleted")]
    MessageDeleted,

    /// No mailbox with this exact name exists.
    #[error("mailbox not found: {name}")]
    MailboxNotFound {
        /// The requested name.
        name: String,
    },

    /// The server has no message matching the set.
    #[error("message not found: {set}")]
    MessageNotFound {
        /// The requested set (UIDs or sequence numbers).
        set: SequenceSet,
    },

    /// The server does not advertise a capability the operation needs.
    #[error("server does not support {capability}")]
    Incapable {
        /// The missing capability.
        capability: String,
    },

    /// A pending connect or watch was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

/// Cause of a [`Error::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or record error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name not usable for TLS server verification.
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// The server greeting was missing or not understood.
    #[error("unexpected greeting: {0}")]
    Greeting(String),

    /// The server sent BYE.
    #[error("server closed the session: {text}")]
    Bye {
        /// Response code carried by the BYE.
        code: Option<ResponseCode>,
        /// BYE text.
        text: String,
    },

    /// LOGIN was rejected.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// AUTHENTICATE was rejected or the mechanism failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    Closed,
}

/// Which per-operation deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeoutKind {
    /// Establishing the transport.
    Connect,
    /// Writing a command.
    Send,
    /// Waiting for a response.
    Receive,
    /// Waiting for IDLE to finish after DONE.
    Idle,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Idle => "idle",
        })
    }
}

/// Line or literal framing failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// A line exceeded the configured maximum.
    #[error("line too long (limit {limit} bytes)")]
    LineTooLong {
        /// The configured limit.
        limit: usize,
    },
    /// A literal exceeded the configured maximum.
    #[error("literal too large: {size} bytes (limit {limit})")]
    LiteralTooLarge {
        /// Declared size.
        size: u64,
        /// The configured limit.
        limit: u64,
    },
    /// The `{n}` marker could not be decoded.
    #[error("invalid literal length")]
    InvalidLiteralLength,
    /// The peer closed the stream in the middle of a line or literal.
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

impl FramingError {
    /// Returns true if the reader discarded the offending response and is
    /// positioned at the next line.
    #[must_use]
    pub const fn is_resynchronized(&self) -> bool {
        matches!(self, Self::LineTooLong { .. } | Self::LiteralTooLarge { .. })
    }
}

/// Kind of caller misuse reported by [`Error::ProtocolViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Violation {
    /// Another exchange is in flight on this session.
    Busy,
    /// The session is not connected.
    NotConnected,
    /// The command is not valid in the current session state.
    WrongState,
    /// A watch is active; stop it first.
    WatchActive,
    /// No watch is active.
    NoWatchActive,
    /// The active watch is of a different kind.
    WatchKindMismatch,
    /// A connect is already pending.
    ConnectPending,
    /// The parent mailbox cannot have children.
    NoInferiors,
    /// Renaming a mailbox to its own name.
    RenameToSelf,
    /// A handle from another session was used.
    CrossSession,
    /// A message handle from a previous selection was used.
    StaleHandle,
    /// An argument is out of range.
    InvalidArgument,
    /// The server asked for data no command in flight was sending.
    UnexpectedContinuation,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Busy => "another command is in progress",
            Self::NotConnected => "not connected",
            Self::WrongState => "invalid in the current session state",
            Self::WatchActive => "a watch operation is active",
            Self::NoWatchActive => "watching operation not started",
            Self::WatchKindMismatch => "another kind of watch operation is active",
            Self::ConnectPending => "a connect is already pending",
            Self::NoInferiors => "the mailbox cannot have child mailboxes",
            Self::RenameToSelf => "cannot rename a mailbox to its own name",
            Self::CrossSession => "handle belongs to another session",
            Self::StaleHandle => "handle refers to a previous selection",
            Self::InvalidArgument => "argument out of range",
            Self::UnexpectedContinuation => "unexpected continuation request",
        })
    }
}

impl Error {
    /// Shorthand for a malformed-response error.
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            position,
            message: message.into(),
        }
    }

    /// Returns true if the error left the session disconnected.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Connection(
                ConnectionError::LoginRejected(_) | ConnectionError::AuthenticationFailed(_),
            ) => false,
            Self::Connection(_) | Self::Timeout { .. } => true,
            Self::Framing(e) => !e.is_resynchronized(),
            _ => false,
        }
    }

    /// Returns the server's response code, if the error carries one.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::ErrorResponse { code, .. }
            | Self::Connection(ConnectionError::Bye { code, .. }) => code.as_ref(),
            _ => None,
        }
    }

    /// Builds a structured, serializable description of the error.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        let mut report = ErrorReport {
            kind: self.kind_name(),
            message: self.to_string(),
            fatal: self.is_fatal(),
            response_code: self.response_code().cloned(),
            server_text: None,
            mailbox: None,
            message_set: None,
            violation: None,
        };
        match self {
            Self::ErrorResponse { text, .. }
            | Self::Connection(ConnectionError::Bye { text, .. }) => {
                report.server_text = Some(text.clone());
            }
            Self::MailboxNotFound { name } => report.mailbox = Some(Mailbox::new(name.clone())),
            Self::MessageNotFound { set } => report.message_set = Some(set.clone()),
            Self::ProtocolViolation(v) => report.violation = Some(*v),
            _ => {}
        }
        report
    }

    const fn kind_name(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout { .. } => "timeout",
            Self::Framing(_) => "framing",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::ErrorResponse { .. } => "error_response",
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::MailboxClosed => "mailbox_closed",
            Self::MessageDeleted => "message_deleted",
            Self::MailboxNotFound { .. } => "mailbox_not_found",
            Self::MessageNotFound { .. } => "message_not_found",
            Self::Incapable { .. } => "incapable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Connection(ConnectionError::Io(e))
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Self::Connection(ConnectionError::Tls(e))
    }
}

impl From<rustls::pki_types::InvalidDnsNameError> for Error {
    fn from(e: rustls::pki_types::InvalidDnsNameError) -> Self {
        Self::Connection(ConnectionError::InvalidDnsName(e))
    }
}

impl From<Violation> for Error {
    fn from(v: Violation) -> Self {
        Self::ProtocolViolation(v)
    }
}

/// Serializable error description for host applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// Stable snake-case error kind.
    pub kind: &'static str,
    /// Display text.
    pub message: String,
    /// Whether the session was disconnected.
    pub fatal: bool,
    /// Server response code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<ResponseCode>,
    /// Server-supplied text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_text: Option<String>,
    /// Mailbox the operation targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<Mailbox>,
    /// Messages the operation targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_set: Option<SequenceSet>,
    /// Kind of caller misuse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn fatality_by_kind() {
        assert!(Error::Connection(ConnectionError::Closed).is_fatal());
        assert!(
            Error::Timeout {
                kind: TimeoutKind::Receive,
                after: Duration::from_secs(1)
            }
            .is_fatal()
        );
        assert!(Error::Framing(FramingError::UnexpectedEof).is_fatal());
        assert!(!Error::Framing(FramingError::LineTooLong { limit: 10 }).is_fatal());
        assert!(!Error::malformed(3, "x").is_fatal());
        assert!(!Error::from(Violation::Busy).is_fatal());
        assert!(!Error::from(Violation::UnexpectedContinuation).is_fatal());
    }

    #[test]
    fn rejected_credentials_keep_the_connection() {
        let rejected = Error::Connection(ConnectionError::LoginRejected("bad password".into()));
        assert!(!rejected.is_fatal());
        assert!(!rejected.report().fatal);
        let failed = Error::Connection(ConnectionError::AuthenticationFailed("no".into()));
        assert!(!failed.is_fatal());
        assert_eq!(failed.report().kind, "connection");
    }

    #[test]
    fn report_carries_server_context() {
        let err = Error::ErrorResponse {
            status: Status::No,
            code: Some(ResponseCode::TryCreate),
            text: "Mailbox doesn't exist".into(),
        };
        let json = serde_json::to_value(err.report()).unwrap();
        assert_eq!(json["kind"], "error_response");
        assert_eq!(json["response_code"], "TryCreate");
        assert_eq!(json["server_text"], "Mailbox doesn't exist");
        assert_eq!(json["fatal"], false);
    }

    #[test]
    fn report_carries_identifiers() {
        let report = Error::MailboxNotFound { name: "Box*".into() }.report();
        assert_eq!(report.mailbox.unwrap().as_str(), "Box*");

        let set = SequenceSet::parse("4:6").unwrap();
        let report = Error::MessageNotFound { set: set.clone() }.report();
        assert_eq!(report.message_set, Some(set));
        assert!(report.message.contains("4:6"));

        let report = Error::from(Violation::WatchActive).report();
        assert_eq!(report.violation, Some(Violation::WatchActive));
    }
}
