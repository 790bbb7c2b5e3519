//! Error types for POP3 operations.

use std::io;
use std::time::Duration;

use crate::types::ExtendedCode;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The host is not a valid TLS server name.
    #[error("invalid server name: {0}")]
    InvalidDnsName(String),

    /// The server did not answer in time.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The limit that elapsed.
        after: Duration,
    },

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// The server answered `-ERR`.
    #[error("server error: {text}")]
    ErrResponse {
        /// RFC 2449 extended code, e.g. `[IN-USE]`.
        code: Option<ExtendedCode>,
        /// Text after the status indicator.
        text: String,
    },

    /// USER/PASS or AUTH was refused.
    #[error("authentication failed: {text}")]
    AuthenticationFailed {
        /// Extended code, e.g. `[AUTH]` or `[LOGIN-DELAY]`.
        code: Option<ExtendedCode>,
        /// Server text.
        text: String,
    },

    /// A line or listing could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A response line exceeded the configured limit.
    #[error("response line longer than {limit} bytes")]
    LineTooLong {
        /// The limit.
        limit: usize,
    },

    /// A caller-supplied value cannot be sent, e.g. message number 0.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Feature not advertised by the server.
    #[error("server does not support {0}")]
    NotSupported(String),

    /// The SASL mechanism gave up.
    #[error("SASL error: {0}")]
    Sasl(#[from] mailwire_sasl::SaslError),
}

impl Error {
    /// Returns true if the server reported a temporary condition
    /// (`[IN-USE]`, `[LOGIN-DELAY]` or `[SYS/TEMP]`).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ErrResponse { code: Some(code), .. }
            | Self::AuthenticationFailed { code: Some(code), .. } => code.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::Timeout { .. } | Self::Closed | Self::LineTooLong { .. }
        )
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
    fn transient_codes() {
        let err = Error::ErrResponse {
            code: Some(ExtendedCode::InUse),
            text: "maildrop locked".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_fatal());

        let err = Error::AuthenticationFailed {
            code: Some(ExtendedCode::Auth),
            text: "bad password".into(),
        };
        assert!(!err.is_transient());
        assert!(Error::Closed.is_fatal());
    }
}
