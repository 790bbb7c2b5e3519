//! Error types for SASL exchanges.

/// Result type alias for SASL operations.
pub type Result<T> = std::result::Result<T, SaslError>;

/// SASL mechanism errors.
#[derive(Debug, thiserror::Error)]
pub enum SaslError {
    /// The server sent a challenge after the mechanism finished.
    #[error("unexpected challenge from server")]
    UnexpectedChallenge,

    /// A challenge could not be decoded.
    #[error("invalid challenge: {0}")]
    InvalidChallenge(String),

    /// The server rejected an OAuth token.
    #[error("OAuth2 error: status {}", .0.status)]
    OAuth(crate::OAuthError),
}
