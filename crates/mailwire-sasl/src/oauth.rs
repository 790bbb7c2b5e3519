//! `OAuth2` failure details sent as a SASL challenge.

use serde::{Deserialize, Serialize};

/// `OAuth2` error challenge (RFC 7628 section 3.2.2).
///
/// Servers send it JSON-encoded:
/// `{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    /// HTTP-style status code.
    pub status: String,
    /// Authentication schemes the server accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemes: Option<String>,
    /// Scope the token needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuthError {
    /// Decodes an error challenge.
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge is not the expected JSON object.
    pub fn from_challenge(challenge: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(challenge)
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
    fn parses_full_error() {
        let json = br#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let error = OAuthError::from_challenge(json).unwrap();
        assert_eq!(error.status, "401");
        assert_eq!(error.schemes.as_deref(), Some("bearer"));
        assert_eq!(error.scope.as_deref(), Some("https://mail.google.com/"));
    }

    #[test]
    fn optional_fields_may_be_missing() {
        let error = OAuthError::from_challenge(br#"{"status":"invalid_token"}"#).unwrap();
        assert_eq!(error.status, "invalid_token");
        assert!(error.schemes.is_none());
    }

    #[test]
    fn rejects_non_json() {
        assert!(OAuthError::from_challenge(b"Password:").is_err());
    }
}
