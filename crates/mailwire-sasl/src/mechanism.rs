//! The mechanism trait and the built-in mechanisms.

use crate::error::{Result, SaslError};
use crate::oauth::OAuthError;

/// A client-side SASL mechanism.
///
/// The engine sends [`initial_response`](Self::initial_response) inline when
/// the server supports it (SASL-IR), then feeds every server challenge to
/// [`step`](Self::step) until the server completes the command.
pub trait SaslMechanism: Send {
    /// Registered mechanism name, e.g. `PLAIN`.
    fn name(&self) -> &str;

    /// Response to send without waiting for a challenge, if the mechanism
    /// is client-first.
    fn initial_response(&mut self) -> Option<Vec<u8>>;

    /// Answers one server challenge.
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge is unexpected or undecodable. The
    /// engine then cancels the exchange.
    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Returns true once the mechanism has nothing more to send.
    fn is_complete(&self) -> bool;
}

/// PLAIN (RFC 4616): `authzid NUL authcid NUL passwd`.
#[derive(Clone)]
pub struct Plain {
    authzid: String,
    username: String,
    password: String,
    sent: bool,
}

impl Plain {
    /// PLAIN with an empty authorization identity.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            authzid: String::new(),
            username: username.into(),
            password: password.into(),
            sent: false,
        }
    }

    /// Acts on behalf of `authzid`.
    #[must_use]
    pub fn with_authzid(mut self, authzid: impl Into<String>) -> Self {
        self.authzid = authzid.into();
        self
    }

    fn message(&self) -> Vec<u8> {
        format!("{}\0{}\0{}", self.authzid, self.username, self.password).into_bytes()
    }
}

impl std::fmt::Debug for Plain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plain")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.sent = true;
        Some(self.message())
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        // Servers without SASL-IR send an empty challenge first.
        if self.sent || !challenge.is_empty() {
            return Err(SaslError::UnexpectedChallenge);
        }
        self.sent = true;
        Ok(self.message())
    }

    fn is_complete(&self) -> bool {
        self.sent
    }
}

/// LOGIN: username and password sent as answers to two prompts.
#[derive(Clone)]
pub struct Login {
    username: String,
    password: String,
    answered: u8,
}

impl Login {
    /// Creates a LOGIN exchange.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            answered: 0,
        }
    }
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SaslMechanism for Login {
    fn name(&self) -> &str {
        "LOGIN"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn step(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        // Prompt texts vary between servers ("Username:", "User Name"), so
        // answer by position.
        let answer = match self.answered {
            0 => self.username.as_bytes().to_vec(),
            1 => self.password.as_bytes().to_vec(),
            _ => return Err(SaslError::UnexpectedChallenge),
        };
        self.answered += 1;
        Ok(answer)
    }

    fn is_complete(&self) -> bool {
        self.answered >= 2
    }
}

/// Shared OAuth behaviour: one initial response, then at most one error
/// challenge that must be acknowledged before the server fails the command.
#[derive(Clone)]
struct BearerState {
    initial: Vec<u8>,
    sent: bool,
    error: Option<OAuthError>,
}

impl BearerState {
    fn initial_response(&mut self) -> Vec<u8> {
        self.sent = true;
        self.initial.clone()
    }

    fn step(&mut self, challenge: &[u8], acknowledgement: &[u8]) -> Result<Vec<u8>> {
        if !self.sent && challenge.is_empty() {
            return Ok(self.initial_response());
        }
        if self.error.is_some() {
            return Err(SaslError::UnexpectedChallenge);
        }
        let error = OAuthError::from_challenge(challenge)
            .map_err(|e| SaslError::InvalidChallenge(e.to_string()))?;
        self.error = Some(error);
        Ok(acknowledgement.to_vec())
    }
}

/// XOAUTH2: `user=<user>^Aauth=Bearer <token>^A^A`.
#[derive(Clone)]
pub struct XOAuth2 {
    user: String,
    state: BearerState,
}

impl XOAuth2 {
    /// Creates an XOAUTH2 exchange for `user` with an access token.
    #[must_use]
    pub fn new(user: impl Into<String>, token: &str) -> Self {
        let user = user.into();
        let initial = format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes();
        Self {
            user,
            state: BearerState {
                initial,
                sent: false,
                error: None,
            },
        }
    }

    /// Error details the server sent before rejecting the token.
    #[must_use]
    pub const fn error(&self) -> Option<&OAuthError> {
        self.state.error.as_ref()
    }
}

impl std::fmt::Debug for XOAuth2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XOAuth2")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl SaslMechanism for XOAuth2 {
    fn name(&self) -> &str {
        "XOAUTH2"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        Some(self.state.initial_response())
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.state.step(challenge, b"")
    }

    fn is_complete(&self) -> bool {
        self.state.sent
    }
}

/// OAUTHBEARER (RFC 7628).
#[derive(Clone)]
pub struct OAuthBearer {
    user: String,
    state: BearerState,
}

impl OAuthBearer {
    /// Creates an OAUTHBEARER exchange.
    ///
    /// `host` and `port` are optional GS2 key/value pairs some servers check.
    #[must_use]
    pub fn new(user: impl Into<String>, token: &str, host: Option<&str>, port: Option<u16>) -> Self {
        let user = user.into();
        let mut initial = format!("n,a={user},\x01");
        if let Some(host) = host {
            initial.push_str(&format!("host={host}\x01"));
        }
        if let Some(port) = port {
            initial.push_str(&format!("port={port}\x01"));
        }
        initial.push_str(&format!("auth=Bearer {token}\x01\x01"));
        Self {
            user,
            state: BearerState {
                initial: initial.into_bytes(),
                sent: false,
                error: None,
            },
        }
    }

    /// Error details the server sent before rejecting the token.
    #[must_use]
    pub const fn error(&self) -> Option<&OAuthError> {
        self.state.error.as_ref()
    }
}

impl std::fmt::Debug for OAuthBearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthBearer")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl SaslMechanism for OAuthBearer {
    fn name(&self) -> &str {
        "OAUTHBEARER"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        Some(self.state.initial_response())
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        // The failure acknowledgement is a lone ^A.
        self.state.step(challenge, b"\x01")
    }

    fn is_complete(&self) -> bool {
        self.state.sent
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

    mod plain_tests {
        use super::*;

        #[test]
        fn initial_response_format() {
            let mut plain = Plain::new("test", "pass");
            assert_eq!(plain.initial_response().unwrap(), b"\0test\0pass");
            assert!(plain.is_complete());
            assert!(plain.step(b"").is_err());
        }

        #[test]
        fn authzid() {
            let mut plain = Plain::new("admin", "pw").with_authzid("bob");
            assert_eq!(plain.initial_response().unwrap(), b"bob\0admin\0pw");
        }

        #[test]
        fn answers_empty_challenge_without_ir() {
            let mut plain = Plain::new("u", "p");
            assert_eq!(plain.step(b"").unwrap(), b"\0u\0p");
            assert!(plain.is_complete());
        }

        #[test]
        fn debug_hides_password() {
            let plain = Plain::new("user", "hunter2");
            assert!(!format!("{plain:?}").contains("hunter2"));
        }
    }

    mod login_tests {
        use super::*;

        #[test]
        fn answers_by_position() {
            let mut login = Login::new("alice", "secret");
            assert!(login.initial_response().is_none());
            assert_eq!(login.step(b"Username:").unwrap(), b"alice");
            assert!(!login.is_complete());
            assert_eq!(login.step(b"Password:").unwrap(), b"secret");
            assert!(login.is_complete());
            assert!(matches!(login.step(b"?"), Err(SaslError::UnexpectedChallenge)));
        }
    }

    mod oauth_tests {
        use super::*;

        #[test]
        fn xoauth2_format() {
            let mut mech = XOAuth2::new("test@test.com", "abc");
            assert_eq!(
                mech.initial_response().unwrap(),
                b"user=test@test.com\x01auth=Bearer abc\x01\x01"
            );
        }

        #[test]
        fn oauthbearer_format() {
            let mut mech = OAuthBearer::new("test@test.com", "abc", None, None);
            assert_eq!(
                mech.initial_response().unwrap(),
                b"n,a=test@test.com,\x01auth=Bearer abc\x01\x01"
            );

            let mut mech = OAuthBearer::new("u", "t", Some("imap.example.com"), Some(993));
            assert_eq!(
                mech.initial_response().unwrap(),
                b"n,a=u,\x01host=imap.example.com\x01port=993\x01auth=Bearer t\x01\x01"
            );
        }

        #[test]
        fn error_challenge_is_acknowledged() {
            let mut mech = XOAuth2::new("u", "expired");
            mech.initial_response();
            let ack = mech
                .step(br#"{"status":"401","schemes":"bearer"}"#)
                .unwrap();
            assert!(ack.is_empty());
            assert_eq!(mech.error().unwrap().status, "401");
            assert!(mech.step(b"{}").is_err());

            let mut mech = OAuthBearer::new("u", "expired", None, None);
            mech.initial_response();
            assert_eq!(mech.step(br#"{"status":"invalid_token"}"#).unwrap(), b"\x01");
        }

        #[test]
        fn garbage_challenge_is_invalid() {
            let mut mech = XOAuth2::new("u", "t");
            mech.initial_response();
            assert!(matches!(
                mech.step(b"not json"),
                Err(SaslError::InvalidChallenge(_))
            ));
        }

        #[test]
        fn sends_initial_on_empty_challenge() {
            let mut mech = XOAuth2::new("u", "t");
            assert_eq!(mech.step(b"").unwrap(), b"user=u\x01auth=Bearer t\x01\x01");
        }
    }
}
