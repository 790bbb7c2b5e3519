//! # mailwire-sasl
//!
//! SASL mechanisms for IMAP `AUTHENTICATE` and POP3 `AUTH`.
//!
//! A mechanism is a small state machine that turns server challenges into
//! client responses. Buffers are raw bytes; the protocol engine owns the
//! base64 framing on the wire.
//!
//! ## Mechanisms
//!
//! - **PLAIN** (RFC 4616)
//! - **LOGIN** (draft-murchison-sasl-login)
//! - **XOAUTH2** (Google/Microsoft proprietary)
//! - **OAUTHBEARER** (RFC 7628)
//!
//! ## Example
//!
//! ```
//! use mailwire_sasl::{Plain, SaslMechanism};
//!
//! let mut plain = Plain::new("user@example.com", "secret");
//! assert_eq!(plain.name(), "PLAIN");
//! let ir = plain.initial_response().unwrap();
//! assert_eq!(ir, b"\0user@example.com\0secret");
//! assert!(plain.is_complete());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod mechanism;
mod oauth;

pub use error::{Result, SaslError};
pub use mechanism::{Login, OAuthBearer, Plain, SaslMechanism, XOAuth2};
pub use oauth::OAuthError;
