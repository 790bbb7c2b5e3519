//! # mailwire-pop3
//!
//! POP3 client session engine (RFC 1939) with the CAPA/extended response
//! code extensions (RFC 2449), STLS (RFC 2595) and SASL (RFC 5034).
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwire_pop3::{Client, Pop3Config};
//!
//! # async fn run() -> mailwire_pop3::Result<()> {
//! let config = Pop3Config::new("pop.example.com");
//! let client = Client::connect(&config).await?;
//! let mut client = client.login("alice@example.com", "secret").await?;
//!
//! let stat = client.stat().await?;
//! for listing in client.uidl().await? {
//!     let message = client.retr(listing.number).await?;
//!     println!("{} ({} bytes)", listing.uid, message.len());
//! }
//! println!("{} messages", stat.count);
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! AUTHORIZATION ── login() / pass() / auth() ──→ TRANSACTION ── quit() ──→ UPDATE
//! ```
//!
//! Multi-line responses are returned unstuffed, without the `.` terminator.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use config::{Pop3Config, Pop3ConfigBuilder, Security};
pub use connection::{Authorization, Client, Pop3Stream, Transaction};
pub use error::{Error, Result};
pub use types::{
    Capabilities, Capability, DropListing, ExtendedCode, Greeting, ScanListing, StatusLine,
    UniqueIdListing,
};
