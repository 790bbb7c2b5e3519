//! Transport: configuration, connectors and response framing.
//!
//! A [`Connector`] opens the byte stream (and upgrades it for STARTTLS);
//! [`FramedStream`] turns it into whole response lines with their literals
//! spliced in.

mod config;
mod framed;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use stream::{Connector, ImapStream, TlsConnector};
