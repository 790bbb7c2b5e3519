//! # mailwire-imap
//!
//! An IMAP4rev1 client session engine.
//!
//! A [`Session`] owns one connection and runs one command at a time on it.
//! Untagged server data updates a live model of the selected mailbox as it
//! arrives; sequence numbers are renumbered on EXPUNGE while
//! [`MessageRef`] handles keep addressing the same message. Changes are
//! published to [`ChangeListener`]s.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwire_imap::{Config, Credentials, FetchAttribute, FetchItems, SequenceSet, Session};
//!
//! # async fn run() -> mailwire_imap::Result<()> {
//! let session = Session::new(Config::new("imap.example.com"));
//! session.connect(Credentials::login("user@example.com", "secret")).await?;
//!
//! let inbox = session.open("INBOX", false).await?;
//! if let Some(first) = SequenceSet::range(1, inbox.exists.min(10)) {
//!     let items = FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]);
//!     for message in session.fetch(&first, items).await? {
//!         println!("{:?} {:?}", message.uid, message.flags);
//!     }
//! }
//!
//! let arrived = session.watch(Some(std::time::Duration::from_secs(30)), None).await?;
//! println!("{} new", arrived.len());
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command values and their wire encoding
//! - [`connection`]: configuration, connectors and framing
//! - [`events`]: change notifications
//! - [`model`]: handles and message/mailbox snapshots
//! - [`parser`]: sans-I/O response parser
//! - [`types`]: core IMAP types (flags, mailboxes, sequence sets)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod events;
pub mod model;
pub mod parser;
mod session;
pub mod types;

pub use command::{
    Command, FetchAttribute, FetchItems, SearchCriteria, SortCriterion, SortKey, StatusAttribute,
    StoreAction, StoreMode, TagGenerator,
};
pub use connection::{Config, ConfigBuilder, Connector, FramedStream, ImapStream, Security, TlsConnector};
pub use error::{ConnectionError, Error, ErrorReport, FramingError, Result, TimeoutKind, Violation};
pub use events::{ChangeEvent, ChangeListener, ChannelListener, CollectingListener, LoggingListener};
pub use model::{Fetched, MailboxHandle, Message, MessageRef, OpenedMailbox, SessionId, SessionState};
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use session::{
    BodyPart, CommandResult, ConnectHandle, Credentials, ListOptions, Quota, SearchResult, Session,
    TransferMode, TransferReport, WatchKind,
};
pub use types::{
    Capability, CapabilitySet, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus,
    ModSeq, ResponseCode, SeqNum, SequenceSet, Status, Tag, Uid, UidSet, UidValidity,
};
