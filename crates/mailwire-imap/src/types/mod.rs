//! Core protocol value types.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod date;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, CapabilitySet, Status};
pub use date::{format_internal_date, parse_internal_date};
pub use flags::{Flag, Flags};
pub use identifiers::{ModSeq, SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute, MailboxStatus};
pub use response_code::ResponseCode;
pub use sequence::{SequenceSet, SetItem, UidSet};
