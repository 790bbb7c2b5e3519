//! Decoded response payloads.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::types::{
    Capability, Flags, ListResponse, Mailbox, MailboxStatus, ModSeq, ResponseCode, SeqNum,
    SequenceSet, Uid,
};

/// One attribute of a FETCH response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchItem {
    /// FLAGS
    Flags(Flags),
    /// INTERNALDATE
    InternalDate(DateTime<FixedOffset>),
    /// RFC822.SIZE
    Rfc822Size(u32),
    /// ENVELOPE
    Envelope(Box<Envelope>),
    /// UID
    Uid(Uid),
    /// `BODY[section]<origin>`, `RFC822`, `RFC822.HEADER`, `RFC822.TEXT`.
    Body {
        /// Section specifier, `None` for the whole message.
        section: Option<String>,
        /// Starting octet of a partial fetch.
        origin: Option<u32>,
        /// Payload, `None` when the server sent NIL.
        data: Option<Vec<u8>>,
    },
    /// BODYSTRUCTURE or non-extensible BODY.
    BodyStructure(BodyStructure),
    /// MODSEQ
    ModSeq(ModSeq),
}

/// ENVELOPE structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From
    pub from: Vec<Address>,
    /// Sender
    pub sender: Vec<Address>,
    /// Reply-To
    pub reply_to: Vec<Address>,
    /// To
    pub to: Vec<Address>,
    /// Cc
    pub cc: Vec<Address>,
    /// Bcc
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Address from an ENVELOPE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route.
    pub adl: Option<String>,
    /// Local part, or group name when `host` is NIL.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// `mailbox@host`, if both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// BODYSTRUCTURE tree. Extension data is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BodyStructure {
    /// Non-text, non-message single part.
    Basic {
        /// Media type, upper-cased.
        media_type: String,
        /// Media subtype, upper-cased.
        media_subtype: String,
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Content-ID
        id: Option<String>,
        /// Content-Description
        description: Option<String>,
        /// Content-Transfer-Encoding
        encoding: String,
        /// Encoded size in octets.
        size: u32,
    },
    /// `MESSAGE/RFC822` part.
    Message {
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Encoded size in octets.
        size: u32,
        /// Envelope of the embedded message.
        envelope: Box<Envelope>,
        /// Structure of the embedded message.
        body: Box<Self>,
        /// Size in lines.
        lines: u32,
    },
    /// `TEXT/*` part.
    Text {
        /// Subtype, upper-cased.
        subtype: String,
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Content-ID
        id: Option<String>,
        /// Content-Description
        description: Option<String>,
        /// Content-Transfer-Encoding
        encoding: String,
        /// Encoded size in octets.
        size: u32,
        /// Size in lines.
        lines: u32,
    },
    /// `MULTIPART/*`
    Multipart {
        /// Child parts in order.
        bodies: Vec<Self>,
        /// Subtype, upper-cased.
        subtype: String,
    },
}

impl BodyStructure {
    /// Finds the part addressed by a section number such as `2.1`.
    #[must_use]
    pub fn part(&self, section: &str) -> Option<&Self> {
        let mut node = self;
        for index in section.split('.') {
            let i = index.parse::<usize>().ok()?.checked_sub(1)?;
            node = match node {
                Self::Multipart { bodies, .. } => bodies.get(i)?,
                Self::Message { body, .. } => match body.as_ref() {
                    Self::Multipart { bodies, .. } => bodies.get(i)?,
                    single if i == 0 => single,
                    _ => return None,
                },
                single if i == 0 => single,
                _ => return None,
            };
        }
        Some(node)
    }
}

/// One NAMESPACE entry: prefix and hierarchy separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceEntry {
    /// Prefix, e.g. `INBOX.` or `#shared/`.
    pub prefix: String,
    /// Hierarchy separator.
    pub delimiter: Option<char>,
}

/// NAMESPACE data (RFC 2342).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Namespaces {
    /// Personal namespaces.
    pub personal: Vec<NamespaceEntry>,
    /// Other users' namespaces.
    pub other_users: Vec<NamespaceEntry>,
    /// Shared namespaces.
    pub shared: Vec<NamespaceEntry>,
}

/// One QUOTA resource line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaResource {
    /// Resource name, e.g. `STORAGE` or `MESSAGE`.
    pub name: String,
    /// Current usage.
    pub usage: u64,
    /// Limit.
    pub limit: u64,
}

/// ESEARCH result (RFC 4731).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ESearchResult {
    /// Tag of the correlating command.
    pub tag: Option<String>,
    /// Numbers are UIDs.
    pub uid: bool,
    /// MIN
    pub min: Option<u32>,
    /// MAX
    pub max: Option<u32>,
    /// COUNT
    pub count: Option<u32>,
    /// ALL
    pub all: Option<SequenceSet>,
    /// MODSEQ
    pub mod_seq: Option<ModSeq>,
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* NO`
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* PREAUTH`
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* CAPABILITY`
    Capability(Vec<Capability>),
    /// `* ENABLED`
    Enabled(Vec<Capability>),
    /// `* LIST`
    List(ListResponse),
    /// `* LSUB`
    Lsub(ListResponse),
    /// `* XLIST`
    XList(ListResponse),
    /// `* FLAGS`
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH`
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Attributes the server sent.
        items: Vec<FetchItem>,
    },
    /// `* SEARCH`, with the trailing `(MODSEQ n)` if present.
    Search {
        /// Matching numbers.
        numbers: Vec<u32>,
        /// Highest mod-sequence of the matches.
        mod_seq: Option<ModSeq>,
    },
    /// `* ESEARCH`
    ESearch(ESearchResult),
    /// `* SORT`
    Sort(Vec<u32>),
    /// `* STATUS`
    Status {
        /// Mailbox the counters belong to.
        mailbox: Mailbox,
        /// Counters.
        status: MailboxStatus,
    },
    /// `* NAMESPACE`
    Namespace(Namespaces),
    /// `* ID`, NIL or field/value pairs.
    Id(Vec<(String, Option<String>)>),
    /// `* QUOTA`
    Quota {
        /// Quota root.
        root: String,
        /// Resource usage.
        resources: Vec<QuotaResource>,
    },
    /// `* QUOTAROOT`
    QuotaRoot {
        /// Mailbox asked about.
        mailbox: Mailbox,
        /// Roots that apply to it.
        roots: Vec<String>,
    },
    /// Untagged data with an unrecognized keyword, kept as raw text.
    Other {
        /// The keyword.
        keyword: String,
        /// Rest of the line.
        text: String,
    },
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

    fn text(subtype: &str) -> BodyStructure {
        BodyStructure::Text {
            subtype: subtype.into(),
            params: vec![],
            id: None,
            description: None,
            encoding: "7BIT".into(),
            size: 10,
            lines: 1,
        }
    }

    #[test]
    fn address_email_needs_both_parts() {
        let mut addr = Address {
            name: None,
            adl: None,
            mailbox: Some("john".into()),
            host: Some("example.com".into()),
        };
        assert_eq!(addr.email().unwrap(), "john@example.com");
        addr.host = None;
        assert!(addr.email().is_none());
    }

    #[test]
    fn part_lookup_by_section() {
        let tree = BodyStructure::Multipart {
            bodies: vec![
                text("PLAIN"),
                BodyStructure::Multipart {
                    bodies: vec![text("HTML"), text("CSV")],
                    subtype: "MIXED".into(),
                },
            ],
            subtype: "ALTERNATIVE".into(),
        };
        assert_eq!(tree.part("1"), Some(&text("PLAIN")));
        assert_eq!(tree.part("2.2"), Some(&text("CSV")));
        assert!(tree.part("3").is_none());
        assert!(tree.part("0").is_none());
        assert_eq!(text("PLAIN").part("1"), Some(&text("PLAIN")));
    }
}
