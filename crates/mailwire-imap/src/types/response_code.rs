//! Bracketed response codes (`[CODE ...]`).

use serde::{Deserialize, Serialize};

use super::{Capability, Flags, ModSeq, SeqNum, Uid, UidSet, UidValidity};

/// Decoded response code attached to a status response.
///
/// Codes outside the known table are kept verbatim in [`ResponseCode::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    /// ALERT: text must be shown to the user.
    Alert,
    /// BADCHARSET, with the supported charsets if listed.
    BadCharset(Vec<String>),
    /// CAPABILITY list piggybacked on a status response.
    Capability(Vec<Capability>),
    /// PARSE: the server could not parse a message header.
    Parse,
    /// PERMANENTFLAGS
    PermanentFlags(Flags),
    /// READ-ONLY
    ReadOnly,
    /// READ-WRITE
    ReadWrite,
    /// TRYCREATE: the target mailbox does not exist but may be created.
    TryCreate,
    /// UIDNEXT
    UidNext(Uid),
    /// UIDVALIDITY
    UidValidity(UidValidity),
    /// UNSEEN: sequence number of the first unseen message.
    Unseen(SeqNum),
    /// APPENDUID (UIDPLUS)
    AppendUid {
        /// Destination UIDVALIDITY.
        uid_validity: UidValidity,
        /// UIDs assigned to the appended messages.
        uids: UidSet,
    },
    /// COPYUID (UIDPLUS)
    CopyUid {
        /// Destination UIDVALIDITY.
        uid_validity: UidValidity,
        /// Source UIDs, in copy order.
        source: UidSet,
        /// Destination UIDs, pairwise with `source`.
        destination: UidSet,
    },
    /// UIDNOTSTICKY: the mailbox does not keep UIDs across sessions.
    UidNotSticky,
    /// HIGHESTMODSEQ (CONDSTORE)
    HighestModSeq(ModSeq),
    /// NOMODSEQ (CONDSTORE)
    NoModSeq,
    /// MODIFIED: messages that failed an UNCHANGEDSINCE STORE.
    Modified(String),
    /// CLOSED: the previously selected mailbox is now closed (QRESYNC/CONDSTORE).
    Closed,
    /// ALREADYEXISTS
    AlreadyExists,
    /// NONEXISTENT
    NonExistent,
    /// NOPERM
    NoPerm,
    /// OVERQUOTA
    OverQuota,
    /// LIMIT
    Limit,
    /// INUSE
    InUse,
    /// AUTHENTICATIONFAILED
    AuthenticationFailed,
    /// CANNOT
    Cannot,
    /// SERVERBUG
    ServerBug,
    /// Any other code, with its raw text (name and arguments).
    Unknown(String),
}

impl ResponseCode {
    /// The code's keyword, as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::BadCharset(_) => "BADCHARSET",
            Self::Capability(_) => "CAPABILITY",
            Self::Parse => "PARSE",
            Self::PermanentFlags(_) => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::AppendUid { .. } => "APPENDUID",
            Self::CopyUid { .. } => "COPYUID",
            Self::UidNotSticky => "UIDNOTSTICKY",
            Self::HighestModSeq(_) => "HIGHESTMODSEQ",
            Self::NoModSeq => "NOMODSEQ",
            Self::Modified(_) => "MODIFIED",
            Self::Closed => "CLOSED",
            Self::AlreadyExists => "ALREADYEXISTS",
            Self::NonExistent => "NONEXISTENT",
            Self::NoPerm => "NOPERM",
            Self::OverQuota => "OVERQUOTA",
            Self::Limit => "LIMIT",
            Self::InUse => "INUSE",
            Self::AuthenticationFailed => "AUTHENTICATIONFAILED",
            Self::Cannot => "CANNOT",
            Self::ServerBug => "SERVERBUG",
            Self::Unknown(raw) => raw.split(' ').next().unwrap_or(raw),
        }
    }

    /// Maps an argument-less code keyword to its variant.
    #[must_use]
    pub fn from_atom(atom: &str) -> Option<Self> {
        Some(match atom.to_ascii_uppercase().as_str() {
            "ALERT" => Self::Alert,
            "PARSE" => Self::Parse,
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "TRYCREATE" => Self::TryCreate,
            "UIDNOTSTICKY" => Self::UidNotSticky,
            "NOMODSEQ" => Self::NoModSeq,
            "CLOSED" => Self::Closed,
            "ALREADYEXISTS" => Self::AlreadyExists,
            "NONEXISTENT" => Self::NonExistent,
            "NOPERM" => Self::NoPerm,
            "OVERQUOTA" => Self::OverQuota,
            "LIMIT" => Self::Limit,
            "INUSE" => Self::InUse,
            "AUTHENTICATIONFAILED" => Self::AuthenticationFailed,
            "CANNOT" => Self::Cannot,
            "SERVERBUG" => Self::ServerBug,
            _ => return None,
        })
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
    fn simple_atoms_resolve() {
        assert_eq!(ResponseCode::from_atom("trycreate"), Some(ResponseCode::TryCreate));
        assert_eq!(ResponseCode::from_atom("ALREADYEXISTS"), Some(ResponseCode::AlreadyExists));
        assert_eq!(ResponseCode::from_atom("X-GM-THING"), None);
    }

    #[test]
    fn unknown_name_is_first_word() {
        let code = ResponseCode::Unknown("X-CUSTOM 12 abc".into());
        assert_eq!(code.name(), "X-CUSTOM");
        assert_eq!(ResponseCode::ReadOnly.name(), "READ-ONLY");
    }

    #[test]
    fn serializes_with_payload() {
        let code = ResponseCode::UidNext(Uid::new(4392).unwrap());
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#"{"UidNext":4392}"#);
    }
}
