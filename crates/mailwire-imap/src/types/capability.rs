//! Server capabilities and completion status.

use serde::{Deserialize, Serialize};

/// Condition of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// OK
    Ok,
    /// NO: operational failure.
    No,
    /// BAD: protocol or syntax error.
    Bad,
    /// PREAUTH greeting.
    PreAuth,
    /// BYE: server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true for OK and PREAUTH.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advertised capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `IMAP4rev2`
    Imap4Rev2,
    /// IDLE (RFC 2177)
    Idle,
    /// NAMESPACE (RFC 2342)
    Namespace,
    /// UIDPLUS (RFC 4315)
    UidPlus,
    /// MOVE (RFC 6851)
    Move,
    /// LITERAL+ (RFC 7888)
    LiteralPlus,
    /// STARTTLS
    StartTls,
    /// LOGINDISABLED
    LoginDisabled,
    /// SASL-IR (RFC 4959)
    SaslIr,
    /// `AUTH=<mechanism>`
    Auth(String),
    /// ENABLE (RFC 5161)
    Enable,
    /// CONDSTORE (RFC 7162)
    CondStore,
    /// ID (RFC 2971)
    Id,
    /// UNSELECT (RFC 3691)
    Unselect,
    /// LIST-EXTENDED (RFC 5258)
    ListExtended,
    /// LIST-STATUS (RFC 5819)
    ListStatus,
    /// SPECIAL-USE (RFC 6154)
    SpecialUse,
    /// ESEARCH (RFC 4731)
    ESearch,
    /// SEARCHRES (RFC 5182)
    SearchRes,
    /// QUOTA (RFC 2087)
    Quota,
    /// SORT (RFC 5256)
    Sort,
    /// XLIST (legacy Gmail)
    XList,
    /// MULTIAPPEND (RFC 3502)
    MultiAppend,
    /// CHILDREN (RFC 3348)
    Children,
    /// Anything else, verbatim.
    Unknown(String),
}

impl Capability {
    /// Parses a capability atom, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "IDLE" => Self::Idle,
            "NAMESPACE" => Self::Namespace,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "LITERAL+" => Self::LiteralPlus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SASL-IR" => Self::SaslIr,
            "ENABLE" => Self::Enable,
            "CONDSTORE" => Self::CondStore,
            "ID" => Self::Id,
            "UNSELECT" => Self::Unselect,
            "LIST-EXTENDED" => Self::ListExtended,
            "LIST-STATUS" => Self::ListStatus,
            "SPECIAL-USE" => Self::SpecialUse,
            "ESEARCH" => Self::ESearch,
            "SEARCHRES" => Self::SearchRes,
            "QUOTA" => Self::Quota,
            "SORT" => Self::Sort,
            "XLIST" => Self::XList,
            "MULTIAPPEND" => Self::MultiAppend,
            "CHILDREN" => Self::Children,
            _ => match upper.strip_prefix("AUTH=") {
                Some(_) => Self::Auth(s[5..].to_ascii_uppercase()),
                None => Self::Unknown(s.to_string()),
            },
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Imap4Rev1 => "IMAP4rev1",
            Self::Imap4Rev2 => "IMAP4rev2",
            Self::Idle => "IDLE",
            Self::Namespace => "NAMESPACE",
            Self::UidPlus => "UIDPLUS",
            Self::Move => "MOVE",
            Self::LiteralPlus => "LITERAL+",
            Self::StartTls => "STARTTLS",
            Self::LoginDisabled => "LOGINDISABLED",
            Self::SaslIr => "SASL-IR",
            Self::Auth(mech) => return write!(f, "AUTH={mech}"),
            Self::Enable => "ENABLE",
            Self::CondStore => "CONDSTORE",
            Self::Id => "ID",
            Self::Unselect => "UNSELECT",
            Self::ListExtended => "LIST-EXTENDED",
            Self::ListStatus => "LIST-STATUS",
            Self::SpecialUse => "SPECIAL-USE",
            Self::ESearch => "ESEARCH",
            Self::SearchRes => "SEARCHRES",
            Self::Quota => "QUOTA",
            Self::Sort => "SORT",
            Self::XList => "XLIST",
            Self::MultiAppend => "MULTIAPPEND",
            Self::Children => "CHILDREN",
            Self::Unknown(s) => s,
        };
        f.write_str(s)
    }
}

/// Snapshot of the capabilities learned in one negotiation.
///
/// Never merged: a new CAPABILITY response replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    /// Wraps a capability list.
    #[must_use]
    pub const fn new(caps: Vec<Capability>) -> Self {
        Self(caps)
    }

    /// Returns true if `cap` was advertised.
    #[must_use]
    pub fn has(&self, cap: &Capability) -> bool {
        self.0.contains(cap)
    }

    /// Returns true if `AUTH=<mechanism>` was advertised.
    #[must_use]
    pub fn has_auth(&self, mechanism: &str) -> bool {
        self.0
            .iter()
            .any(|c| matches!(c, Capability::Auth(m) if m.eq_ignore_ascii_case(mechanism)))
    }

    /// Returns true if nothing has been learned yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
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
    fn status_ok_includes_preauth() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert_eq!(Status::Bad.to_string(), "BAD");
    }

    #[test]
    fn parse_extension_capabilities() {
        assert_eq!(Capability::parse("list-status"), Capability::ListStatus);
        assert_eq!(Capability::parse("SASL-IR"), Capability::SaslIr);
        assert_eq!(Capability::parse("auth=xoauth2"), Capability::Auth("XOAUTH2".into()));
        assert_eq!(Capability::parse("X-GM-EXT-1"), Capability::Unknown("X-GM-EXT-1".into()));
    }

    #[test]
    fn display_round_trips() {
        for text in ["IMAP4rev1", "LIST-EXTENDED", "AUTH=PLAIN", "XYZZY"] {
            assert_eq!(Capability::parse(text).to_string(), text);
        }
    }

    #[test]
    fn set_lookup() {
        let set: CapabilitySet = ["IMAP4rev1", "IDLE", "AUTH=PLAIN"]
            .into_iter()
            .map(Capability::parse)
            .collect();
        assert!(set.has(&Capability::Idle));
        assert!(!set.has(&Capability::Move));
        assert!(set.has_auth("plain"));
        assert!(!set.has_auth("LOGIN"));
    }
}
