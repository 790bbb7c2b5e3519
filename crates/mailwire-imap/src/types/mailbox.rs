//! Mailbox names, LIST attributes and STATUS data.

use serde::{Deserialize, Serialize};

use super::{ModSeq, Uid, UidValidity};

/// Full hierarchical mailbox name.
///
/// `INBOX` is case-insensitive; every other name compares exactly.
#[derive(Debug, Clone, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// The INBOX.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the INBOX.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        if self.is_inbox() && other.is_inbox() {
            return true;
        }
        self.0 == other.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute flag returned in LIST, LSUB or XLIST data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NoInferiors`
    NoInferiors,
    /// `\NonExistent` (LIST-EXTENDED)
    NonExistent,
    /// `\HasChildren`
    HasChildren,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\Subscribed`
    Subscribed,
    /// `\Remote`
    Remote,
    /// `\All`, also XLIST `\AllMail`
    All,
    /// `\Archive`
    Archive,
    /// `\Drafts`
    Drafts,
    /// `\Flagged`, also XLIST `\Starred`
    Flagged,
    /// `\Junk`, also XLIST `\Spam`
    Junk,
    /// `\Sent`
    Sent,
    /// `\Trash`
    Trash,
    /// `\Important`
    Important,
    /// XLIST `\Inbox`, the localized inbox alias.
    Inbox,
    /// Anything else.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses an attribute, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\SUBSCRIBED" => Self::Subscribed,
            "\\REMOTE" => Self::Remote,
            "\\ALL" | "\\ALLMAIL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" | "\\STARRED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            "\\IMPORTANT" => Self::Important,
            "\\INBOX" => Self::Inbox,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Returns true for RFC 6154 special-use attributes.
    #[must_use]
    pub const fn is_special_use(&self) -> bool {
        matches!(
            self,
            Self::All
                | Self::Archive
                | Self::Drafts
                | Self::Flagged
                | Self::Junk
                | Self::Sent
                | Self::Trash
                | Self::Important
        )
    }
}

/// Counters returned by STATUS (or LIST-STATUS).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxStatus {
    /// MESSAGES
    pub messages: Option<u32>,
    /// RECENT
    pub recent: Option<u32>,
    /// UNSEEN (a count here, unlike the UNSEEN response code)
    pub unseen: Option<u32>,
    /// UIDNEXT
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY
    pub uid_validity: Option<UidValidity>,
    /// HIGHESTMODSEQ
    pub highest_mod_seq: Option<ModSeq>,
}

/// One mailbox as returned by LIST, LSUB or XLIST.
///
/// This is the listed, not-open form of a mailbox. Opening it produces an
/// [`OpenedMailbox`](crate::model::OpenedMailbox) snapshot instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Name attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy separator, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Full name.
    pub mailbox: Mailbox,
    /// CHILDINFO extended data, e.g. `SUBSCRIBED`.
    pub child_info: Vec<String>,
    /// Counters, filled from LIST-STATUS or a follow-up STATUS.
    pub status: Option<MailboxStatus>,
}

impl ListResponse {
    /// Creates an entry without extended data.
    #[must_use]
    pub const fn new(mailbox: Mailbox, delimiter: Option<char>, attributes: Vec<MailboxAttribute>) -> Self {
        Self {
            attributes,
            delimiter,
            mailbox,
            child_info: Vec::new(),
            status: None,
        }
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn has(&self, attr: &MailboxAttribute) -> bool {
        self.attributes.contains(attr)
    }

    /// Returns true unless `\Noselect` or `\NonExistent`.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.has(&MailboxAttribute::NoSelect) && !self.has(&MailboxAttribute::NonExistent)
    }

    /// Returns true if the mailbox may have child mailboxes.
    #[must_use]
    pub fn can_have_children(&self) -> bool {
        self.delimiter.is_some() && !self.has(&MailboxAttribute::NoInferiors)
    }

    /// The last hierarchy component of the name.
    #[must_use]
    pub fn leaf_name(&self) -> &str {
        let name = self.mailbox.as_str();
        self.delimiter
            .and_then(|d| name.rsplit_once(d))
            .map_or(name, |(_, leaf)| leaf)
    }

    /// The parent's full name, if the name has more than one component.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        let d = self.delimiter?;
        self.mailbox.as_str().rsplit_once(d).map(|(parent, _)| parent)
    }

    /// LIST pattern selecting this mailbox's children.
    ///
    /// `*` matches all descendants, `%` only direct children. Returns `None`
    /// when the mailbox cannot have children.
    #[must_use]
    pub fn children_pattern(&self, top_level_only: bool) -> Option<String> {
        if !self.can_have_children() {
            return None;
        }
        let d = self.delimiter?;
        let wildcard = if top_level_only { '%' } else { '*' };
        Some(format!("{}{d}{wildcard}", self.mailbox))
    }

    /// Joins a child leaf name onto this mailbox's name.
    #[must_use]
    pub fn child_name(&self, leaf: &str) -> Option<Mailbox> {
        let d = self.delimiter?;
        Some(Mailbox::new(format!("{}{d}{leaf}", self.mailbox)))
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

    mod mailbox_tests {
        use super::*;

        #[test]
        fn inbox_is_case_insensitive() {
            assert_eq!(Mailbox::new("inbox"), Mailbox::inbox());
            assert_eq!(Mailbox::new("Inbox").as_str(), "INBOX");
            assert_ne!(Mailbox::new("Sent"), Mailbox::new("sent"));
        }
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn xlist_aliases_map_to_special_use() {
            assert_eq!(MailboxAttribute::parse("\\AllMail"), MailboxAttribute::All);
            assert_eq!(MailboxAttribute::parse("\\Starred"), MailboxAttribute::Flagged);
            assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
            assert_eq!(MailboxAttribute::parse("\\Inbox"), MailboxAttribute::Inbox);
        }

        #[test]
        fn unknown_keeps_text() {
            assert_eq!(
                MailboxAttribute::parse("\\Custom"),
                MailboxAttribute::Unknown("\\Custom".into())
            );
            assert!(MailboxAttribute::Trash.is_special_use());
            assert!(!MailboxAttribute::NoSelect.is_special_use());
        }
    }

    mod list_response_tests {
        use super::*;

        fn entry(name: &str, delimiter: Option<char>, attrs: &[&str]) -> ListResponse {
            ListResponse::new(
                Mailbox::new(name),
                delimiter,
                attrs.iter().map(|a| MailboxAttribute::parse(a)).collect(),
            )
        }

        #[test]
        fn hierarchy_helpers() {
            let mb = entry("Work/Projects/2024", Some('/'), &[]);
            assert_eq!(mb.leaf_name(), "2024");
            assert_eq!(mb.parent_name(), Some("Work/Projects"));
            assert_eq!(mb.children_pattern(false).unwrap(), "Work/Projects/2024/*");
            assert_eq!(mb.children_pattern(true).unwrap(), "Work/Projects/2024/%");
            assert_eq!(mb.child_name("Q1").unwrap().as_str(), "Work/Projects/2024/Q1");
        }

        #[test]
        fn no_children_without_delimiter_or_with_noinferiors() {
            assert!(entry("Flat", None, &[]).children_pattern(false).is_none());
            assert!(
                entry("Leaf", Some('.'), &["\\NoInferiors"])
                    .children_pattern(false)
                    .is_none()
            );
        }

        #[test]
        fn selectability() {
            assert!(entry("A", Some('/'), &["\\HasChildren"]).is_selectable());
            assert!(!entry("B", Some('/'), &["\\Noselect"]).is_selectable());
            assert!(!entry("C", Some('/'), &["\\NonExistent"]).is_selectable());
        }
    }
}
