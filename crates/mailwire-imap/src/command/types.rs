//! Argument types for commands.

use chrono::NaiveDate;

use crate::types::{Flags, ModSeq, SequenceSet, UidSet};

/// STATUS data items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// MESSAGES
    Messages,
    /// RECENT
    Recent,
    /// UIDNEXT
    UidNext,
    /// UIDVALIDITY
    UidValidity,
    /// UNSEEN
    Unseen,
    /// HIGHESTMODSEQ (CONDSTORE)
    HighestModSeq,
}

impl StatusAttribute {
    /// The counters every status request asks for.
    pub const STANDARD: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
            Self::HighestModSeq => "HIGHESTMODSEQ",
        }
    }
}

/// What a FETCH asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// Macro: FLAGS INTERNALDATE RFC822.SIZE ENVELOPE.
    All,
    /// Macro: FLAGS INTERNALDATE RFC822.SIZE.
    Fast,
    /// Macro: ALL plus BODY.
    Full,
    /// Explicit attribute list.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    /// Builds an explicit list.
    #[must_use]
    pub fn items(attributes: impl IntoIterator<Item = FetchAttribute>) -> Self {
        Self::Items(attributes.into_iter().collect())
    }
}

/// One FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// FLAGS
    Flags,
    /// INTERNALDATE
    InternalDate,
    /// RFC822.SIZE
    Rfc822Size,
    /// ENVELOPE
    Envelope,
    /// BODYSTRUCTURE
    BodyStructure,
    /// UID
    Uid,
    /// MODSEQ (CONDSTORE)
    ModSeq,
    /// `BODY[section]<start.len>` or `BODY.PEEK[...]`.
    Body {
        /// Section specifier; `None` is the whole message.
        section: Option<String>,
        /// Leave `\Seen` alone.
        peek: bool,
        /// Partial range: first octet and octet count.
        partial: Option<(u32, u32)>,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[]`: the whole message without setting `\Seen`.
    #[must_use]
    pub const fn full_body_peek() -> Self {
        Self::Body {
            section: None,
            peek: true,
            partial: None,
        }
    }
}

/// How STORE combines the given flags with the current set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// `+FLAGS`: union.
    Add,
    /// `-FLAGS`: difference.
    Remove,
    /// `FLAGS`: wholesale replace.
    Replace,
}

/// A STORE flag update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAction {
    /// Combination mode.
    pub mode: StoreMode,
    /// Flags to apply.
    pub flags: Flags,
    /// Suppress the untagged FETCH echo.
    pub silent: bool,
    /// CONDSTORE precondition.
    pub unchanged_since: Option<ModSeq>,
}

impl StoreAction {
    /// `+FLAGS`
    #[must_use]
    pub const fn add(flags: Flags) -> Self {
        Self::new(StoreMode::Add, flags)
    }

    /// `-FLAGS`
    #[must_use]
    pub const fn remove(flags: Flags) -> Self {
        Self::new(StoreMode::Remove, flags)
    }

    /// `FLAGS`
    #[must_use]
    pub const fn replace(flags: Flags) -> Self {
        Self::new(StoreMode::Replace, flags)
    }

    const fn new(mode: StoreMode, flags: Flags) -> Self {
        Self {
            mode,
            flags,
            silent: false,
            unchanged_since: None,
        }
    }

    /// Uses the `.SILENT` form.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Adds an `UNCHANGEDSINCE` precondition.
    #[must_use]
    pub const fn unchanged_since(mut self, mod_seq: ModSeq) -> Self {
        self.unchanged_since = Some(mod_seq);
        self
    }

    pub(crate) const fn item_name(&self) -> &'static str {
        match (self.mode, self.silent) {
            (StoreMode::Add, false) => "+FLAGS",
            (StoreMode::Add, true) => "+FLAGS.SILENT",
            (StoreMode::Remove, false) => "-FLAGS",
            (StoreMode::Remove, true) => "-FLAGS.SILENT",
            (StoreMode::Replace, false) => "FLAGS",
            (StoreMode::Replace, true) => "FLAGS.SILENT",
        }
    }
}

/// SEARCH keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// ALL
    All,
    /// ANSWERED
    Answered,
    /// DELETED
    Deleted,
    /// DRAFT
    Draft,
    /// FLAGGED
    Flagged,
    /// NEW
    New,
    /// RECENT
    Recent,
    /// SEEN
    Seen,
    /// UNANSWERED
    Unanswered,
    /// UNDELETED
    Undeleted,
    /// UNFLAGGED
    Unflagged,
    /// UNSEEN
    Unseen,
    /// KEYWORD
    Keyword(String),
    /// UNKEYWORD
    Unkeyword(String),
    /// Messages in a sequence set (or `$` for the saved result).
    SequenceSet(SequenceSet),
    /// UID
    Uid(UidSet),
    /// SUBJECT
    Subject(String),
    /// FROM
    From(String),
    /// TO
    To(String),
    /// CC
    Cc(String),
    /// BODY
    Body(String),
    /// TEXT
    Text(String),
    /// HEADER
    Header(String, String),
    /// SINCE (internal date)
    Since(NaiveDate),
    /// BEFORE (internal date)
    Before(NaiveDate),
    /// ON (internal date)
    On(NaiveDate),
    /// LARGER
    Larger(u32),
    /// SMALLER
    Smaller(u32),
    /// MODSEQ (CONDSTORE)
    ModSeq(ModSeq),
    /// Space-joined conjunction.
    And(Vec<Self>),
    /// OR
    Or(Box<Self>, Box<Self>),
    /// NOT
    Not(Box<Self>),
}

impl SearchCriteria {
    /// Returns true if any string argument is outside ASCII, which requires
    /// `CHARSET UTF-8`.
    #[must_use]
    pub fn needs_charset(&self) -> bool {
        match self {
            Self::Keyword(s)
            | Self::Unkeyword(s)
            | Self::Subject(s)
            | Self::From(s)
            | Self::To(s)
            | Self::Cc(s)
            | Self::Body(s)
            | Self::Text(s) => !s.is_ascii(),
            Self::Header(name, value) => !name.is_ascii() || !value.is_ascii(),
            Self::And(all) => all.iter().any(Self::needs_charset),
            Self::Or(a, b) => a.needs_charset() || b.needs_charset(),
            Self::Not(c) => c.needs_charset(),
            _ => false,
        }
    }
}

/// SORT key (RFC 5256).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// ARRIVAL
    Arrival,
    /// CC
    Cc,
    /// DATE
    Date,
    /// FROM
    From,
    /// SIZE
    Size,
    /// SUBJECT
    Subject,
    /// TO
    To,
}

impl SortKey {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Cc => "CC",
            Self::Date => "DATE",
            Self::From => "FROM",
            Self::Size => "SIZE",
            Self::Subject => "SUBJECT",
            Self::To => "TO",
        }
    }
}

/// A SORT key with direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCriterion {
    /// Key.
    pub key: SortKey,
    /// Descending.
    pub reverse: bool,
}

impl SortCriterion {
    /// Ascending order on `key`.
    #[must_use]
    pub const fn ascending(key: SortKey) -> Self {
        Self {
            key,
            reverse: false,
        }
    }

    /// Descending order on `key`.
    #[must_use]
    pub const fn descending(key: SortKey) -> Self {
        Self { key, reverse: true }
    }
}

/// LIST-EXTENDED selection and return options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListExtendedOptions {
    /// Selection option SUBSCRIBED.
    pub subscribed: bool,
    /// Selection option REMOTE.
    pub remote: bool,
    /// Return option CHILDREN.
    pub return_children: bool,
    /// Return option STATUS (LIST-STATUS).
    pub return_status: Vec<StatusAttribute>,
}
