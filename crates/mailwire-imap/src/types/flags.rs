//! Message flags and flag sets.

use serde::{Deserialize, Serialize};

/// A system flag or keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`, server-managed and never settable by a client.
    Recent,
    /// `\*` in PERMANENTFLAGS: new keywords may be created.
    Wildcard,
    /// Keyword such as `$Forwarded` or an unrecognized `\Extension`.
    Keyword(String),
}

impl Flag {
    /// Parses a flag, matching system flags case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if !s.starts_with('\\') {
            return Self::Keyword(s.to_string());
        }
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            "\\*" => Self::Wildcard,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Wire form of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Wildcard => "\\*",
            Self::Keyword(s) => s,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { flags: Vec::new() }
    }

    /// Creates a set from a vector, dropping duplicates.
    #[must_use]
    pub fn from_vec(flags: Vec<Flag>) -> Self {
        flags.into_iter().collect()
    }

    /// Adds a flag if absent.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.flags.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Adds every flag of `other` (`+FLAGS`).
    pub fn union_with(&mut self, other: &Self) {
        for flag in &other.flags {
            self.insert(flag.clone());
        }
    }

    /// Removes every flag of `other` (`-FLAGS`).
    pub fn subtract(&mut self, other: &Self) {
        self.flags.retain(|f| !other.contains(f));
    }

    /// Returns a copy without `\Recent`, which APPEND cannot carry.
    #[must_use]
    pub fn without_recent(&self) -> Self {
        self.flags
            .iter()
            .filter(|f| **f != Flag::Recent)
            .cloned()
            .collect()
    }

    /// Returns true if `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Returns true if `\Deleted` is set.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Returns true if `\Flagged` is set.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.contains(&Flag::Flagged)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Number of flags.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Compares as sets, ignoring order.
    #[must_use]
    pub fn same_members(&self, other: &Self) -> bool {
        self.len() == other.len() && self.flags.iter().all(|f| other.contains(f))
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.into_iter()
    }
}

impl<'a> IntoIterator for &'a Flags {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.iter()
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, flag) in self.flags.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(flag.as_str())?;
        }
        f.write_str(")")
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

    fn flags(items: &[&str]) -> Flags {
        items.iter().map(|s| Flag::parse(s)).collect()
    }

    mod flag_tests {
        use super::*;

        #[test]
        fn system_flags_ignore_case() {
            assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
            assert_eq!(Flag::parse("\\deleted"), Flag::Deleted);
            assert_eq!(Flag::parse("\\*"), Flag::Wildcard);
        }

        #[test]
        fn keywords_keep_their_text() {
            assert_eq!(Flag::parse("$label1"), Flag::Keyword("$label1".into()));
            assert_eq!(Flag::parse("\\Custom").as_str(), "\\Custom");
        }
    }

    mod flags_tests {
        use super::*;

        #[test]
        fn union_is_additive() {
            let mut f = flags(&["\\Seen"]);
            f.union_with(&flags(&["\\Draft", "\\Seen"]));
            assert!(f.same_members(&flags(&["\\Seen", "\\Draft"])));
        }

        #[test]
        fn subtract_removes_only_named() {
            let mut f = flags(&["\\Seen", "\\Flagged", "$x"]);
            f.subtract(&flags(&["\\Flagged"]));
            assert!(f.same_members(&flags(&["\\Seen", "$x"])));
        }

        #[test]
        fn without_recent_drops_recent() {
            let f = flags(&["\\Recent", "\\Answered"]).without_recent();
            assert_eq!(f.to_string(), "(\\Answered)");
        }

        #[test]
        fn duplicates_are_collapsed() {
            assert_eq!(flags(&["\\Seen", "\\Seen"]).len(), 1);
        }

        #[test]
        fn display_is_parenthesized() {
            assert_eq!(Flags::new().to_string(), "()");
            assert_eq!(flags(&["\\Seen", "$a"]).to_string(), "(\\Seen $a)");
        }
    }
}
