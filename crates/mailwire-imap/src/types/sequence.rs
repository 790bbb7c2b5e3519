//! Sequence sets: ordered, compact lists of message numbers and ranges.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::{SeqNum, Uid};

/// One element of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetItem {
    /// A single number.
    Number(u32),
    /// Inclusive range `a:b`, kept in the order the caller wrote it.
    Range(u32, u32),
    /// `n:*`, from `n` to the largest number in the mailbox.
    From(u32),
    /// `*`, the largest number in the mailbox.
    Last,
}

impl SetItem {
    fn contains(self, n: u32, last: Option<u32>) -> bool {
        match self {
            Self::Number(v) => v == n,
            Self::Range(a, b) => (a.min(b)..=a.max(b)).contains(&n),
            Self::From(a) => last.map_or(n >= a, |l| (a.min(l)..=a.max(l)).contains(&n)),
            Self::Last => last == Some(n),
        }
    }
}

impl std::fmt::Display for SetItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Range(a, b) => write!(f, "{a}:{b}"),
            Self::From(a) => write!(f, "{a}:*"),
            Self::Last => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Repr {
    Items(Vec<SetItem>),
    Saved,
}

/// An immutable, order-preserving set of message numbers.
///
/// Serializes to the wire form `n:m,k`. Consecutive ascending numbers are
/// merged into ranges when the set is built from individual numbers; the
/// caller's ordering is otherwise kept. The special [`SequenceSet::saved`]
/// value is the SEARCHRES `$` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSet(Repr);

impl SequenceSet {
    /// A set holding one number. Returns `None` for zero.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        (n != 0).then(|| Self(Repr::Items(vec![SetItem::Number(n)])))
    }

    /// The inclusive range `start:end`. Returns `None` if either end is zero.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        if start == 0 || end == 0 {
            return None;
        }
        let item = if start == end {
            SetItem::Number(start)
        } else {
            SetItem::Range(start, end)
        };
        Some(Self(Repr::Items(vec![item])))
    }

    /// `start:*`. Returns `None` for zero.
    #[must_use]
    pub fn range_from(start: u32) -> Option<Self> {
        (start != 0).then(|| Self(Repr::Items(vec![SetItem::From(start)])))
    }

    /// `1:*`, every message.
    #[must_use]
    pub fn all() -> Self {
        Self(Repr::Items(vec![SetItem::From(1)]))
    }

    /// `*`, the last message.
    #[must_use]
    pub fn last() -> Self {
        Self(Repr::Items(vec![SetItem::Last]))
    }

    /// The saved search result reference `$` (RFC 5182).
    #[must_use]
    pub const fn saved() -> Self {
        Self(Repr::Saved)
    }

    /// Builds a compact set from numbers in caller order.
    ///
    /// Runs of consecutive ascending numbers collapse into ranges. Zeros are
    /// skipped. Returns `None` if nothing remains.
    pub fn from_numbers(numbers: impl IntoIterator<Item = u32>) -> Option<Self> {
        let mut items: Vec<SetItem> = Vec::new();
        for n in numbers.into_iter().filter(|&n| n != 0) {
            match items.last_mut() {
                Some(SetItem::Number(prev)) if prev.checked_add(1) == Some(n) => {
                    *items.last_mut()? = SetItem::Range(*prev, n);
                }
                Some(SetItem::Range(a, b)) if *a <= *b && b.checked_add(1) == Some(n) => {
                    *b = n;
                }
                _ => items.push(SetItem::Number(n)),
            }
        }
        (!items.is_empty()).then_some(Self(Repr::Items(items)))
    }

    /// Builds a set from sequence numbers.
    pub fn from_seqs(seqs: impl IntoIterator<Item = SeqNum>) -> Option<Self> {
        Self::from_numbers(seqs.into_iter().map(SeqNum::get))
    }

    /// Parses the wire form (`1:3,7,9:*`, or `$`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s == "$" {
            return Some(Self::saved());
        }
        let parse_num = |t: &str| t.parse::<u32>().ok().filter(|&n| n != 0);
        let mut items = Vec::new();
        for part in s.split(',') {
            let item = match part.split_once(':') {
                None if part == "*" => SetItem::Last,
                None => SetItem::Number(parse_num(part)?),
                Some(("*", "*")) => SetItem::Last,
                Some((a, "*")) | Some(("*", a)) => SetItem::From(parse_num(a)?),
                Some((a, b)) => SetItem::Range(parse_num(a)?, parse_num(b)?),
            };
            items.push(item);
        }
        (!items.is_empty()).then_some(Self(Repr::Items(items)))
    }

    /// Returns true for the `$` reference.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self.0, Repr::Saved)
    }

    /// Returns the items, or an empty slice for `$`.
    #[must_use]
    pub fn items(&self) -> &[SetItem] {
        match &self.0 {
            Repr::Items(items) => items,
            Repr::Saved => &[],
        }
    }

    /// Returns true if the set only names concrete numbers (no `*`, no `$`).
    #[must_use]
    pub fn is_finite(&self) -> bool {
        !self.is_saved()
            && self
                .items()
                .iter()
                .all(|i| matches!(i, SetItem::Number(_) | SetItem::Range(..)))
    }

    /// Tests membership. `last` resolves `*`; without it `n:*` is open-ended
    /// and `*` matches nothing.
    #[must_use]
    pub fn contains(&self, n: u32, last: Option<u32>) -> bool {
        self.items().iter().any(|i| i.contains(n, last))
    }

    /// Expands to individual numbers in set order, resolving `*` to `last`.
    ///
    /// Open ends without `last` are dropped.
    #[must_use]
    pub fn expand(&self, last: Option<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        for item in self.items() {
            match *item {
                SetItem::Number(n) => out.push(n),
                SetItem::Range(a, b) if a <= b => out.extend(a..=b),
                SetItem::Range(a, b) => out.extend((b..=a).rev()),
                SetItem::From(a) => {
                    if let Some(l) = last {
                        out.extend(a.min(l)..=a.max(l));
                    }
                }
                SetItem::Last => out.extend(last),
            }
        }
        out
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Repr::Saved => f.write_char('$'),
            Repr::Items(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// A sequence set whose numbers are UIDs.
///
/// Commands built from a `UidSet` always go out as `UID <verb>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UidSet(pub SequenceSet);

impl UidSet {
    /// A set holding one UID.
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self(SequenceSet(Repr::Items(vec![SetItem::Number(uid.get())])))
    }

    /// Builds a compact set from UIDs in caller order.
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Option<Self> {
        SequenceSet::from_numbers(uids.into_iter().map(Uid::get)).map(Self)
    }

    /// Every UID, `1:*`.
    #[must_use]
    pub fn all() -> Self {
        Self(SequenceSet::all())
    }

    /// Returns the underlying number set.
    #[must_use]
    pub const fn as_sequence_set(&self) -> &SequenceSet {
        &self.0
    }

    /// Expands to UIDs, dropping open ends.
    #[must_use]
    pub fn uids(&self) -> Vec<Uid> {
        self.0.expand(None).into_iter().filter_map(Uid::new).collect()
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
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
    use proptest::prelude::*;

    mod sequence_set_tests {
        use super::*;

        #[test]
        fn zero_is_rejected() {
            assert!(SequenceSet::single(0).is_none());
            assert!(SequenceSet::range(0, 4).is_none());
            assert!(SequenceSet::range(4, 0).is_none());
            assert!(SequenceSet::from_numbers([0, 0]).is_none());
        }

        #[test]
        fn display_forms() {
            assert_eq!(SequenceSet::single(42).unwrap().to_string(), "42");
            assert_eq!(SequenceSet::range(1, 100).unwrap().to_string(), "1:100");
            assert_eq!(SequenceSet::range(7, 7).unwrap().to_string(), "7");
            assert_eq!(SequenceSet::range_from(50).unwrap().to_string(), "50:*");
            assert_eq!(SequenceSet::all().to_string(), "1:*");
            assert_eq!(SequenceSet::last().to_string(), "*");
            assert_eq!(SequenceSet::saved().to_string(), "$");
        }

        #[test]
        fn compacts_runs_in_caller_order() {
            let set = SequenceSet::from_numbers([1, 2, 3, 7, 5, 6, 2]).unwrap();
            assert_eq!(set.to_string(), "1:3,7,5:6,2");
        }

        #[test]
        fn parse_round_trips_display() {
            for text in ["1", "1:3,7", "9:*", "*", "$", "4:2"] {
                assert_eq!(SequenceSet::parse(text).unwrap().to_string(), text);
            }
            assert!(SequenceSet::parse("").is_none());
            assert!(SequenceSet::parse("0").is_none());
            assert!(SequenceSet::parse("a:b").is_none());
        }

        #[test]
        fn expand_resolves_star() {
            let set = SequenceSet::parse("2,5:*").unwrap();
            assert_eq!(set.expand(Some(7)), vec![2, 5, 6, 7]);
            assert_eq!(set.expand(None), vec![2]);
            assert!(set.contains(6, None));
            assert!(!set.contains(3, Some(7)));
        }

        #[test]
        fn finiteness() {
            assert!(SequenceSet::from_numbers([1, 2, 9]).unwrap().is_finite());
            assert!(!SequenceSet::all().is_finite());
            assert!(!SequenceSet::saved().is_finite());
        }
    }

    mod uid_set_tests {
        use super::*;

        #[test]
        fn uids_expand() {
            let set = UidSet::from_uids([10, 11, 12, 40].map(|n| Uid::new(n).unwrap())).unwrap();
            assert_eq!(set.to_string(), "10:12,40");
            assert_eq!(set.uids().len(), 4);
        }
    }

    proptest! {
        #[test]
        fn compaction_preserves_members_and_order(numbers in prop::collection::vec(1u32..500, 1..60)) {
            let set = SequenceSet::from_numbers(numbers.clone()).unwrap();
            prop_assert_eq!(set.expand(None), numbers);
        }
    }
}
