//! Command tag allocation.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::Tag;

/// Hands out sequential tags (`A0001`, `A0002`, ...).
///
/// The counter wraps after `u32::MAX`; a tag is only required to be unique
/// among outstanding commands, and at most one is outstanding per session.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(1),
            prefix,
        }
    }

    /// Allocates the next tag.
    #[must_use]
    pub fn next(&self) -> Tag {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Tag::new(format!("{}{n:04}", self.prefix))
    }

    /// Number the next tag will carry.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
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
    fn sequential_tags() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next().as_str(), "A0001");
        assert_eq!(generator.next().as_str(), "A0002");
        assert_eq!(generator.current(), 3);
    }

    #[test]
    fn padding_grows_past_four_digits() {
        let generator = TagGenerator::new('X');
        generator.counter.store(12_345, Ordering::Relaxed);
        assert_eq!(generator.next().as_str(), "X12345");
    }

    #[test]
    fn wraps_instead_of_panicking() {
        let generator = TagGenerator::default();
        generator.counter.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(generator.next().as_str(), format!("A{}", u32::MAX));
        assert_eq!(generator.next().as_str(), "A0000");
    }

    #[test]
    fn tags_are_unique() {
        let generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generator.next()));
        }
    }
}
