//! STAT, LIST and UIDL listings.

use crate::error::{Error, Result};

fn fields<'a>(text: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    let mut parts = text.split_ascii_whitespace();
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(Error::Malformed(format!("{what}: {text:?}"))),
    }
}

fn number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T> {
    s.parse()
        .map_err(|_| Error::Malformed(format!("{what}: bad number {s:?}")))
}

/// STAT: message count and total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropListing {
    /// Number of messages.
    pub count: u32,
    /// Size of the maildrop in octets.
    pub size: u64,
}

impl DropListing {
    /// Parses the text after `+OK`. Anything after the size is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if either number is missing or invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let (count, size) = fields(text, "drop listing")?;
        Ok(Self {
            count: number(count, "drop listing")?,
            size: number(size, "drop listing")?,
        })
    }
}

/// LIST: one message and its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanListing {
    /// Message number.
    pub number: u32,
    /// Size in octets.
    pub size: u64,
}

impl ScanListing {
    /// Parses one scan listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if either number is missing or invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let (n, size) = fields(text, "scan listing")?;
        Ok(Self {
            number: number(n, "scan listing")?,
            size: number(size, "scan listing")?,
        })
    }
}

/// UIDL: one message and its unique id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIdListing {
    /// Message number.
    pub number: u32,
    /// Unique id, 1 to 70 printable characters.
    pub uid: String,
}

impl UniqueIdListing {
    /// Parses one unique-id listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if a field is missing or invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let (n, uid) = fields(text, "unique-id listing")?;
        Ok(Self {
            number: number(n, "unique-id listing")?,
            uid: uid.to_string(),
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
    fn drop_listing_ignores_trailing_text() {
        let stat = DropListing::parse("2 320 octets total").unwrap();
        assert_eq!(stat, DropListing { count: 2, size: 320 });
    }

    #[test]
    fn scan_and_uid_listings() {
        assert_eq!(ScanListing::parse("1 120").unwrap(), ScanListing { number: 1, size: 120 });
        let uidl = UniqueIdListing::parse("2 QhdPYR:00WBw1Ph7x7").unwrap();
        assert_eq!(uidl.number, 2);
        assert_eq!(uidl.uid, "QhdPYR:00WBw1Ph7x7");
    }

    #[test]
    fn malformed_listings() {
        assert!(matches!(DropListing::parse("2"), Err(Error::Malformed(_))));
        assert!(matches!(ScanListing::parse("x 12"), Err(Error::Malformed(_))));
        assert!(matches!(UniqueIdListing::parse(""), Err(Error::Malformed(_))));
    }
}
