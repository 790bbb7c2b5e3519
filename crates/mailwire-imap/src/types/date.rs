//! INTERNALDATE text form: `17-Jul-1996 02:44:25 -0700`.

use chrono::{DateTime, FixedOffset};

const FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Parses an INTERNALDATE value. Space-padded days (` 7-Jul-...`) are accepted.
#[must_use]
pub fn parse_internal_date(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s.trim_start(), FORMAT).ok()
}

/// Formats a timestamp as an INTERNALDATE value (without quotes).
#[must_use]
pub fn format_internal_date(date: &DateTime<FixedOffset>) -> String {
    date.format(FORMAT).to_string()
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
    fn parses_rfc3501_example() {
        let date = parse_internal_date("17-Jul-1996 02:44:25 -0700").unwrap();
        assert_eq!(date.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(format_internal_date(&date), "17-Jul-1996 02:44:25 -0700");
    }

    #[test]
    fn accepts_space_padded_day() {
        assert!(parse_internal_date(" 7-Feb-2024 10:00:00 +0000").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_internal_date("yesterday").is_none());
    }
}
