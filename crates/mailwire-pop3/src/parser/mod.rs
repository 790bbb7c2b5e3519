//! POP3 response parsing.
//!
//! Lines arrive with the CRLF already stripped. Status lines are decoded
//! lossily as UTF-8; multi-line payloads stay raw bytes.

use crate::error::{Error, Result};
use crate::types::{ExtendedCode, StatusLine};

/// Parses a `+OK` / `-ERR` status line.
///
/// An RFC 2449 extended code (`-ERR [IN-USE] ...`) is split off the text.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the line starts with neither indicator.
pub fn parse_status(line: &[u8]) -> Result<StatusLine> {
    let text = String::from_utf8_lossy(line);
    let (ok, rest) = if let Some(rest) = strip_indicator(&text, "+OK") {
        (true, rest)
    } else if let Some(rest) = strip_indicator(&text, "-ERR") {
        (false, rest)
    } else {
        return Err(Error::Malformed(format!("status line: {text:?}")));
    };

    let (code, text) = split_code(rest);
    Ok(StatusLine {
        ok,
        code,
        text: text.to_string(),
    })
}

fn strip_indicator<'a>(line: &'a str, indicator: &str) -> Option<&'a str> {
    let head = line.get(..indicator.len())?;
    if !head.eq_ignore_ascii_case(indicator) {
        return None;
    }
    let rest = &line[indicator.len()..];
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

fn split_code(text: &str) -> (Option<ExtendedCode>, &str) {
    let Some(inner) = text.strip_prefix('[') else {
        return (None, text);
    };
    match inner.find(']') {
        Some(end) => (
            Some(ExtendedCode::parse(&inner[..end])),
            inner[end + 1..].trim_start(),
        ),
        None => (None, text),
    }
}

/// Returns true for a SASL continuation line (`+ ` or a bare `+`).
#[must_use]
pub fn is_continuation(line: &[u8]) -> bool {
    line == b"+" || line.starts_with(b"+ ")
}

/// Returns the base64 payload of a continuation line.
#[must_use]
pub fn continuation_payload(line: &[u8]) -> &[u8] {
    line.get(2..).unwrap_or_default()
}

/// Undoes byte-stuffing on one line of a multi-line response.
///
/// Returns `None` for the `.` terminator.
#[must_use]
pub fn unstuff(line: &[u8]) -> Option<&[u8]> {
    match line {
        b"." => None,
        [b'.', rest @ ..] => Some(rest),
        _ => Some(line),
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
    fn test_parse_ok() {
        let status = parse_status(b"+OK 2 messages").unwrap();
        assert!(status.ok);
        assert_eq!(status.code, None);
        assert_eq!(status.text, "2 messages");

        let bare = parse_status(b"+OK").unwrap();
        assert!(bare.ok);
        assert_eq!(bare.text, "");
    }

    #[test]
    fn test_parse_err_with_code() {
        let status = parse_status(b"-ERR [IN-USE] Do you have another POP session running?").unwrap();
        assert!(!status.ok);
        assert_eq!(status.code, Some(ExtendedCode::InUse));
        assert_eq!(status.text, "Do you have another POP session running?");
    }

    #[test]
    fn test_unclosed_bracket_is_text() {
        let status = parse_status(b"-ERR [oops").unwrap();
        assert_eq!(status.code, None);
        assert_eq!(status.text, "[oops");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_status(b"* OK imap").is_err());
        assert!(parse_status(b"+OKAY").is_err());
        assert!(parse_status(b"").is_err());
    }

    #[test]
    fn test_continuation() {
        assert!(is_continuation(b"+ PDEyMz4="));
        assert!(is_continuation(b"+"));
        assert!(!is_continuation(b"+OK"));
        assert_eq!(continuation_payload(b"+ PDEyMz4="), b"PDEyMz4=");
        assert_eq!(continuation_payload(b"+"), b"");
    }

    #[test]
    fn test_unstuff() {
        assert_eq!(unstuff(b"."), None);
        assert_eq!(unstuff(b"..signature"), Some(&b".signature"[..]));
        assert_eq!(unstuff(b"body"), Some(&b"body"[..]));
        assert_eq!(unstuff(b""), Some(&b""[..]));
    }
}
