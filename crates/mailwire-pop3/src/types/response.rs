//! Status lines and RFC 2449 extended response codes.

/// Extended response code carried in `-ERR [CODE] text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtendedCode {
    /// IN-USE: the maildrop is locked by another session.
    InUse,
    /// LOGIN-DELAY: logged in too recently.
    LoginDelay,
    /// SYS/TEMP: temporary system problem.
    SysTemp,
    /// SYS/PERM: permanent system problem.
    SysPerm,
    /// AUTH: credentials were wrong (RFC 3206).
    Auth,
    /// Any other code, upper-cased.
    Other(String),
}

impl ExtendedCode {
    /// Parses a code name without brackets.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "IN-USE" => Self::InUse,
            "LOGIN-DELAY" => Self::LoginDelay,
            "SYS/TEMP" => Self::SysTemp,
            "SYS/PERM" => Self::SysPerm,
            "AUTH" => Self::Auth,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::InUse | Self::LoginDelay | Self::SysTemp)
    }
}

/// A `+OK` or `-ERR` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// `+OK`
    pub ok: bool,
    /// Extended code, when the text starts with `[...]`.
    pub code: Option<ExtendedCode>,
    /// Text after the indicator and code.
    pub text: String,
}

/// The server greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Banner text.
    pub text: String,
    /// APOP timestamp (`<...@...>`), if the banner carries one.
    pub timestamp: Option<String>,
}

impl Greeting {
    /// Extracts the APOP timestamp from the banner.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let timestamp = text.find('<').and_then(|start| {
            text[start..]
                .find('>')
                .map(|end| text[start..=start + end].to_string())
        });
        Self {
            text: text.to_string(),
            timestamp,
        }
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
    fn greeting_timestamp() {
        let greeting = Greeting::from_text("POP3 server ready <1896.697170952@dbc.mtview.ca.us>");
        assert_eq!(
            greeting.timestamp.as_deref(),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
        assert_eq!(Greeting::from_text("ready").timestamp, None);
        assert_eq!(Greeting::from_text("broken <stamp").timestamp, None);
    }

    #[test]
    fn extended_codes() {
        assert_eq!(ExtendedCode::parse("in-use"), ExtendedCode::InUse);
        assert_eq!(ExtendedCode::parse("SYS/PERM"), ExtendedCode::SysPerm);
        assert_eq!(ExtendedCode::parse("x-odd"), ExtendedCode::Other("X-ODD".into()));
        assert!(ExtendedCode::LoginDelay.is_transient());
        assert!(!ExtendedCode::Auth.is_transient());
    }
}
