//! CAPA response types (RFC 2449).

/// One capability line from CAPA.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// TOP
    Top,
    /// USER
    User,
    /// SASL with the advertised mechanisms.
    Sasl(Vec<String>),
    /// RESP-CODES: `-ERR` lines may carry extended codes.
    RespCodes,
    /// LOGIN-DELAY with the minimum seconds between logins.
    LoginDelay(Option<u32>),
    /// PIPELINING
    Pipelining,
    /// EXPIRE with the retention policy (`NEVER` or days).
    Expire(Option<String>),
    /// UIDL
    Uidl,
    /// IMPLEMENTATION with the server's self-description.
    Implementation(String),
    /// STLS (RFC 2595)
    Stls,
    /// AUTH-RESP-CODE (RFC 3206)
    AuthRespCode,
    /// Unknown capability, kept as the raw line.
    Unknown(String),
}

impl Capability {
    /// Parses one capability line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };
        match keyword.to_ascii_uppercase().as_str() {
            "TOP" => Self::Top,
            "USER" => Self::User,
            "SASL" => Self::Sasl(parts.map(str::to_ascii_uppercase).collect()),
            "RESP-CODES" => Self::RespCodes,
            "LOGIN-DELAY" => Self::LoginDelay(parts.next().and_then(|s| s.parse().ok())),
            "PIPELINING" => Self::Pipelining,
            "EXPIRE" => Self::Expire(parts.next().map(str::to_string)),
            "UIDL" => Self::Uidl,
            "IMPLEMENTATION" => {
                let rest = line[keyword.len()..].trim();
                Self::Implementation(rest.to_string())
            }
            "STLS" => Self::Stls,
            "AUTH-RESP-CODE" => Self::AuthRespCode,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// The capability list returned by CAPA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(Vec<Capability>);

impl Capabilities {
    /// Builds the set from CAPA lines.
    #[must_use]
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self(lines.into_iter().map(Capability::parse).collect())
    }

    /// Returns true if `capability` was advertised.
    #[must_use]
    pub fn has(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    /// SASL mechanisms, upper-cased.
    #[must_use]
    pub fn sasl_mechanisms(&self) -> &[String] {
        self.0
            .iter()
            .find_map(|c| match c {
                Capability::Sasl(mechanisms) => Some(mechanisms.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Returns true if the SASL mechanism was advertised.
    #[must_use]
    pub fn has_sasl(&self, mechanism: &str) -> bool {
        self.sasl_mechanisms()
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mechanism))
    }

    /// Iterates over the capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
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

    mod capability_parse_tests {
        use super::*;

        #[test]
        fn keywords_are_case_insensitive() {
            assert_eq!(Capability::parse("top"), Capability::Top);
            assert_eq!(Capability::parse("Stls"), Capability::Stls);
        }

        #[test]
        fn parameters() {
            assert_eq!(
                Capability::parse("SASL plain XOAUTH2"),
                Capability::Sasl(vec!["PLAIN".into(), "XOAUTH2".into()])
            );
            assert_eq!(Capability::parse("LOGIN-DELAY 900"), Capability::LoginDelay(Some(900)));
            assert_eq!(Capability::parse("EXPIRE NEVER"), Capability::Expire(Some("NEVER".into())));
            assert_eq!(
                Capability::parse("IMPLEMENTATION Shlemazle Plus v2"),
                Capability::Implementation("Shlemazle Plus v2".into())
            );
        }

        #[test]
        fn unknown_is_preserved() {
            assert_eq!(Capability::parse("X-FOO bar"), Capability::Unknown("X-FOO bar".into()));
        }
    }

    #[test]
    fn sasl_lookup() {
        let caps = Capabilities::from_lines(["USER", "SASL PLAIN LOGIN"]);
        assert!(caps.has(&Capability::User));
        assert!(caps.has_sasl("login"));
        assert!(!caps.has_sasl("XOAUTH2"));
        assert!(Capabilities::default().sasl_mechanisms().is_empty());
    }
}
