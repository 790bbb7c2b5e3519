//! POP3 command builder.

use std::fmt;

/// POP3 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPA - List capabilities
    Capa,
    /// STLS - Upgrade to TLS
    Stls,
    /// USER - Name the mailbox
    User(String),
    /// PASS - Password for the named mailbox
    Pass(String),
    /// AUTH - Begin SASL authentication
    Auth {
        /// Mechanism name
        mechanism: String,
        /// Base64 initial response, `=` for an empty one
        initial_response: Option<String>,
    },
    /// STAT - Maildrop size
    Stat,
    /// LIST - Scan listings, all or one
    List(Option<u32>),
    /// UIDL - Unique-id listings, all or one
    Uidl(Option<u32>),
    /// RETR - Retrieve a message
    Retr(u32),
    /// TOP - Headers plus the first lines of the body
    Top {
        /// Message number
        message: u32,
        /// Body lines to include
        lines: u32,
    },
    /// DELE - Mark a message deleted
    Dele(u32),
    /// NOOP - No operation
    Noop,
    /// RSET - Unmark deleted messages
    Rset,
    /// QUIT - Enter UPDATE and close
    Quit,
}

impl Command {
    /// Serializes the command, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{}\r\n", Wire(self)).into_bytes()
    }

    /// Form used in logs, with secrets masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ****".to_string(),
            Self::Auth {
                mechanism,
                initial_response: Some(_),
            } => format!("AUTH {mechanism} ****"),
            other => Wire(other).to_string(),
        }
    }
}

struct Wire<'a>(&'a Command);

impl fmt::Display for Wire<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Command::Capa => f.write_str("CAPA"),
            Command::Stls => f.write_str("STLS"),
            Command::User(name) => write!(f, "USER {name}"),
            Command::Pass(password) => write!(f, "PASS {password}"),
            Command::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {mechanism}")?;
                if let Some(ir) = initial_response {
                    write!(f, " {ir}")?;
                }
                Ok(())
            }
            Command::Stat => f.write_str("STAT"),
            Command::List(None) => f.write_str("LIST"),
            Command::List(Some(n)) => write!(f, "LIST {n}"),
            Command::Uidl(None) => f.write_str("UIDL"),
            Command::Uidl(Some(n)) => write!(f, "UIDL {n}"),
            Command::Retr(n) => write!(f, "RETR {n}"),
            Command::Top { message, lines } => write!(f, "TOP {message} {lines}"),
            Command::Dele(n) => write!(f, "DELE {n}"),
            Command::Noop => f.write_str("NOOP"),
            Command::Rset => f.write_str("RSET"),
            Command::Quit => f.write_str("QUIT"),
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
    fn test_serialize() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::List(Some(3)).serialize(), b"LIST 3\r\n");
        assert_eq!(Command::Uidl(None).serialize(), b"UIDL\r\n");
        assert_eq!(
            Command::Top { message: 1, lines: 10 }.serialize(),
            b"TOP 1 10\r\n"
        );
        assert_eq!(
            Command::Auth {
                mechanism: "PLAIN".into(),
                initial_response: Some("=".into()),
            }
            .serialize(),
            b"AUTH PLAIN =\r\n"
        );
    }

    #[test]
    fn test_redacted_hides_secrets() {
        assert_eq!(Command::Pass("hunter2".into()).redacted(), "PASS ****");
        let auth = Command::Auth {
            mechanism: "PLAIN".into(),
            initial_response: Some("AGEAYg==".into()),
        };
        assert_eq!(auth.redacted(), "AUTH PLAIN ****");
        assert_eq!(Command::User("alice".into()).redacted(), "USER alice");
    }
}
