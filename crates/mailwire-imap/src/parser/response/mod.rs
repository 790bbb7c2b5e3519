//! Response parser.
//!
//! Turns one framed line (literals already spliced in) into a [`Response`].
//! Unknown untagged keywords are kept as [`UntaggedResponse::Other`] rather
//! than failing the exchange.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::match_same_arms)]

mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyStructure, ESearchResult, Envelope, FetchItem, NamespaceEntry, Namespaces,
    QuotaResource, UntaggedResponse,
};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, Status, Tag};
use crate::Result;

use helpers::{
    nonzero_seq, parse_capability_data, parse_esearch_response, parse_id_response,
    parse_list_response, parse_namespace_response, parse_number_list, parse_quota_response,
    parse_quotaroot_response, parse_response_code, parse_search_response, parse_status_response,
    read_text_until_crlf,
};

pub(crate) use helpers::parse_flag_list;

/// A parsed server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// `+` continuation request.
    Continuation {
        /// Text or base64 challenge after the `+`.
        text: Option<String>,
    },
}

impl Response {
    /// Returns true for an untagged BYE.
    #[must_use]
    pub const fn is_bye(&self) -> bool {
        matches!(self, Self::Untagged(UntaggedResponse::Bye { .. }))
    }
}

/// Stateless response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response line.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(lexer.error(&format!("expected '*', '+' or a tag, got {token:?}"))),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;
        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => Self::parse_keyword_data(lexer, keyword)?,
            Token::Number(n) => {
                let n = u32::try_from(n).map_err(|_| lexer.error("message number exceeds 32 bits"))?;
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(nonzero_seq(lexer, n)?),
                    "FETCH" => {
                        let seq = nonzero_seq(lexer, n)?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        UntaggedResponse::Fetch { seq, items }
                    }
                    _ => UntaggedResponse::Other {
                        keyword: format!("{n} {keyword}"),
                        text: Self::rest(lexer),
                    },
                }
            }
            token => return Err(lexer.error(&format!("unexpected {token:?} after '*'"))),
        };
        Ok(Response::Untagged(untagged))
    }

    fn parse_keyword_data(lexer: &mut Lexer<'_>, keyword: &str) -> Result<UntaggedResponse> {
        let upper = keyword.to_ascii_uppercase();
        let data = match upper.as_str() {
            "OK" | "NO" | "BAD" | "PREAUTH" | "BYE" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                match upper.as_str() {
                    "OK" => UntaggedResponse::Ok { code, text },
                    "NO" => UntaggedResponse::No { code, text },
                    "BAD" => UntaggedResponse::Bad { code, text },
                    "PREAUTH" => UntaggedResponse::PreAuth { code, text },
                    _ => UntaggedResponse::Bye { code, text },
                }
            }
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
            "ENABLED" => UntaggedResponse::Enabled(parse_capability_data(lexer)?),
            "FLAGS" => {
                lexer.expect_space()?;
                UntaggedResponse::Flags(parse_flag_list(lexer)?)
            }
            "LIST" | "LSUB" | "XLIST" => {
                lexer.expect_space()?;
                let entry = parse_list_response(lexer)?;
                match upper.as_str() {
                    "LIST" => UntaggedResponse::List(entry),
                    "LSUB" => UntaggedResponse::Lsub(entry),
                    _ => UntaggedResponse::XList(entry),
                }
            }
            "SEARCH" => {
                let (numbers, mod_seq) = parse_search_response(lexer)?;
                UntaggedResponse::Search { numbers, mod_seq }
            }
            "ESEARCH" => UntaggedResponse::ESearch(parse_esearch_response(lexer)?),
            "SORT" => UntaggedResponse::Sort(parse_number_list(lexer)?),
            "STATUS" => {
                lexer.expect_space()?;
                let (mailbox, status) = parse_status_response(lexer)?;
                UntaggedResponse::Status { mailbox, status }
            }
            "NAMESPACE" => {
                lexer.expect_space()?;
                UntaggedResponse::Namespace(parse_namespace_response(lexer)?)
            }
            "ID" => {
                lexer.expect_space()?;
                UntaggedResponse::Id(parse_id_response(lexer)?)
            }
            "QUOTA" => {
                lexer.expect_space()?;
                let (root, resources) = parse_quota_response(lexer)?;
                UntaggedResponse::Quota { root, resources }
            }
            "QUOTAROOT" => {
                lexer.expect_space()?;
                let (mailbox, roots) = parse_quotaroot_response(lexer)?;
                UntaggedResponse::QuotaRoot { mailbox, roots }
            }
            _ => {
                tracing::debug!(keyword, "unrecognized untagged response");
                UntaggedResponse::Other {
                    keyword: upper,
                    text: Self::rest(lexer),
                }
            }
        };
        Ok(data)
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let text = read_text_until_crlf(lexer);
        Response::Continuation {
            text: (!text.is_empty()).then_some(text),
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(&format!("invalid status {s}"))),
        }
    }

    /// Parses `[SP ["[" code "]" SP] text]`. A missing text is tolerated.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        Ok((code, read_text_until_crlf(lexer)))
    }

    fn rest(lexer: &mut Lexer<'_>) -> String {
        lexer.skip_spaces();
        read_text_until_crlf(lexer)
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
    use crate::types::{Capability, Flag, MailboxAttribute, SeqNum};

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(data) => data,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn greeting_with_capability_code() {
            let UntaggedResponse::Ok { code, text } =
                untagged(b"* OK [CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN] ready\r\n")
            else {
                panic!("expected OK");
            };
            let Some(ResponseCode::Capability(caps)) = code else {
                panic!("expected CAPABILITY code");
            };
            assert!(caps.contains(&Capability::Idle));
            assert!(caps.contains(&Capability::Auth("PLAIN".into())));
            assert_eq!(text, "ready");
        }

        #[test]
        fn tagged_completion() {
            let response = ResponseParser::parse(b"A0001 NO [TRYCREATE] no such mailbox\r\n").unwrap();
            assert_eq!(
                response,
                Response::Tagged {
                    tag: Tag::new("A0001"),
                    status: Status::No,
                    code: Some(ResponseCode::TryCreate),
                    text: "no such mailbox".into(),
                }
            );
        }

        #[test]
        fn tagged_without_text() {
            let response = ResponseParser::parse(b"a1 OK\r\n").unwrap();
            assert!(matches!(response, Response::Tagged { status: Status::Ok, ref text, .. } if text.is_empty()));
        }

        #[test]
        fn bye_is_detected() {
            assert!(ResponseParser::parse(b"* BYE shutting down\r\n").unwrap().is_bye());
        }

        #[test]
        fn unknown_code_does_not_fail() {
            let UntaggedResponse::Ok { code, .. } = untagged(b"* OK [XYZZY 1 2] hi\r\n") else {
                panic!("expected OK");
            };
            assert_eq!(code, Some(ResponseCode::Unknown("XYZZY 1 2".into())));
        }
    }

    mod data_tests {
        use super::*;

        #[test]
        fn message_counts() {
            assert_eq!(untagged(b"* 23 EXISTS\r\n"), UntaggedResponse::Exists(23));
            assert_eq!(untagged(b"* 0 RECENT\r\n"), UntaggedResponse::Recent(0));
            assert_eq!(
                untagged(b"* 7 EXPUNGE\r\n"),
                UntaggedResponse::Expunge(SeqNum::new(7).unwrap())
            );
        }

        #[test]
        fn expunge_zero_is_malformed() {
            assert!(ResponseParser::parse(b"* 0 EXPUNGE\r\n").is_err());
        }

        #[test]
        fn flags_list() {
            let UntaggedResponse::Flags(flags) =
                untagged(b"* FLAGS (\\Answered \\Flagged $Forwarded)\r\n")
            else {
                panic!("expected FLAGS");
            };
            assert!(flags.contains(&Flag::Flagged));
            assert!(flags.contains(&Flag::Keyword("$Forwarded".into())));
        }

        #[test]
        fn list_and_lsub() {
            let UntaggedResponse::List(entry) =
                untagged(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Items\"\r\n")
            else {
                panic!("expected LIST");
            };
            assert_eq!(entry.mailbox.as_str(), "Sent Items");
            assert!(entry.has(&MailboxAttribute::Sent));
            assert!(matches!(
                untagged(b"* LSUB () \".\" INBOX\r\n"),
                UntaggedResponse::Lsub(entry) if entry.mailbox.is_inbox()
            ));
        }

        #[test]
        fn empty_search() {
            assert_eq!(
                untagged(b"* SEARCH\r\n"),
                UntaggedResponse::Search {
                    numbers: vec![],
                    mod_seq: None
                }
            );
        }

        #[test]
        fn sort_numbers() {
            assert_eq!(untagged(b"* SORT 2 84 882\r\n"), UntaggedResponse::Sort(vec![2, 84, 882]));
        }

        #[test]
        fn enabled_capabilities() {
            assert_eq!(
                untagged(b"* ENABLED CONDSTORE\r\n"),
                UntaggedResponse::Enabled(vec![Capability::CondStore])
            );
        }

        #[test]
        fn unknown_keyword_is_kept() {
            assert_eq!(
                untagged(b"* XSTUFF whatever 1 2\r\n"),
                UntaggedResponse::Other {
                    keyword: "XSTUFF".into(),
                    text: "whatever 1 2".into(),
                }
            );
            assert!(matches!(
                untagged(b"* 4 XWEIRD\r\n"),
                UntaggedResponse::Other { keyword, .. } if keyword == "4 XWEIRD"
            ));
        }
    }

    #[test]
    fn continuation_with_and_without_text() {
        assert_eq!(
            ResponseParser::parse(b"+ idling\r\n").unwrap(),
            Response::Continuation {
                text: Some("idling".into())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }
}
