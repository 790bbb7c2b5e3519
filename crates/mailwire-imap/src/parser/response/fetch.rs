//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{parse_internal_date, ModSeq, Uid};
use crate::Result;

use super::helpers::skip_value;
use super::parse_flag_list;
use super::types::{Address, BodyStructure, Envelope, FetchItem};

/// Parses the parenthesized attribute list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            token => return Err(lexer.error(&format!("unexpected {token:?} in FETCH"))),
        };

        match name.as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "UID" => {
                lexer.expect_space()?;
                let uid = Uid::new(lexer.read_number()?).ok_or_else(|| lexer.error("UID 0"))?;
                items.push(FetchItem::Uid(uid));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                let raw = lexer.read_astring()?;
                let date = parse_internal_date(&raw)
                    .ok_or_else(|| lexer.error(&format!("bad INTERNALDATE {raw:?}")))?;
                items.push(FetchItem::InternalDate(date));
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
            }
            "BODYSTRUCTURE" => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            // Non-extensible BODY is a structure; BODY[...] is content.
            "BODY" if lexer.peek() == Some(b' ') => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                let (mut section, origin) = parse_section_and_origin(lexer)?;
                if name != "BODY" {
                    section = name.strip_prefix("RFC822.").map(str::to_string);
                }
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            "MODSEQ" => {
                lexer.expect_space()?;
                lexer.expect(Token::LParen)?;
                let value = lexer.read_number64()?;
                lexer.expect(Token::RParen)?;
                let mod_seq = ModSeq::new(value).ok_or_else(|| lexer.error("MODSEQ out of range"))?;
                items.push(FetchItem::ModSeq(mod_seq));
            }
            _ => {
                tracing::trace!(item = %name, "skipping unrequested FETCH item");
                skip_unknown_item(lexer)?;
            }
        }
    }

    Ok(items)
}

/// Parses `[section]` and `<origin>` after `BODY`.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(Option<String>, Option<u32>)> {
    let mut section = None;
    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let start = lexer.position();
        while !matches!(lexer.peek(), Some(b']') | None) {
            lexer.advance();
        }
        let text = lexer.text_since(start);
        lexer.expect(Token::RBracket)?;
        if !text.is_empty() {
            section = Some(text);
        }
    }

    let mut origin = None;
    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let start = lexer.position();
        while lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
            lexer.advance();
        }
        origin = lexer.text_since(start).parse().ok();
        if lexer.advance() != Some(b'>') {
            return Err(lexer.error("unterminated origin"));
        }
    }

    Ok((section, origin))
}

/// Parses an ENVELOPE structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses NIL or a list of addresses.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        return Ok(addresses);
                    }
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    Some(b' ') => {
                        lexer.advance();
                    }
                    _ => return Err(lexer.error("unterminated address list")),
                }
            }
        }
        token => Err(lexer.error(&format!("expected address list, got {token:?}"))),
    }
}

/// Parses `(name adl mailbox host)`.
pub fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a BODYSTRUCTURE (or non-extensible BODY) tree.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        let mut bodies = Vec::new();
        while lexer.peek() == Some(b'(') {
            bodies.push(parse_body_structure(lexer)?);
            lexer.skip_spaces();
        }
        let subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
        skip_extension_data(lexer)?;
        return Ok(BodyStructure::Multipart { bodies, subtype });
    }

    let media_type = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let media_subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer.read_nstring()?.unwrap_or_default();
    lexer.expect_space()?;
    let size = lexer.read_number()?;

    let structure = match (media_type.as_str(), media_subtype.as_str()) {
        ("MESSAGE", "RFC822" | "GLOBAL") => {
            lexer.expect_space()?;
            let envelope = Box::new(parse_envelope(lexer)?);
            lexer.expect_space()?;
            let body = Box::new(parse_body_structure(lexer)?);
            lexer.expect_space()?;
            let lines = lexer.read_number()?;
            BodyStructure::Message {
                params,
                size,
                envelope,
                body,
                lines,
            }
        }
        ("TEXT", _) => {
            lexer.expect_space()?;
            let lines = lexer.read_number()?;
            BodyStructure::Text {
                subtype: media_subtype,
                params,
                id,
                description,
                encoding,
                size,
                lines,
            }
        }
        _ => BodyStructure::Basic {
            media_type,
            media_subtype,
            params,
            id,
            description,
            encoding,
            size,
        },
    };

    skip_extension_data(lexer)?;
    Ok(structure)
}

fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        return Ok(params);
                    }
                    Some(b' ') => {
                        lexer.advance();
                    }
                    Some(_) => {
                        let key = lexer.read_astring()?;
                        lexer.expect_space()?;
                        let value = lexer.read_nstring()?.unwrap_or_default();
                        params.push((key.to_ascii_uppercase(), value));
                    }
                    None => return Err(lexer.error("unterminated body parameters")),
                }
            }
        }
        token => Err(lexer.error(&format!("expected body parameters, got {token:?}"))),
    }
}

/// Skips MD5, disposition, language and location up to and including `)`.
fn skip_extension_data(lexer: &mut Lexer<'_>) -> Result<()> {
    loop {
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                return Ok(());
            }
            Some(b' ') => {
                lexer.advance();
            }
            Some(_) => skip_value(lexer)?,
            None => return Err(lexer.error("unterminated body structure")),
        }
    }
}

fn skip_unknown_item(lexer: &mut Lexer<'_>) -> Result<()> {
    // Extension items such as X-GM-LABELS carry one value.
    if lexer.peek() == Some(b'[') {
        parse_section_and_origin(lexer)?;
    }
    if lexer.peek() == Some(b' ') {
        lexer.advance();
        skip_value(lexer)?;
    }
    Ok(())
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
    use crate::types::Flag;

    fn fetch(input: &[u8]) -> Vec<FetchItem> {
        parse_fetch_response(&mut Lexer::new(input)).unwrap()
    }

    mod item_tests {
        use super::*;

        #[test]
        fn uid_and_flags() {
            let items = fetch(b"(UID 123 FLAGS (\\Seen))");
            assert_eq!(items[0], FetchItem::Uid(Uid::new(123).unwrap()));
            let FetchItem::Flags(flags) = &items[1] else {
                panic!("expected FLAGS");
            };
            assert!(flags.contains(&Flag::Seen));
        }

        #[test]
        fn uid_zero_rejected() {
            assert!(parse_fetch_response(&mut Lexer::new(b"(UID 0)")).is_err());
        }

        #[test]
        fn internal_date_and_size() {
            let items = fetch(b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" RFC822.SIZE 4286)");
            let FetchItem::InternalDate(date) = &items[0] else {
                panic!("expected INTERNALDATE");
            };
            assert_eq!(date.offset().local_minus_utc(), -7 * 3600);
            assert_eq!(items[1], FetchItem::Rfc822Size(4286));
        }

        #[test]
        fn modseq() {
            assert_eq!(
                fetch(b"(MODSEQ (624140003))"),
                vec![FetchItem::ModSeq(ModSeq(624_140_003))]
            );
        }

        #[test]
        fn literal_body_with_embedded_crlf() {
            let items = fetch(b"(BODY[] {12}\r\nhello\r\nworld UID 9)");
            assert_eq!(
                items[0],
                FetchItem::Body {
                    section: None,
                    origin: None,
                    data: Some(b"hello\r\nworld".to_vec()),
                }
            );
            assert_eq!(items[1], FetchItem::Uid(Uid::new(9).unwrap()));
        }

        #[test]
        fn partial_section_with_origin() {
            let items = fetch(b"(BODY[HEADER.FIELDS (SUBJECT)]<0> \"Subject: hi\")");
            assert_eq!(
                items[0],
                FetchItem::Body {
                    section: Some("HEADER.FIELDS (SUBJECT)".into()),
                    origin: Some(0),
                    data: Some(b"Subject: hi".to_vec()),
                }
            );
        }

        #[test]
        fn rfc822_header_section() {
            let items = fetch(b"(RFC822.HEADER NIL)");
            assert_eq!(
                items[0],
                FetchItem::Body {
                    section: Some("HEADER".into()),
                    origin: None,
                    data: None,
                }
            );
        }

        #[test]
        fn unknown_items_are_skipped() {
            let items = fetch(b"(X-GM-LABELS (\\Inbox \"a b\") UID 4 X-GM-MSGID 1278455344230334865)");
            assert_eq!(items, vec![FetchItem::Uid(Uid::new(4).unwrap())]);
        }
    }

    mod structure_tests {
        use super::*;

        #[test]
        fn envelope_addresses() {
            let envelope = parse_envelope(&mut Lexer::new(
                b"(\"Wed, 17 Jul 1996\" \"Hi\" ((\"Terry\" NIL \"gray\" \"example.com\")) NIL NIL NIL NIL NIL NIL \"<id@x>\")",
            ))
            .unwrap();
            assert_eq!(envelope.subject.as_deref(), Some("Hi"));
            assert_eq!(envelope.from[0].email().unwrap(), "gray@example.com");
            assert_eq!(envelope.message_id.as_deref(), Some("<id@x>"));
        }

        #[test]
        fn multipart_with_extension_data() {
            let structure = parse_body_structure(&mut Lexer::new(
                b"((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 1152 23 NIL NIL NIL)\
                  (\"IMAGE\" \"PNG\" (\"NAME\" \"a.png\") \"<1>\" NIL \"BASE64\" 4554) \
                  \"MIXED\" (\"BOUNDARY\" \"x\") NIL NIL)",
            ))
            .unwrap();
            let BodyStructure::Multipart { bodies, subtype } = &structure else {
                panic!("expected multipart");
            };
            assert_eq!(subtype, "MIXED");
            assert_eq!(bodies.len(), 2);
            assert!(matches!(
                &bodies[0],
                BodyStructure::Text { lines: 23, params, .. } if params[0] == ("CHARSET".into(), "US-ASCII".into())
            ));
            assert!(matches!(
                structure.part("2"),
                Some(BodyStructure::Basic { media_type, size: 4554, .. }) if media_type == "IMAGE"
            ));
        }

        #[test]
        fn embedded_message() {
            let structure = parse_body_structure(&mut Lexer::new(
                b"(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 342 \
                  (NIL \"inner\" NIL NIL NIL NIL NIL NIL NIL NIL) \
                  (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 20 2) 12)",
            ))
            .unwrap();
            let BodyStructure::Message {
                envelope, lines, ..
            } = &structure
            else {
                panic!("expected message part");
            };
            assert_eq!(envelope.subject.as_deref(), Some("inner"));
            assert_eq!(*lines, 12);
        }

        #[test]
        fn non_extensible_body() {
            let items = fetch(b"(BODY (\"TEXT\" \"PLAIN\" NIL NIL NIL \"8BIT\" 5 1))");
            assert!(matches!(items[0], FetchItem::BodyStructure(BodyStructure::Text { .. })));
        }
    }
}
