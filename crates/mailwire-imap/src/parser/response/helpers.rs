//! Decoders shared by the untagged and status response parsers.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ModSeq,
    ResponseCode, SeqNum, SequenceSet, Uid, UidSet, UidValidity,
};
use crate::{Error, Result};

use super::types::{ESearchResult, NamespaceEntry, Namespaces, QuotaResource};

/// Parses `[CODE args]`.
///
/// Unknown codes, and known codes whose arguments do not decode, become
/// [`ResponseCode::Unknown`] with the raw text between the brackets.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let start = lexer.position();

    let code = match parse_known_code(lexer) {
        Ok(Some(code)) if lexer.peek() == Some(b']') => code,
        _ => {
            lexer.rewind(start);
            skip_to_close_bracket(lexer);
            ResponseCode::Unknown(lexer.text_since(start))
        }
    };

    lexer.expect(Token::RBracket)?;
    Ok(code)
}

fn parse_known_code(lexer: &mut Lexer<'_>) -> Result<Option<ResponseCode>> {
    let atom = lexer.read_atom_string()?;
    if let Some(code) = ResponseCode::from_atom(atom) {
        return Ok(Some(code));
    }

    let code = match atom.to_ascii_uppercase().as_str() {
        "UIDNEXT" => {
            lexer.expect_space()?;
            Uid::new(lexer.read_number()?).map(ResponseCode::UidNext)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            UidValidity::new(lexer.read_number()?).map(ResponseCode::UidValidity)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            SeqNum::new(lexer.read_number()?).map(ResponseCode::Unseen)
        }
        "HIGHESTMODSEQ" => {
            lexer.expect_space()?;
            ModSeq::new(lexer.read_number64()?).map(ResponseCode::HighestModSeq)
        }
        "CAPABILITY" => Some(ResponseCode::Capability(parse_capability_data(lexer)?)),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            Some(ResponseCode::PermanentFlags(parse_flag_list(lexer)?))
        }
        "BADCHARSET" => {
            let mut charsets = Vec::new();
            if lexer.peek() == Some(b' ') {
                lexer.advance();
                lexer.expect(Token::LParen)?;
                charsets = parse_astring_list_body(lexer)?;
            }
            Some(ResponseCode::BadCharset(charsets))
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uid_validity = UidValidity::new(lexer.read_number()?);
            lexer.expect_space()?;
            let uids = SequenceSet::parse(lexer.read_until_delimiter()?).map(UidSet);
            uid_validity
                .zip(uids)
                .map(|(uid_validity, uids)| ResponseCode::AppendUid { uid_validity, uids })
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let uid_validity = UidValidity::new(lexer.read_number()?);
            lexer.expect_space()?;
            let source = SequenceSet::parse(lexer.read_until_delimiter()?).map(UidSet);
            lexer.expect_space()?;
            let destination = SequenceSet::parse(lexer.read_until_delimiter()?).map(UidSet);
            match (uid_validity, source, destination) {
                (Some(uid_validity), Some(source), Some(destination)) => {
                    Some(ResponseCode::CopyUid {
                        uid_validity,
                        source,
                        destination,
                    })
                }
                _ => None,
            }
        }
        "MODIFIED" => {
            lexer.expect_space()?;
            Some(ResponseCode::Modified(lexer.read_until_delimiter()?.to_string()))
        }
        _ => None,
    };
    Ok(code)
}

fn skip_to_close_bracket(lexer: &mut Lexer<'_>) {
    while !matches!(lexer.peek(), Some(b']' | b'\r' | b'\n') | None) {
        lexer.advance();
    }
}

/// Parses the space-separated capability atoms that follow `CAPABILITY`.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::Unknown(n.to_string())),
            _ => {}
        }
    }
    Ok(caps)
}

/// Parses `(flag flag ...)`, including the `\*` wildcard.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;
    let mut flags = Flags::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom("\\") if lexer.peek() == Some(b'*') => {
                lexer.advance();
                flags.insert(Flag::Wildcard);
            }
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => {
                return Err(lexer.error(&format!("unexpected {token:?} in flag list")));
            }
        }
    }
    Ok(flags)
}

/// Parses LIST, LSUB and XLIST data, including LIST-EXTENDED items.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            token => {
                return Err(lexer.error(&format!("unexpected {token:?} in LIST attributes")));
            }
        }
    }
    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("expected delimiter, got {token:?}"))),
    };
    lexer.expect_space()?;

    let mut entry = ListResponse::new(Mailbox::new(lexer.read_astring()?), delimiter, attributes);

    if lexer.peek() == Some(b' ') && lexer.peek_at(1) == Some(b'(') {
        lexer.advance();
        parse_list_extended_items(lexer, &mut entry)?;
    }
    Ok(entry)
}

fn parse_list_extended_items(lexer: &mut Lexer<'_>, entry: &mut ListResponse) -> Result<()> {
    lexer.expect(Token::LParen)?;
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(()),
            Token::Space => {}
            Token::QuotedString(tag) if tag.eq_ignore_ascii_case("CHILDINFO") => {
                lexer.expect_space()?;
                lexer.expect(Token::LParen)?;
                entry.child_info = parse_astring_list_body(lexer)?;
            }
            Token::QuotedString(_) | Token::Atom(_) => {
                lexer.expect_space()?;
                skip_value(lexer)?;
            }
            token => {
                return Err(lexer.error(&format!("unexpected {token:?} in LIST extended data")));
            }
        }
    }
}

/// Reads astrings up to and including the closing `)` of an open list.
fn parse_astring_list_body(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    loop {
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                return Ok(out);
            }
            Some(b' ') => {
                lexer.advance();
            }
            Some(_) => out.push(lexer.read_astring()?),
            None => return Err(lexer.error("unterminated list")),
        }
    }
}

/// Skips one value: an atom, number, string, literal, NIL or nested list.
pub fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth == 0 => return Err(lexer.error("unbalanced ')'")),
            Token::RParen => depth -= 1,
            Token::Crlf | Token::Eof => return Err(lexer.error("unterminated value")),
            _ => {}
        }
        if depth == 0 {
            return Ok(());
        }
    }
}

/// Parses SEARCH data: numbers, then an optional `(MODSEQ n)`.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<(Vec<u32>, Option<ModSeq>)> {
    let mut numbers = Vec::new();
    let mut mod_seq = None;
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.peek() {
            Some(b'(') => {
                lexer.advance();
                let keyword = lexer.read_atom_string()?;
                if !keyword.eq_ignore_ascii_case("MODSEQ") {
                    return Err(lexer.error("expected MODSEQ"));
                }
                lexer.expect_space()?;
                mod_seq = ModSeq::new(lexer.read_number64()?);
                lexer.expect(Token::RParen)?;
            }
            Some(b'\r' | b'\n') | None => break,
            Some(_) => numbers.push(lexer.read_number()?),
        }
    }
    Ok((numbers, mod_seq))
}

/// Parses SORT data.
pub fn parse_number_list(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut numbers = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if matches!(lexer.peek(), Some(b'\r' | b'\n') | None) {
            break;
        }
        numbers.push(lexer.read_number()?);
    }
    Ok(numbers)
}

/// Parses ESEARCH data.
pub fn parse_esearch_response(lexer: &mut Lexer<'_>) -> Result<ESearchResult> {
    let mut result = ESearchResult::default();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if lexer.peek() == Some(b'(') {
            lexer.advance();
            let keyword = lexer.read_atom_string()?;
            if !keyword.eq_ignore_ascii_case("TAG") {
                return Err(lexer.error("expected TAG in search correlator"));
            }
            lexer.expect_space()?;
            result.tag = Some(lexer.read_astring()?);
            lexer.expect(Token::RParen)?;
            continue;
        }
        let keyword = lexer.read_atom_string()?.to_ascii_uppercase();
        if keyword == "UID" {
            result.uid = true;
            continue;
        }
        lexer.expect_space()?;
        match keyword.as_str() {
            "MIN" => result.min = Some(lexer.read_number()?),
            "MAX" => result.max = Some(lexer.read_number()?),
            "COUNT" => result.count = Some(lexer.read_number()?),
            "ALL" => result.all = SequenceSet::parse(lexer.read_until_delimiter()?),
            "MODSEQ" => result.mod_seq = ModSeq::new(lexer.read_number64()?),
            _ => skip_value(lexer)?,
        }
    }
    Ok(result)
}

/// Parses STATUS data.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, MailboxStatus)> {
    let mailbox = Mailbox::new(lexer.read_astring()?);
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut status = MailboxStatus::default();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => {
                lexer.expect_space()?;
                let value = lexer.read_number64()?;
                let small = u32::try_from(value).ok();
                match name.to_ascii_uppercase().as_str() {
                    "MESSAGES" => status.messages = small,
                    "RECENT" => status.recent = small,
                    "UNSEEN" => status.unseen = small,
                    "UIDNEXT" => status.uid_next = small.and_then(Uid::new),
                    "UIDVALIDITY" => status.uid_validity = small.and_then(UidValidity::new),
                    "HIGHESTMODSEQ" => status.highest_mod_seq = ModSeq::new(value),
                    _ => {}
                }
            }
            token => return Err(lexer.error(&format!("unexpected {token:?} in STATUS"))),
        }
    }
    Ok((mailbox, status))
}

/// Parses NAMESPACE data: three NIL-or-list groups.
pub fn parse_namespace_response(lexer: &mut Lexer<'_>) -> Result<Namespaces> {
    let personal = parse_namespace_group(lexer)?;
    lexer.expect_space()?;
    let other_users = parse_namespace_group(lexer)?;
    lexer.expect_space()?;
    let shared = parse_namespace_group(lexer)?;
    Ok(Namespaces {
        personal,
        other_users,
        shared,
    })
}

fn parse_namespace_group(lexer: &mut Lexer<'_>) -> Result<Vec<NamespaceEntry>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut entries = Vec::new();
            while lexer.peek() == Some(b'(') {
                lexer.advance();
                let prefix = lexer.read_astring()?;
                lexer.expect_space()?;
                let delimiter = lexer.read_nstring()?.and_then(|d| d.chars().next());
                // Namespace response extensions.
                while lexer.peek() == Some(b' ') {
                    lexer.advance();
                    skip_value(lexer)?;
                    lexer.expect_space()?;
                    skip_value(lexer)?;
                }
                lexer.expect(Token::RParen)?;
                entries.push(NamespaceEntry { prefix, delimiter });
            }
            lexer.expect(Token::RParen)?;
            Ok(entries)
        }
        token => Err(lexer.error(&format!("expected namespace list, got {token:?}"))),
    }
}

/// Parses ID data: NIL or a list of field/value pairs.
pub fn parse_id_response(lexer: &mut Lexer<'_>) -> Result<Vec<(String, Option<String>)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut fields = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        return Ok(fields);
                    }
                    Some(b' ') => {
                        lexer.advance();
                    }
                    Some(_) => {
                        let key = lexer.read_astring()?;
                        lexer.expect_space()?;
                        fields.push((key, lexer.read_nstring()?));
                    }
                    None => return Err(lexer.error("unterminated ID list")),
                }
            }
        }
        token => Err(lexer.error(&format!("expected ID list, got {token:?}"))),
    }
}

/// Parses QUOTA data.
pub fn parse_quota_response(lexer: &mut Lexer<'_>) -> Result<(String, Vec<QuotaResource>)> {
    let root = lexer.read_astring()?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;
    let mut resources = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => {
                lexer.expect_space()?;
                let usage = lexer.read_number64()?;
                lexer.expect_space()?;
                let limit = lexer.read_number64()?;
                resources.push(QuotaResource {
                    name: name.to_ascii_uppercase(),
                    usage,
                    limit,
                });
            }
            token => return Err(lexer.error(&format!("unexpected {token:?} in QUOTA"))),
        }
    }
    Ok((root, resources))
}

/// Parses QUOTAROOT data.
pub fn parse_quotaroot_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<String>)> {
    let mailbox = Mailbox::new(lexer.read_astring()?);
    let mut roots = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if matches!(lexer.peek(), Some(b'\r' | b'\n') | None) {
            break;
        }
        roots.push(lexer.read_astring()?);
    }
    Ok((mailbox, roots))
}

/// Reads the rest of the line as text and consumes the terminator.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();
    let end = remaining
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(remaining.len());
    lexer.skip(end);
    if lexer.peek() == Some(b'\r') {
        lexer.advance();
    }
    if lexer.peek() == Some(b'\n') {
        lexer.advance();
    }
    String::from_utf8_lossy(&remaining[..end]).into_owned()
}

/// Maps a zero sequence number to a malformed-response error.
pub fn nonzero_seq(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
    SeqNum::new(n).ok_or_else(|| Error::malformed(lexer.position(), "sequence number 0"))
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

    fn code(input: &str) -> ResponseCode {
        parse_response_code(&mut Lexer::new(input.as_bytes())).unwrap()
    }

    mod response_code_tests {
        use super::*;

        #[test]
        fn numeric_codes() {
            assert_eq!(code("[UIDNEXT 4392]"), ResponseCode::UidNext(Uid::new(4392).unwrap()));
            assert_eq!(
                code("[HIGHESTMODSEQ 90060115205545359]"),
                ResponseCode::HighestModSeq(ModSeq(90_060_115_205_545_359))
            );
        }

        #[test]
        fn permanent_flags_with_wildcard() {
            let ResponseCode::PermanentFlags(flags) = code("[PERMANENTFLAGS (\\Deleted \\Seen \\*)]")
            else {
                panic!("expected PERMANENTFLAGS");
            };
            assert!(flags.contains(&Flag::Wildcard));
            assert_eq!(flags.len(), 3);
        }

        #[test]
        fn copyuid_sets() {
            let ResponseCode::CopyUid {
                uid_validity,
                source,
                destination,
            } = code("[COPYUID 38505 304,319:320 3956:3958]")
            else {
                panic!("expected COPYUID");
            };
            assert_eq!(uid_validity.get(), 38505);
            assert_eq!(source.to_string(), "304,319:320");
            assert_eq!(destination.uids().len(), 3);
        }

        #[test]
        fn appenduid() {
            assert!(matches!(
                code("[APPENDUID 38505 3955]"),
                ResponseCode::AppendUid { uids, .. } if uids.to_string() == "3955"
            ));
        }

        #[test]
        fn unknown_code_preserves_raw_text() {
            assert_eq!(
                code("[X-GM-THING 1 (a b)]"),
                ResponseCode::Unknown("X-GM-THING 1 (a b)".into())
            );
        }

        #[test]
        fn bad_arguments_fall_back_to_unknown() {
            assert_eq!(code("[UIDNEXT 0]"), ResponseCode::Unknown("UIDNEXT 0".into()));
            assert_eq!(code("[UIDNEXT abc]"), ResponseCode::Unknown("UIDNEXT abc".into()));
        }

        #[test]
        fn badcharset_list() {
            assert_eq!(
                code("[BADCHARSET (UTF-8 US-ASCII)]"),
                ResponseCode::BadCharset(vec!["UTF-8".into(), "US-ASCII".into()])
            );
            assert_eq!(code("[BADCHARSET]"), ResponseCode::BadCharset(vec![]));
        }
    }

    mod list_tests {
        use super::*;

        #[test]
        fn extended_childinfo() {
            let mut lexer = Lexer::new(
                br#"(\HasChildren) "/" "Foo" ("CHILDINFO" ("SUBSCRIBED"))"#,
            );
            let entry = parse_list_response(&mut lexer).unwrap();
            assert_eq!(entry.child_info, vec!["SUBSCRIBED".to_string()]);
            assert!(lexer.is_eof());
        }

        #[test]
        fn oldname_is_skipped() {
            let mut lexer = Lexer::new(br#"() "." "New" ("OLDNAME" ("Old"))"#);
            let entry = parse_list_response(&mut lexer).unwrap();
            assert_eq!(entry.mailbox.as_str(), "New");
            assert!(entry.child_info.is_empty());
        }

        #[test]
        fn nil_delimiter_and_literal_name() {
            let mut lexer = Lexer::new(b"(\\Noselect) NIL {5}\r\nA B C");
            let entry = parse_list_response(&mut lexer).unwrap();
            assert_eq!(entry.delimiter, None);
            assert_eq!(entry.mailbox.as_str(), "A B C");
        }
    }

    #[test]
    fn search_with_modseq() {
        let (numbers, mod_seq) =
            parse_search_response(&mut Lexer::new(b" 2 5 6 (MODSEQ 917162500)\r\n")).unwrap();
        assert_eq!(numbers, vec![2, 5, 6]);
        assert_eq!(mod_seq, Some(ModSeq(917_162_500)));
    }

    #[test]
    fn esearch_fields() {
        let result = parse_esearch_response(&mut Lexer::new(
            br#" (TAG "A282") UID MIN 2 COUNT 3 ALL 2,10:11"#,
        ))
        .unwrap();
        assert_eq!(result.tag.as_deref(), Some("A282"));
        assert!(result.uid);
        assert_eq!(result.min, Some(2));
        assert_eq!(result.count, Some(3));
        assert_eq!(result.all.unwrap().to_string(), "2,10:11");
    }

    #[test]
    fn status_counters() {
        let (mailbox, status) = parse_status_response(&mut Lexer::new(
            b"blurdybloop (MESSAGES 231 UIDNEXT 44292 HIGHESTMODSEQ 7011231777)",
        ))
        .unwrap();
        assert_eq!(mailbox.as_str(), "blurdybloop");
        assert_eq!(status.messages, Some(231));
        assert_eq!(status.uid_next.unwrap().get(), 44292);
        assert_eq!(status.highest_mod_seq, Some(ModSeq(7_011_231_777)));
    }

    #[test]
    fn namespace_groups() {
        let ns = parse_namespace_response(&mut Lexer::new(
            br#"(("" "/")) NIL (("Public Folders/" "/" "X-PARAM" ("FLAG1")))"#,
        ))
        .unwrap();
        assert_eq!(ns.personal[0].prefix, "");
        assert_eq!(ns.personal[0].delimiter, Some('/'));
        assert!(ns.other_users.is_empty());
        assert_eq!(ns.shared[0].prefix, "Public Folders/");
    }

    #[test]
    fn id_pairs_and_nil() {
        let fields =
            parse_id_response(&mut Lexer::new(br#"("name" "Cyrus" "support-url" NIL)"#)).unwrap();
        assert_eq!(fields[0], ("name".into(), Some("Cyrus".into())));
        assert_eq!(fields[1].1, None);
        assert!(parse_id_response(&mut Lexer::new(b"NIL")).unwrap().is_empty());
    }

    #[test]
    fn quota_and_quotaroot() {
        let (root, resources) =
            parse_quota_response(&mut Lexer::new(br#""" (STORAGE 10 512)"#)).unwrap();
        assert_eq!(root, "");
        assert_eq!(resources[0].limit, 512);

        let (mailbox, roots) =
            parse_quotaroot_response(&mut Lexer::new(br#"INBOX "" "user""#)).unwrap();
        assert!(mailbox.is_inbox());
        assert_eq!(roots, vec![String::new(), "user".to_string()]);
    }

    #[test]
    fn text_until_line_end() {
        let mut lexer = Lexer::new(b"hello world\r\nnext");
        assert_eq!(read_text_until_crlf(&mut lexer), "hello world");
        assert_eq!(lexer.remaining(), b"next");
    }
}
