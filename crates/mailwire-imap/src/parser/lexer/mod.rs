//! Tokenizer for server response lines.
//!
//! Works on one framed line at a time; literal payloads have already been
//! spliced into the buffer by the framer, so `{n}` markers are resolved here
//! by slicing.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over one response line.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Returns true once all input is consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Byte at `offset` past the cursor.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes up to `n` bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Moves the cursor back to an earlier [`position`](Self::position).
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Input between `start` and the cursor, as lossy text.
    #[must_use]
    pub fn text_since(&self, start: usize) -> String {
        String::from_utf8_lossy(self.input.get(start..self.pos).unwrap_or_default()).into_owned()
    }

    /// Returns true if the next bytes equal `prefix`, ignoring ASCII case.
    #[must_use]
    pub fn peek_keyword(&self, prefix: &str) -> bool {
        self.remaining()
            .get(..prefix.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(prefix.as_bytes()))
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.skip(2);
                Ok(Token::Crlf)
            }
            b'\r' => Err(self.error("bare CR")),
            // Some servers terminate with LF only.
            b'\n' => {
                self.advance();
                Ok(Token::Crlf)
            }
            b' ' => self.single(Token::Space),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b'*' => self.single(Token::Asterisk),
            b'+' => self.single(Token::Plus),
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn single(&mut self, token: Token<'a>) -> Result<Token<'a>> {
        self.advance();
        Ok(token)
    }

    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(&format!("invalid escape \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(c) => out.push(c),
            }
        }
        Ok(Token::QuotedString(
            String::from_utf8_lossy(&out).into_owned(),
        ))
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];
        let size = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| self.error("invalid literal length"))?;

        if self.peek() == Some(b'+') {
            self.advance();
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("expected '}' after literal length"));
        }
        match (self.advance(), self.peek()) {
            (Some(b'\r'), Some(b'\n')) => self.skip(1),
            (Some(b'\n'), _) => {}
            _ => return Err(self.error("expected CRLF after literal marker")),
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("truncated literal"))?;
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let mut all_digits = true;
        while let Some(b) = self.peek().filter(|&b| is_atom_char(b)) {
            all_digits &= b.is_ascii_digit();
            self.advance();
        }
        let s = self.slice_str(start)?;
        if !all_digits {
            return Ok(Token::Atom(s));
        }
        s.parse::<u64>()
            .map(Token::Number)
            .map_err(|_| self.error("number overflow"))
    }

    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        let s = self.slice_str(start)?;
        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn slice_str(&self, start: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..self.pos]).map_err(|_| self.error("atom is not UTF-8"))
    }

    /// Builds a malformed-response error at the cursor.
    pub fn error(&self, message: &str) -> Error {
        Error::malformed(self.pos, message)
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes one space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Consumes the line terminator.
    pub fn expect_crlf(&mut self) -> Result<()> {
        self.expect(Token::Crlf)
    }

    /// Reads an atom, quoted string or literal as text.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            token => Err(self.error(&format!("expected astring, got {token:?}"))),
        }
    }

    /// Reads NIL or a string as text.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        Ok(self
            .read_nstring_bytes()?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    /// Reads NIL or a string as raw bytes.
    pub fn read_nstring_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data)),
            token => Err(self.error(&format!("expected nstring, got {token:?}"))),
        }
    }

    /// Reads a number that must fit in 32 bits.
    pub fn read_number(&mut self) -> Result<u32> {
        let n = self.read_number64()?;
        u32::try_from(n).map_err(|_| self.error("number exceeds 32 bits"))
    }

    /// Reads a number of up to 63 bits (mod-sequences).
    pub fn read_number64(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Number(n) if n <= i64::MAX as u64 => Ok(n),
            Token::Number(_) => Err(self.error("number exceeds 63 bits")),
            token => Err(self.error(&format!("expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("expected atom, got {token:?}"))),
        }
    }

    /// Reads bytes up to (not including) the next space, `)` or line end.
    ///
    /// Used for sequence sets, which may contain `*` and `:`.
    pub fn read_until_delimiter(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !matches!(b, b' ' | b')' | b']' | b'\r' | b'\n'))
        {
            self.advance();
        }
        if start == self.pos {
            return Err(self.error("expected a value"));
        }
        self.slice_str(start)
    }

    /// Skips any run of spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }
}

/// Returns true for bytes allowed inside an atom.
///
/// Includes `\` so flags like `\Seen` lex as one token. Excludes `[` so
/// `BODY[` splits into an atom and a bracket.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b,
        0x21 | 0x23..=0x24 | 0x26..=0x27 |
        0x2B..=0x5A |
        0x5C |
        0x5E..=0x7A |
        0x7C | 0x7E
    )
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

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token().unwrap();
            if t == Token::Eof {
                return out;
            }
            out.push(t);
        }
    }

    #[test]
    fn tagged_status_line() {
        assert_eq!(
            tokens(b"A0001 OK done\r\n"),
            vec![
                Token::Atom("A0001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn flags_and_brackets() {
        assert_eq!(
            tokens(b"[PERMANENTFLAGS (\\Seen \\*)]"),
            vec![
                Token::LBracket,
                Token::Atom("PERMANENTFLAGS"),
                Token::Space,
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("\\"),
                Token::Asterisk,
                Token::RParen,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn quoted_string_escapes() {
        assert_eq!(
            tokens(br#""a \"b\" \\c""#),
            vec![Token::QuotedString(r#"a "b" \c"#.to_string())]
        );
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = Lexer::new(b"\"abc\r\n").next_token().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn literal_keeps_embedded_crlf() {
        let mut lexer = Lexer::new(b"{12}\r\nhello\r\nworld )");
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Literal(b"hello\r\nworld".to_vec())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
    }

    #[test]
    fn truncated_literal_is_malformed() {
        let err = Lexer::new(b"{10}\r\nshort").next_token().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn number_ranges() {
        assert_eq!(Lexer::new(b"4294967295").read_number().unwrap(), u32::MAX);
        assert!(Lexer::new(b"4294967296").read_number().is_err());
        assert_eq!(
            Lexer::new(b"9223372036854775807").read_number64().unwrap(),
            i64::MAX as u64
        );
        assert!(Lexer::new(b"99999999999999999999999").next_token().is_err());
    }

    #[test]
    fn nil_is_case_insensitive() {
        assert_eq!(tokens(b"nil"), vec![Token::Nil]);
        assert_eq!(Lexer::new(b"NIL").read_nstring().unwrap(), None);
    }

    #[test]
    fn sequence_set_until_delimiter() {
        let mut lexer = Lexer::new(b"1:3,5:* rest");
        assert_eq!(lexer.read_until_delimiter().unwrap(), "1:3,5:*");
    }

    #[test]
    fn atom_char_table() {
        for b in [b'A', b'z', b'0', b':', b'\\', b'$', b'.', b'-'] {
            assert!(is_atom_char(b), "{}", b as char);
        }
        for b in [b' ', b'(', b')', b'{', b'"', b'%', b'*', b'[', b']', 0x7F] {
            assert!(!is_atom_char(b), "{}", b as char);
        }
    }
}
