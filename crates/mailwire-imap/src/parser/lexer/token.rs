//! Lexical tokens of the response grammar.

/// One token of a response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, borrowed from the line buffer.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    QuotedString(String),
    /// Literal payload (`{n}` marker plus `n` bytes).
    Literal(Vec<u8>),
    /// Unsigned decimal number. Range checks happen at the use site.
    Number(u64),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`, case-insensitive.
    Nil,
    /// Line terminator.
    Crlf,
    /// End of input.
    Eof,
}
