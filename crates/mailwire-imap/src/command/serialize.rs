//! Wire encoding of command arguments.
//!
//! A command is encoded into one or more fragments. Every fragment but the
//! last ends with a synchronizing literal marker `{n}\r\n`; the sender must
//! wait for a `+` continuation before writing the next fragment. With
//! LITERAL+ the `{n+}` form is used and the command is a single fragment.

use chrono::NaiveDate;

use crate::types::{Flags, Mailbox, Tag};

use super::types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

/// Accumulates one command's bytes, splitting at synchronizing literals.
pub struct CommandBuf {
    literal_plus: bool,
    fragments: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl CommandBuf {
    /// Starts a tagged command line.
    pub fn new(tag: &Tag, literal_plus: bool) -> Self {
        let mut current = Vec::with_capacity(64);
        current.extend_from_slice(tag.as_str().as_bytes());
        current.push(b' ');
        Self {
            literal_plus,
            fragments: Vec::new(),
            current,
        }
    }

    /// Appends protocol text verbatim.
    pub fn raw(&mut self, s: &str) -> &mut Self {
        self.current.extend_from_slice(s.as_bytes());
        self
    }

    /// Appends a single space.
    pub fn sp(&mut self) -> &mut Self {
        self.current.push(b' ');
        self
    }

    /// Appends an astring: atom when possible, else quoted, else literal.
    pub fn astring(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() && s.bytes().all(is_astring_char) {
            self.raw(s)
        } else {
            self.string(s)
        }
    }

    /// Appends a string that must not be an atom: quoted, or a literal when
    /// it holds CR, LF, NUL or 8-bit bytes.
    pub fn string(&mut self, s: &str) -> &mut Self {
        if s.bytes().all(is_quotable) {
            self.current.push(b'"');
            for b in s.bytes() {
                if b == b'"' || b == b'\\' {
                    self.current.push(b'\\');
                }
                self.current.push(b);
            }
            self.current.push(b'"');
            self
        } else {
            self.literal(s.as_bytes())
        }
    }

    /// Appends a LIST pattern; `*` and `%` stay unquoted wildcards.
    pub fn list_mailbox(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() && s.bytes().all(|b| is_astring_char(b) || b == b'*' || b == b'%') {
            self.raw(s)
        } else {
            self.string(s)
        }
    }

    /// Appends a mailbox name.
    pub fn mailbox(&mut self, mailbox: &Mailbox) -> &mut Self {
        self.astring(mailbox.as_str())
    }

    /// Appends a literal.
    pub fn literal(&mut self, data: &[u8]) -> &mut Self {
        if self.literal_plus {
            self.raw(&format!("{{{}+}}\r\n", data.len()));
            self.current.extend_from_slice(data);
        } else {
            self.raw(&format!("{{{}}}\r\n", data.len()));
            let fragment = std::mem::replace(&mut self.current, data.to_vec());
            self.fragments.push(fragment);
        }
        self
    }

    /// Appends `(flag flag ...)`.
    pub fn flag_list(&mut self, flags: &Flags) -> &mut Self {
        self.raw(&flags.to_string())
    }

    /// Appends a date in `d-Mon-yyyy` form.
    pub fn date(&mut self, date: NaiveDate) -> &mut Self {
        self.raw(&date.format("%-d-%b-%Y").to_string())
    }

    /// Terminates the line and returns the fragments.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.fragments.push(self.current);
        self.fragments
    }

    /// Appends FETCH items.
    pub fn fetch_items(&mut self, items: &FetchItems) -> &mut Self {
        match items {
            FetchItems::All => self.raw("ALL"),
            FetchItems::Fast => self.raw("FAST"),
            FetchItems::Full => self.raw("FULL"),
            FetchItems::Items(attrs) => {
                self.raw("(");
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        self.sp();
                    }
                    self.fetch_attribute(attr);
                }
                self.raw(")")
            }
        }
    }

    fn fetch_attribute(&mut self, attr: &FetchAttribute) -> &mut Self {
        match attr {
            FetchAttribute::Flags => self.raw("FLAGS"),
            FetchAttribute::InternalDate => self.raw("INTERNALDATE"),
            FetchAttribute::Rfc822Size => self.raw("RFC822.SIZE"),
            FetchAttribute::Envelope => self.raw("ENVELOPE"),
            FetchAttribute::BodyStructure => self.raw("BODYSTRUCTURE"),
            FetchAttribute::Uid => self.raw("UID"),
            FetchAttribute::ModSeq => self.raw("MODSEQ"),
            FetchAttribute::Body {
                section,
                peek,
                partial,
            } => {
                self.raw(if *peek { "BODY.PEEK[" } else { "BODY[" });
                if let Some(section) = section {
                    self.raw(section);
                }
                self.raw("]");
                if let Some((start, len)) = partial {
                    self.raw(&format!("<{start}.{len}>"));
                }
                self
            }
        }
    }

    /// Appends a STORE data item and flag list.
    pub fn store_action(&mut self, action: &StoreAction) -> &mut Self {
        if let Some(mod_seq) = action.unchanged_since {
            self.raw(&format!("(UNCHANGEDSINCE {mod_seq}) "));
        }
        self.raw(action.item_name()).sp().flag_list(&action.flags)
    }

    /// Appends search keys.
    pub fn search_criteria(&mut self, criteria: &SearchCriteria) -> &mut Self {
        match criteria {
            SearchCriteria::All => self.raw("ALL"),
            SearchCriteria::Answered => self.raw("ANSWERED"),
            SearchCriteria::Deleted => self.raw("DELETED"),
            SearchCriteria::Draft => self.raw("DRAFT"),
            SearchCriteria::Flagged => self.raw("FLAGGED"),
            SearchCriteria::New => self.raw("NEW"),
            SearchCriteria::Recent => self.raw("RECENT"),
            SearchCriteria::Seen => self.raw("SEEN"),
            SearchCriteria::Unanswered => self.raw("UNANSWERED"),
            SearchCriteria::Undeleted => self.raw("UNDELETED"),
            SearchCriteria::Unflagged => self.raw("UNFLAGGED"),
            SearchCriteria::Unseen => self.raw("UNSEEN"),
            SearchCriteria::Keyword(k) => self.raw("KEYWORD ").raw(k),
            SearchCriteria::Unkeyword(k) => self.raw("UNKEYWORD ").raw(k),
            SearchCriteria::SequenceSet(set) => self.raw(&set.to_string()),
            SearchCriteria::Uid(set) => self.raw("UID ").raw(&set.to_string()),
            SearchCriteria::Subject(s) => self.raw("SUBJECT ").astring(s),
            SearchCriteria::From(s) => self.raw("FROM ").astring(s),
            SearchCriteria::To(s) => self.raw("TO ").astring(s),
            SearchCriteria::Cc(s) => self.raw("CC ").astring(s),
            SearchCriteria::Body(s) => self.raw("BODY ").astring(s),
            SearchCriteria::Text(s) => self.raw("TEXT ").astring(s),
            SearchCriteria::Header(name, value) => {
                self.raw("HEADER ").astring(name).sp().astring(value)
            }
            SearchCriteria::Since(d) => self.raw("SINCE ").date(*d),
            SearchCriteria::Before(d) => self.raw("BEFORE ").date(*d),
            SearchCriteria::On(d) => self.raw("ON ").date(*d),
            SearchCriteria::Larger(n) => self.raw(&format!("LARGER {n}")),
            SearchCriteria::Smaller(n) => self.raw(&format!("SMALLER {n}")),
            SearchCriteria::ModSeq(m) => self.raw(&format!("MODSEQ {m}")),
            SearchCriteria::And(all) if all.is_empty() => self.raw("ALL"),
            SearchCriteria::And(all) => {
                self.raw("(");
                for (i, c) in all.iter().enumerate() {
                    if i > 0 {
                        self.sp();
                    }
                    self.search_criteria(c);
                }
                self.raw(")")
            }
            SearchCriteria::Or(a, b) => {
                self.raw("OR ").search_criteria(a).sp().search_criteria(b)
            }
            SearchCriteria::Not(c) => self.raw("NOT ").search_criteria(c),
        }
    }
}

/// ASTRING-CHAR: atom characters plus `]`.
const fn is_astring_char(b: u8) -> bool {
    b > 0x20 && b < 0x7F && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\')
}

const fn is_quotable(b: u8) -> bool {
    b != 0 && b != b'\r' && b != b'\n' && b < 0x80
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

    fn encode(literal_plus: bool, f: impl FnOnce(&mut CommandBuf)) -> Vec<Vec<u8>> {
        let mut buf = CommandBuf::new(&Tag::new("A1"), literal_plus);
        f(&mut buf);
        buf.finish()
    }

    #[test]
    fn astring_forms() {
        let out = encode(false, |b| {
            b.astring("plain").sp().astring("two words").sp().astring("").sp().astring("q\"t");
        });
        assert_eq!(out, vec![b"A1 plain \"two words\" \"\" \"q\\\"t\"\r\n".to_vec()]);
    }

    #[test]
    fn synchronizing_literal_splits_fragments() {
        let out = encode(false, |b| {
            b.raw("LOGIN ").astring("user").sp().astring("pa\r\nss");
        });
        assert_eq!(
            out,
            vec![b"A1 LOGIN user {6}\r\n".to_vec(), b"pa\r\nss\r\n".to_vec()]
        );
    }

    #[test]
    fn non_synchronizing_literal_stays_inline() {
        let out = encode(true, |b| {
            b.raw("APPEND INBOX ").literal(b"hi");
        });
        assert_eq!(out, vec![b"A1 APPEND INBOX {2+}\r\nhi\r\n".to_vec()]);
    }

    #[test]
    fn eight_bit_text_goes_as_literal() {
        let out = encode(false, |b| {
            b.astring("Grüße");
        });
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], b"A1 {7}\r\n".to_vec());
    }

    #[test]
    fn list_wildcards_unquoted() {
        let out = encode(false, |b| {
            b.list_mailbox("Box*").sp().list_mailbox("a b%");
        });
        assert_eq!(out, vec![b"A1 Box* \"a b%\"\r\n".to_vec()]);
    }

    #[test]
    fn search_dates_and_nesting() {
        let criteria = SearchCriteria::Or(
            Box::new(SearchCriteria::Since(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())),
            Box::new(SearchCriteria::And(vec![
                SearchCriteria::Unseen,
                SearchCriteria::Not(Box::new(SearchCriteria::Deleted)),
            ])),
        );
        let out = encode(false, |b| {
            b.search_criteria(&criteria);
        });
        assert_eq!(out, vec![b"A1 OR SINCE 7-Mar-2024 (UNSEEN NOT DELETED)\r\n".to_vec()]);
    }
}
