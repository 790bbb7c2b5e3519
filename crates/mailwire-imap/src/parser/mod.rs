//! Sans-I/O parser for server responses.
//!
//! The [`Lexer`] tokenizes one framed line; [`ResponseParser`] builds a
//! [`Response`] from it.
//!
//! ```
//! use mailwire_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(3)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyStructure, ESearchResult, Envelope, FetchItem, NamespaceEntry, Namespaces,
    QuotaResource, Response, ResponseParser, UntaggedResponse,
};
