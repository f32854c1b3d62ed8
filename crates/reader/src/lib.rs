//! Reader for clause and query text.
//!
//! Turns operator-free Prolog source into the term model of
//! `horn-compile`: a lexer, a recursive descent parser, and located parse
//! errors. The engine uses this both for user input and for the built-in
//! library resource it loads at reset.

mod error;
mod lexer;
mod parser;

pub use error::{Location, ParseError, ParseResult};
pub use lexer::{Lexer, LocatedToken, Token};
pub use parser::Parser;

use horn_bytecode::Interner;
use horn_compile::term::{Clause, Query};

/// Parse a sequence of clauses, e.g. a program or the built-in library.
pub fn parse_program(text: &str, interner: &mut Interner) -> ParseResult<Vec<Clause>> {
    Parser::new(text, interner).parse_program()
}

/// Parse a single clause.
pub fn parse_clause(text: &str, interner: &mut Interner) -> ParseResult<Clause> {
    Parser::new(text, interner).parse_clause()
}

/// Parse a single query, with or without the `?-` prefix.
pub fn parse_query(text: &str, interner: &mut Interner) -> ParseResult<Query> {
    Parser::new(text, interner).parse_query()
}
