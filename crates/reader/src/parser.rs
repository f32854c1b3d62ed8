//! Recursive descent parsing of clause text into terms.

use crate::error::{Location, ParseResult};
use crate::lexer::{Lexer, LocatedToken, Token};
use horn_bytecode::{FunctorId, Interner};
use horn_compile::term::{Clause, Query, Term};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<LocatedToken>,
    interner: &'a mut Interner,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, interner: &'a mut Interner) -> Parser<'a> {
        Parser {
            lexer: Lexer::new(text),
            lookahead: None,
            interner,
        }
    }

    fn peek(&mut self) -> ParseResult<Option<&Token>> {
        if self.lookahead.is_none() {
            self.lookahead = self.lexer.next_token()?;
        }
        Ok(self.lookahead.as_ref().map(|t| &t.token))
    }

    fn take(&mut self) -> ParseResult<Option<LocatedToken>> {
        self.peek()?;
        Ok(self.lookahead.take())
    }

    fn location(&mut self) -> Location {
        // Fill the lookahead so the upcoming token's position is reported;
        // a lexical error here resurfaces on the next `take`.
        let _ = self.peek();
        match &self.lookahead {
            Some(t) => t.location,
            None => self.lexer.location(),
        }
    }

    fn expect(&mut self, want: &Token, what: &str) -> ParseResult<()> {
        let location = self.location();
        match self.take()? {
            Some(t) if t.token == *want => Ok(()),
            Some(t) => err!(location, "expected {}, found {:?}", what, t.token),
            None => err!(location, "expected {}, found end of input", what),
        }
    }

    fn intern_functor(&mut self, name: &str, arity: u8, loc: Location) -> ParseResult<FunctorId> {
        match self.interner.intern_functor(name, arity) {
            Ok(id) => Ok(id),
            Err(e) => err!(loc, "{}", e),
        }
    }

    /// Parse a whole program: clauses up to end of input.
    pub fn parse_program(&mut self) -> ParseResult<Vec<Clause>> {
        let mut clauses = Vec::new();
        while self.peek()?.is_some() {
            clauses.push(self.clause()?);
        }
        Ok(clauses)
    }

    /// Parse exactly one clause.
    pub fn parse_clause(&mut self) -> ParseResult<Clause> {
        let clause = self.clause()?;
        self.end_of_input()?;
        Ok(clause)
    }

    /// Parse a query, with or without the `?-` prefix.
    pub fn parse_query(&mut self) -> ParseResult<Query> {
        if self.peek()? == Some(&Token::QueryPrefix) {
            self.take()?;
        }
        let goal = self.body()?;
        self.expect(&Token::Dot, "`.`")?;
        self.end_of_input()?;
        Ok(Query { goal })
    }

    fn end_of_input(&mut self) -> ParseResult<()> {
        let location = self.location();
        match self.peek()? {
            None => Ok(()),
            Some(t) => err!(location, "trailing input after clause: {:?}", t),
        }
    }

    fn clause(&mut self) -> ParseResult<Clause> {
        let head = self.term()?;
        let location = self.location();
        match self.take()? {
            Some(t) if t.token == Token::Dot => Ok(Clause { head, body: None }),
            Some(t) if t.token == Token::Neck => {
                let body = self.body()?;
                self.expect(&Token::Dot, "`.`")?;
                Ok(Clause {
                    head,
                    body: Some(body),
                })
            }
            Some(t) => err!(location, "expected `.` or `:-` after head, found {:?}", t.token),
            None => err!(location, "unterminated clause"),
        }
    }

    fn body(&mut self) -> ParseResult<Term> {
        // Disjunction binds loosest, and both connectives are right
        // associative.
        let lhs = self.conjunct()?;
        if self.peek()? == Some(&Token::Semicolon) {
            self.take()?;
            let rhs = self.body()?;
            let disj = self.interner.well_known().disj;
            return Ok(Term::Struct(disj, vec![lhs, rhs]));
        }
        Ok(lhs)
    }

    fn conjunct(&mut self) -> ParseResult<Term> {
        let lhs = self.primary()?;
        if self.peek()? == Some(&Token::Comma) {
            self.take()?;
            let rhs = self.conjunct()?;
            let conj = self.interner.well_known().conj;
            return Ok(Term::Struct(conj, vec![lhs, rhs]));
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> ParseResult<Term> {
        match self.peek()? {
            Some(Token::Cut) => {
                self.take()?;
                Ok(Term::Atom(self.interner.well_known().cut))
            }
            Some(Token::LParen) => {
                self.take()?;
                let body = self.body()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(body)
            }
            _ => self.term(),
        }
    }

    fn term(&mut self) -> ParseResult<Term> {
        let location = self.location();
        match self.take()? {
            Some(LocatedToken {
                token: Token::Var(name),
                ..
            }) => {
                if name == "_" {
                    Ok(Term::Anon)
                } else {
                    match self.interner.intern_var(&name) {
                        Ok(v) => Ok(Term::Var(v)),
                        Err(e) => err!(location, "{}", e),
                    }
                }
            }
            Some(LocatedToken {
                token: Token::Int(text),
                ..
            }) => {
                // No arithmetic in the engine: numerals are plain atoms.
                let id = self.intern_functor(&text, 0, location)?;
                Ok(Term::Atom(id))
            }
            Some(LocatedToken {
                token: Token::Atom(name),
                ..
            }) => {
                if self.peek()? == Some(&Token::LParen) {
                    self.take()?;
                    let mut args = vec![self.term()?];
                    loop {
                        let location = self.location();
                        match self.take()? {
                            Some(t) if t.token == Token::Comma => args.push(self.term()?),
                            Some(t) if t.token == Token::RParen => break,
                            Some(t) => {
                                return err!(
                                    location,
                                    "expected `,` or `)` in argument list, found {:?}",
                                    t.token
                                )
                            }
                            None => return err!(location, "unterminated argument list"),
                        }
                    }
                    if args.len() > u8::MAX as usize {
                        return err!(location, "too many arguments for `{}`", name);
                    }
                    let id = self.intern_functor(&name, args.len() as u8, location)?;
                    Ok(Term::Struct(id, args))
                } else {
                    let id = self.intern_functor(&name, 0, location)?;
                    Ok(Term::Atom(id))
                }
            }
            Some(LocatedToken {
                token: Token::LBracket,
                ..
            }) => self.list(location),
            Some(t) => err!(location, "expected a term, found {:?}", t.token),
            None => err!(location, "expected a term, found end of input"),
        }
    }

    fn list(&mut self, location: Location) -> ParseResult<Term> {
        let wk = *self.interner.well_known();
        if self.peek()? == Some(&Token::RBracket) {
            self.take()?;
            return Ok(Term::Atom(wk.nil));
        }
        let mut items = vec![self.term()?];
        let tail;
        loop {
            let location = self.location();
            match self.take()? {
                Some(t) if t.token == Token::Comma => items.push(self.term()?),
                Some(t) if t.token == Token::RBracket => {
                    tail = Term::Atom(wk.nil);
                    break;
                }
                Some(t) if t.token == Token::Bar => {
                    tail = self.term()?;
                    self.expect(&Token::RBracket, "`]`")?;
                    break;
                }
                Some(t) => {
                    return err!(
                        location,
                        "expected `,`, `|` or `]` in list, found {:?}",
                        t.token
                    )
                }
                None => return err!(location, "unterminated list"),
            }
        }
        Ok(items
            .into_iter()
            .rev()
            .fold(tail, |tail, item| Term::Struct(wk.cons, vec![item, tail])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horn_compile::term::TermPrinter;

    fn parse_term_text(text: &str) -> (Interner, Term) {
        let mut interner = Interner::new();
        let query = {
            let mut parser = Parser::new(text, &mut interner);
            parser.parse_query().unwrap()
        };
        (interner, query.goal)
    }

    #[test]
    fn parses_structures_and_lists() {
        let (interner, goal) = parse_term_text("?- append([1,2], [3|T], X).");
        let printed = TermPrinter::new(&interner).print(&goal);
        assert_eq!(printed, "append([1,2],[3|T],X)");
    }

    #[test]
    fn parses_rules_and_facts() {
        let mut interner = Interner::new();
        let clauses = Parser::new("p(a).\nq(X) :- p(X), r.\n", &mut interner)
            .parse_program()
            .unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses[0].body.is_none());
        let body = clauses[1].body.as_ref().unwrap();
        let printed = TermPrinter::new(&interner).print(body);
        assert_eq!(printed, ",(p(X),r)");
    }

    #[test]
    fn cut_and_disjunction() {
        let mut interner = Interner::new();
        let clause = Parser::new("p :- (q ; r), !.", &mut interner)
            .parse_clause()
            .unwrap();
        let printed = TermPrinter::new(&interner).print(clause.body.as_ref().unwrap());
        assert_eq!(printed, ",(;(q,r),!)");
    }

    #[test]
    fn quoted_and_symbolic_atoms_are_functors() {
        let mut interner = Interner::new();
        let clause = Parser::new("'='(X, X).", &mut interner).parse_clause().unwrap();
        let printed = TermPrinter::new(&interner).print(&clause.head);
        assert_eq!(printed, "=(X,X)");
    }

    #[test]
    fn errors_carry_locations() {
        let mut interner = Interner::new();
        let err = Parser::new("p(a)\nq.", &mut interner)
            .parse_program()
            .unwrap_err();
        assert_eq!(err.location.line_number, 2);
        assert!(err.message.contains("expected `.` or `:-`"));
    }

    #[test]
    fn anonymous_variables_stay_anonymous() {
        let (_, goal) = parse_term_text("?- p(_, _).");
        match goal {
            Term::Struct(_, args) => assert_eq!(args, vec![Term::Anon, Term::Anon]),
            other => panic!("unexpected goal {other:?}"),
        }
    }
}
