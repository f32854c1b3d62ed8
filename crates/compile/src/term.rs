//! Abstract terms and clauses.
//!
//! This is the shape the reader produces and the compiler consumes; the
//! heap decoder also reconstructs values in this form after resolution.

use horn_bytecode::{Functor, FunctorId, Interner, VarId};
use std::fmt::Write;

/// A first-order term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// A named variable.
    Var(VarId),
    /// The anonymous variable `_`. Every occurrence is distinct.
    Anon,
    /// An atom, i.e. a functor of arity 0.
    Atom(FunctorId),
    /// A compound term. The functor id was interned at the argument count,
    /// which is always non-zero.
    Struct(FunctorId, Vec<Term>),
}

impl Term {
    /// The functor descriptor of an atom or structure.
    pub fn descriptor(&self) -> Option<Functor> {
        match self {
            Term::Atom(id) => Some(Functor::new(*id, 0)),
            Term::Struct(id, args) => Some(Functor::new(*id, args.len() as u8)),
            Term::Var(_) | Term::Anon => None,
        }
    }

    /// Collect the named free variables in first-occurrence order.
    pub fn free_vars(&self, out: &mut Vec<VarId>) {
        match self {
            Term::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Term::Anon | Term::Atom(_) => {}
            Term::Struct(_, args) => {
                for arg in args {
                    arg.free_vars(out);
                }
            }
        }
    }
}

/// A program clause: a fact when `body` is absent, a rule otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub head: Term,
    pub body: Option<Term>,
}

/// A query: a body with no head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub goal: Term,
}

/// Renders terms in source syntax, with list sugar.
pub struct TermPrinter<'a> {
    interner: &'a Interner,
}

impl<'a> TermPrinter<'a> {
    pub fn new(interner: &'a Interner) -> TermPrinter<'a> {
        TermPrinter { interner }
    }

    pub fn print(&self, term: &Term) -> String {
        let mut out = String::new();
        self.write(term, &mut out);
        out
    }

    fn write(&self, term: &Term, out: &mut String) {
        let wk = self.interner.well_known();
        match term {
            Term::Var(v) => out.push_str(self.interner.var_name(*v)),
            Term::Anon => out.push('_'),
            Term::Atom(id) => out.push_str(self.interner.functor(*id).0),
            Term::Struct(id, args) if *id == wk.cons && args.len() == 2 => {
                out.push('[');
                self.write(&args[0], out);
                let mut tail = &args[1];
                loop {
                    match tail {
                        Term::Struct(id, args) if *id == wk.cons && args.len() == 2 => {
                            out.push(',');
                            self.write(&args[0], out);
                            tail = &args[1];
                        }
                        Term::Atom(id) if *id == wk.nil => break,
                        other => {
                            out.push('|');
                            self.write(other, out);
                            break;
                        }
                    }
                }
                out.push(']');
            }
            Term::Struct(id, args) => {
                let _ = write!(out, "{}(", self.interner.functor(*id).0);
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write(arg, out);
                }
                out.push(')');
            }
        }
    }
}
