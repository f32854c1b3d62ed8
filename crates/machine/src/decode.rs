//! Heap decoding.
//!
//! Walks tagged cells from a root address and reconstructs an abstract
//! term. One reader is shared across all roots of a solution, so cells
//! reached through different roots decode to the same abstract variable.
//! Structures are tracked on the walk path: a back-edge (the occurs-check
//! is deliberately absent, so cyclic terms exist) decodes to a sentinel
//! atom or an error, and a depth bound keeps the result finite either way.

use crate::store::Store;
use crate::MachineError;
use horn_bytecode::{Functor, FunctorId, Interner, Tag, VarId};
use horn_compile::term::Term;
use rustc_hash::{FxHashMap, FxHashSet};

/// What a detected cycle decodes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CycleBehavior {
    /// Emit the `$cycle` atom in place of the back-edge.
    Sentinel,
    /// Fail the decode.
    Error,
}

#[derive(Copy, Clone, Debug)]
pub struct DecodeSettings {
    pub max_depth: u32,
    pub on_cycle: CycleBehavior,
}

impl Default for DecodeSettings {
    fn default() -> DecodeSettings {
        DecodeSettings {
            max_depth: 4096,
            on_cycle: CycleBehavior::Sentinel,
        }
    }
}

/// Shared decoding context for one solution.
pub struct TermReader<'a> {
    store: &'a Store,
    interner: &'a mut Interner,
    settings: DecodeSettings,
    vars: FxHashMap<u32, VarId>,
    path: FxHashSet<u32>,
}

impl<'a> TermReader<'a> {
    pub fn new(store: &'a Store, interner: &'a mut Interner) -> TermReader<'a> {
        TermReader {
            store,
            interner,
            settings: DecodeSettings::default(),
            vars: FxHashMap::default(),
            path: FxHashSet::default(),
        }
    }

    pub fn with_settings(mut self, settings: DecodeSettings) -> TermReader<'a> {
        self.settings = settings;
        self
    }

    /// Decode the term rooted at `addr`.
    pub fn read(&mut self, addr: u32) -> Result<Term, MachineError> {
        self.read_at(addr, 0)
    }

    fn read_at(&mut self, addr: u32, depth: u32) -> Result<Term, MachineError> {
        if depth > self.settings.max_depth {
            return self.cycle();
        }
        let (addr, cell) = self.store.deref(addr)?;
        match cell.tag().expect("deref returns validated cells") {
            Tag::Ref => {
                if let Some(v) = self.vars.get(&addr) {
                    return Ok(Term::Var(*v));
                }
                let name = format!("_G{}", self.vars.len());
                let v = self.interner.intern_var(&name)?;
                self.vars.insert(addr, v);
                Ok(Term::Var(v))
            }
            Tag::Con => Ok(Term::Atom(FunctorId::from_u32(cell.payload()))),
            Tag::Str => {
                if !self.path.insert(addr) {
                    return self.cycle();
                }
                let f = Functor::from_word(self.store.get(cell.payload())?.bits());
                let mut args = Vec::with_capacity(f.arity as usize);
                for k in 1..=f.arity as u32 {
                    args.push(self.read_at(cell.payload() + k, depth + 1)?);
                }
                self.path.remove(&addr);
                Ok(if args.is_empty() {
                    Term::Atom(f.id)
                } else {
                    Term::Struct(f.id, args)
                })
            }
            Tag::Lis => {
                if !self.path.insert(addr) {
                    return self.cycle();
                }
                let head = self.read_at(cell.payload(), depth + 1)?;
                let tail = self.read_at(cell.payload() + 1, depth + 1)?;
                self.path.remove(&addr);
                let cons = self.interner.well_known().cons;
                Ok(Term::Struct(cons, vec![head, tail]))
            }
        }
    }

    fn cycle(&mut self) -> Result<Term, MachineError> {
        match self.settings.on_cycle {
            CycleBehavior::Sentinel => Ok(Term::Atom(self.interner.intern_atom("$cycle")?)),
            CycleBehavior::Error => Err(MachineError::CyclicTerm),
        }
    }
}
