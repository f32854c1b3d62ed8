//! Name interning.
//!
//! Textual names are mapped to dense small-integer ids so that cells and
//! instruction operands can carry them in a 24-bit payload. Functors intern
//! as (name, arity) pairs: `foo/2` and `foo/3` receive distinct ids, and id
//! equality implies equality of both name and arity. Variable names live in
//! their own namespace and are never compared by arity.

use crate::cell::{Functor, PAYLOAD_MASK};
use core::fmt;
use rustc_hash::FxHashMap;

/// An interned functor name id. Dense, starting at 0.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctorId(u32);

impl FunctorId {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn from_u32(raw: u32) -> FunctorId {
        FunctorId(raw)
    }
}

impl fmt::Debug for FunctorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fun{}", self.0)
    }
}

/// An interned variable name id. Dense, starting at 0.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn from_u32(raw: u32) -> VarId {
        VarId(raw)
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "var{}", self.0)
    }
}

/// An interner namespace ran out of 24-bit ids.
#[derive(Debug, thiserror::Error)]
#[error("interner exhausted: no {namespace} ids left")]
pub struct InternOverflow {
    pub namespace: &'static str,
}

/// Functor ids reserved at construction for names the compiler treats
/// specially.
#[derive(Copy, Clone, Debug)]
pub struct WellKnown {
    /// `[]/0`, the empty list.
    pub nil: FunctorId,
    /// `./2`, the list constructor.
    pub cons: FunctorId,
    /// `true/0`.
    pub truth: FunctorId,
    /// `fail/0`.
    pub fail: FunctorId,
    /// `!/0`, the cut.
    pub cut: FunctorId,
    /// `,/2`, conjunction.
    pub conj: FunctorId,
    /// `;/2`, disjunction.
    pub disj: FunctorId,
    /// `call/1`, the meta-call.
    pub call: FunctorId,
}

/// Bidirectional name/id maps for both namespaces.
pub struct Interner {
    functor_ids: FxHashMap<(String, u8), FunctorId>,
    functors: Vec<(String, u8)>,
    var_ids: FxHashMap<String, VarId>,
    vars: Vec<String>,
    well_known: WellKnown,
}

impl Interner {
    pub fn new() -> Interner {
        let mut interner = Interner {
            functor_ids: FxHashMap::default(),
            functors: Vec::new(),
            var_ids: FxHashMap::default(),
            vars: Vec::new(),
            well_known: WellKnown {
                nil: FunctorId(0),
                cons: FunctorId(0),
                truth: FunctorId(0),
                fail: FunctorId(0),
                cut: FunctorId(0),
                conj: FunctorId(0),
                disj: FunctorId(0),
                call: FunctorId(0),
            },
        };
        // Reserved names intern first so their ids are stable.
        interner.well_known = WellKnown {
            nil: interner.must_intern("[]", 0),
            cons: interner.must_intern(".", 2),
            truth: interner.must_intern("true", 0),
            fail: interner.must_intern("fail", 0),
            cut: interner.must_intern("!", 0),
            conj: interner.must_intern(",", 2),
            disj: interner.must_intern(";", 2),
            call: interner.must_intern("call", 1),
        };
        interner
    }

    fn must_intern(&mut self, name: &str, arity: u8) -> FunctorId {
        self.intern_functor(name, arity).expect("fresh interner")
    }

    /// The reserved ids.
    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    /// Intern a functor name at the given arity.
    pub fn intern_functor(&mut self, name: &str, arity: u8) -> Result<FunctorId, InternOverflow> {
        if let Some(&id) = self.functor_ids.get(&(name.to_owned(), arity)) {
            return Ok(id);
        }
        let raw = self.functors.len() as u32;
        if raw > PAYLOAD_MASK {
            return Err(InternOverflow {
                namespace: "functor",
            });
        }
        let id = FunctorId(raw);
        self.functors.push((name.to_owned(), arity));
        self.functor_ids.insert((name.to_owned(), arity), id);
        Ok(id)
    }

    /// Intern an atom, i.e. a functor of arity 0.
    pub fn intern_atom(&mut self, name: &str) -> Result<FunctorId, InternOverflow> {
        self.intern_functor(name, 0)
    }

    /// The name and arity behind a functor id.
    pub fn functor(&self, id: FunctorId) -> (&str, u8) {
        let (name, arity) = &self.functors[id.0 as usize];
        (name, *arity)
    }

    /// Rebuild the descriptor for an interned id.
    pub fn descriptor(&self, id: FunctorId) -> Functor {
        Functor::new(id, self.functors[id.0 as usize].1)
    }

    /// Intern a variable name.
    pub fn intern_var(&mut self, name: &str) -> Result<VarId, InternOverflow> {
        if let Some(&id) = self.var_ids.get(name) {
            return Ok(id);
        }
        let raw = self.vars.len() as u32;
        if raw > PAYLOAD_MASK {
            return Err(InternOverflow {
                namespace: "variable",
            });
        }
        let id = VarId(raw);
        self.vars.push(name.to_owned());
        self.var_ids.insert(name.to_owned(), id);
        Ok(id)
    }

    /// The name behind a variable id.
    pub fn var_name(&self, id: VarId) -> &str {
        &self.vars[id.0 as usize]
    }
}

impl Default for Interner {
    fn default() -> Interner {
        Interner::new()
    }
}
