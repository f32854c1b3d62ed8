//! Built-in recognition and clause normalization.
//!
//! The first compiler phase walks a clause and substitutes every functor
//! the built-in table recognizes with its compile strategy: conjunctions
//! flatten into the goal sequence, disjunctions lift into auxiliary
//! predicates, `call/1` with a bound argument compiles as the argument
//! itself, `true` vanishes, `fail` stays a plain call of a predicate that
//! is never defined, and the cut becomes a marker resolved to a neck or
//! deep cut at emission.

use crate::term::{Clause, Term};
use crate::CompileError;
use horn_bytecode::{FunctorId, Interner, WellKnown};
use rustc_hash::FxHashMap;

/// The built-in vocabulary. Each variant names the strategy substituted
/// for a plain call of the matching functor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    /// `true/0`: compiles to no code.
    True,
    /// `fail/0`: compiles to a call of an undefined predicate; the machine
    /// folds the unresolved call into backtracking.
    Fail,
    /// `!/0`.
    Cut,
    /// `,/2`: flattened into the goal sequence.
    Conj,
    /// `;/2`: each branch is lifted into an auxiliary predicate clause.
    Disj,
    /// `call/1`: a bound argument compiles as the argument goal itself.
    Call,
}

/// Dispatch table from functor ids to built-in variants.
pub struct BuiltinTable {
    map: FxHashMap<FunctorId, Builtin>,
}

impl BuiltinTable {
    pub fn new(wk: &WellKnown) -> BuiltinTable {
        let mut map = FxHashMap::default();
        map.insert(wk.truth, Builtin::True);
        map.insert(wk.fail, Builtin::Fail);
        map.insert(wk.cut, Builtin::Cut);
        map.insert(wk.conj, Builtin::Conj);
        map.insert(wk.disj, Builtin::Disj);
        map.insert(wk.call, Builtin::Call);
        BuiltinTable { map }
    }

    pub fn lookup(&self, id: FunctorId) -> Option<Builtin> {
        self.map.get(&id).copied()
    }
}

/// One normalized body goal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Goal {
    /// Call a predicate, user-defined or not.
    Call(Term),
    /// No code.
    True,
    /// Cut back to the barrier recorded at clause entry.
    Cut,
}

/// A clause after built-in substitution: a flattened goal sequence plus the
/// auxiliary clauses produced by disjunction lifting.
#[derive(Debug)]
pub struct NormalClause {
    pub head: Term,
    pub goals: Vec<Goal>,
    pub aux: Vec<Clause>,
}

/// Normalize a clause. `aux_seq` numbers lifted predicates engine-wide so
/// separate compilations never collide.
pub fn normalize(
    clause: &Clause,
    table: &BuiltinTable,
    interner: &mut Interner,
    aux_seq: &mut u32,
) -> Result<NormalClause, CompileError> {
    let head_id = match clause.head.descriptor() {
        Some(f) => f.id,
        None => return Err(CompileError::BadHead),
    };
    match table.lookup(head_id) {
        Some(Builtin::Cut | Builtin::Conj | Builtin::Disj | Builtin::Call) => {
            let (name, arity) = interner.functor(head_id);
            return Err(CompileError::ControlHead {
                name: format!("{name}/{arity}"),
            });
        }
        _ => {}
    }

    let mut norm = NormalClause {
        head: clause.head.clone(),
        goals: Vec::new(),
        aux: Vec::new(),
    };
    if let Some(body) = &clause.body {
        flatten(body, table, interner, aux_seq, &mut norm)?;
    }
    Ok(norm)
}

fn flatten(
    term: &Term,
    table: &BuiltinTable,
    interner: &mut Interner,
    aux_seq: &mut u32,
    norm: &mut NormalClause,
) -> Result<(), CompileError> {
    match term {
        Term::Var(_) | Term::Anon => Err(CompileError::UnboundGoal),
        Term::Atom(id) => {
            match table.lookup(*id) {
                Some(Builtin::True) => norm.goals.push(Goal::True),
                Some(Builtin::Cut) => norm.goals.push(Goal::Cut),
                // `fail` included: the call strategy leaves it unresolved.
                _ => norm.goals.push(Goal::Call(term.clone())),
            }
            Ok(())
        }
        Term::Struct(id, args) => match table.lookup(*id) {
            Some(Builtin::Conj) if args.len() == 2 => {
                flatten(&args[0], table, interner, aux_seq, norm)?;
                flatten(&args[1], table, interner, aux_seq, norm)
            }
            Some(Builtin::Disj) if args.len() == 2 => lift(term, interner, aux_seq, norm),
            Some(Builtin::Call) if args.len() == 1 => match &args[0] {
                Term::Var(_) | Term::Anon => Err(CompileError::UnboundMetaCall),
                goal => flatten(goal, table, interner, aux_seq, norm),
            },
            _ => {
                norm.goals.push(Goal::Call(term.clone()));
                Ok(())
            }
        },
    }
}

/// Replace a disjunction with a call to a fresh predicate holding one
/// clause per branch, closed over the disjunction's free variables.
fn lift(
    term: &Term,
    interner: &mut Interner,
    aux_seq: &mut u32,
    norm: &mut NormalClause,
) -> Result<(), CompileError> {
    let disj = interner.well_known().disj;
    let mut branches = Vec::new();
    let mut rest = term;
    while let Term::Struct(id, args) = rest {
        if *id != disj || args.len() != 2 {
            break;
        }
        branches.push(args[0].clone());
        rest = &args[1];
    }
    branches.push(rest.clone());

    let mut vars = Vec::new();
    term.free_vars(&mut vars);

    let name = format!("$or{}", *aux_seq);
    *aux_seq += 1;
    let id = interner.intern_functor(&name, vars.len() as u8)?;
    let head = if vars.is_empty() {
        Term::Atom(id)
    } else {
        Term::Struct(id, vars.iter().map(|v| Term::Var(*v)).collect())
    };

    for branch in branches {
        norm.aux.push(Clause {
            head: head.clone(),
            body: Some(branch),
        });
    }
    norm.goals.push(Goal::Call(head));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Interner, BuiltinTable) {
        let interner = Interner::new();
        let table = BuiltinTable::new(interner.well_known());
        (interner, table)
    }

    #[test]
    fn conjunction_flattens() {
        let (mut interner, table) = setup();
        let wk = *interner.well_known();
        let p = Term::Atom(interner.intern_atom("p").unwrap());
        let q = Term::Atom(interner.intern_atom("q").unwrap());
        let h = Term::Atom(interner.intern_atom("h").unwrap());
        let body = Term::Struct(wk.conj, vec![p.clone(), Term::Struct(wk.conj, vec![Term::Atom(wk.truth), q.clone()])]);
        let clause = Clause { head: h, body: Some(body) };
        let mut seq = 0;
        let norm = normalize(&clause, &table, &mut interner, &mut seq).unwrap();
        assert_eq!(norm.goals, vec![Goal::Call(p), Goal::True, Goal::Call(q)]);
        assert!(norm.aux.is_empty());
    }

    #[test]
    fn disjunction_lifts_branches() {
        let (mut interner, table) = setup();
        let wk = *interner.well_known();
        let x = interner.intern_var("X").unwrap();
        let p = interner.intern_functor("p", 1).unwrap();
        let q = interner.intern_functor("q", 1).unwrap();
        let branch_p = Term::Struct(p, vec![Term::Var(x)]);
        let branch_q = Term::Struct(q, vec![Term::Var(x)]);
        let body = Term::Struct(wk.disj, vec![branch_p.clone(), branch_q.clone()]);
        let h = Term::Atom(interner.intern_atom("h").unwrap());
        let clause = Clause { head: h, body: Some(body) };
        let mut seq = 0;
        let norm = normalize(&clause, &table, &mut interner, &mut seq).unwrap();

        assert_eq!(norm.aux.len(), 2);
        assert_eq!(norm.aux[0].body, Some(branch_p));
        assert_eq!(norm.aux[1].body, Some(branch_q));
        // Both branch clauses share one lifted head over the free variables.
        assert_eq!(norm.aux[0].head, norm.aux[1].head);
        match &norm.goals[..] {
            [Goal::Call(Term::Struct(_, args))] => assert_eq!(args, &vec![Term::Var(x)]),
            other => panic!("unexpected goals: {other:?}"),
        }
    }

    #[test]
    fn bound_meta_call_inlines() {
        let (mut interner, table) = setup();
        let wk = *interner.well_known();
        let p = Term::Atom(interner.intern_atom("p").unwrap());
        let h = Term::Atom(interner.intern_atom("h").unwrap());
        let clause = Clause {
            head: h.clone(),
            body: Some(Term::Struct(wk.call, vec![p.clone()])),
        };
        let mut seq = 0;
        let norm = normalize(&clause, &table, &mut interner, &mut seq).unwrap();
        assert_eq!(norm.goals, vec![Goal::Call(p)]);

        let clause = Clause {
            head: h,
            body: Some(Term::Struct(wk.call, vec![Term::Anon])),
        };
        assert!(matches!(
            normalize(&clause, &table, &mut interner, &mut seq),
            Err(CompileError::UnboundMetaCall)
        ));
    }

    #[test]
    fn control_heads_are_rejected() {
        let (mut interner, table) = setup();
        let wk = *interner.well_known();
        let clause = Clause {
            head: Term::Struct(wk.conj, vec![Term::Anon, Term::Anon]),
            body: None,
        };
        let mut seq = 0;
        assert!(matches!(
            normalize(&clause, &table, &mut interner, &mut seq),
            Err(CompileError::ControlHead { .. })
        ));
    }
}
