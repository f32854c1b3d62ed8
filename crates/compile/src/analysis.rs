//! Occurrence analysis, variable classification, register allocation.
//!
//! A depth-first walk over the normalized clause records, per variable, its
//! occurrence count, the chunks it appears in, whether it only ever occurs
//! nested inside a structure, and the last body call that mentions it; per
//! constant it records whether every occurrence is in a non-argument
//! position. The head and the first call goal form one chunk; a variable
//! spanning more than one chunk is permanent and receives an environment
//! slot, everything else lives in a register.

use crate::builtins::{Goal, NormalClause};
use crate::symtab::{Attr, SymbolKey, SymbolTable};
use crate::term::Term;
use crate::CompileError;
use horn_bytecode::{FunctorId, Interner, Slot, VarId};
use rustc_hash::FxHashMap;

/// Facts gathered about one variable.
#[derive(Clone, Debug, Default)]
pub struct VarInfo {
    pub occurrences: u32,
    /// Distinct chunk indices of occurrence, ascending. The head and the
    /// first call goal are chunk 0.
    pub chunks: Vec<u32>,
    /// Index of the last body call whose chunk mentions the variable.
    pub last_call: u32,
    /// Every occurrence is nested inside a structure.
    pub non_arg_only: bool,
    /// Bare occurrence as a head argument, if there is exactly one
    /// discounted occurrence of that shape.
    pub head_bare: Option<u8>,
    /// Bare occurrence as a first-goal argument.
    pub goal0_bare: Option<u8>,
    /// Occurrences not covered by `head_bare`/`goal0_bare`.
    pub other_occs: u32,
    /// First-occurrence rank, for deterministic slot ordering.
    pub order: u32,
}

impl VarInfo {
    pub fn is_permanent(&self) -> bool {
        self.chunks.len() >= 2
    }
}

/// Result of the analysis passes.
pub struct Analysis {
    pub vars: FxHashMap<VarId, VarInfo>,
    /// Named variables in first-occurrence order.
    pub order: Vec<VarId>,
    pub perm_count: u8,
    pub call_goals: u32,
    /// The clause needs an environment frame: it has permanents, or more
    /// than one call, or code after its only call that must return here.
    pub needs_env: bool,
    /// Synthesized level variable when the clause has a deep cut.
    pub level_var: Option<VarId>,
    /// First register index free for temporaries.
    pub temp_base: u8,
}

impl Analysis {
    /// Number of permanent variables still needed after body call `call`.
    pub fn live_after(&self, call: u32) -> u8 {
        self.vars
            .values()
            .filter(|info| info.is_permanent() && info.last_call > call)
            .count() as u8
    }
}

struct Walker<'a> {
    vars: FxHashMap<VarId, VarInfo>,
    order: Vec<VarId>,
    const_occs: FxHashMap<FunctorId, ConstOccs>,
    symtab: &'a mut SymbolTable,
}

#[derive(Default)]
struct ConstOccs {
    count: u32,
    any_arg: bool,
}

enum Position {
    HeadArg(u8),
    Goal0Arg(u8),
    /// A later goal's direct argument.
    GoalArg,
    /// Nested inside a structure.
    Nested,
}

impl Walker<'_> {
    fn var(&mut self, v: VarId, chunk: u32, pos: Position) {
        let next_order = self.vars.len() as u32;
        let info = self.vars.entry(v).or_insert_with(|| VarInfo {
            non_arg_only: true,
            order: next_order,
            ..VarInfo::default()
        });
        if info.occurrences == 0 {
            self.order.push(v);
        }
        info.occurrences += 1;
        if info.chunks.last() != Some(&chunk) {
            info.chunks.push(chunk);
        }
        info.last_call = info.last_call.max(chunk);
        match pos {
            Position::HeadArg(i) if info.head_bare.is_none() => {
                info.head_bare = Some(i);
                info.non_arg_only = false;
            }
            Position::Goal0Arg(i) if info.goal0_bare.is_none() => {
                info.goal0_bare = Some(i);
                info.non_arg_only = false;
            }
            Position::Nested => info.other_occs += 1,
            _ => {
                info.non_arg_only = false;
                info.other_occs += 1;
            }
        }
    }

    fn constant(&mut self, c: FunctorId, arg_position: bool) {
        let occs = self.const_occs.entry(c).or_default();
        occs.count += 1;
        occs.any_arg |= arg_position;
    }

    fn nested(&mut self, term: &Term, chunk: u32) {
        match term {
            Term::Var(v) => self.var(*v, chunk, Position::Nested),
            Term::Anon => {}
            Term::Atom(c) => self.constant(*c, false),
            Term::Struct(_, args) => {
                for arg in args {
                    self.nested(arg, chunk);
                }
            }
        }
    }

    fn args(&mut self, args: &[Term], chunk: u32, bare: impl Fn(u8) -> Position) {
        for (i, arg) in args.iter().enumerate() {
            match arg {
                Term::Var(v) => self.var(*v, chunk, bare(i as u8)),
                Term::Anon => {}
                Term::Atom(c) => self.constant(*c, true),
                Term::Struct(_, _) => self.nested(arg, chunk),
            }
        }
    }
}

/// Run phases 2 and 3 and record the results in the symbol table.
pub fn analyze(
    norm: &NormalClause,
    interner: &mut Interner,
    symtab: &mut SymbolTable,
) -> Result<Analysis, CompileError> {
    let mut walker = Walker {
        vars: FxHashMap::default(),
        order: Vec::new(),
        const_occs: FxHashMap::default(),
        symtab,
    };

    let mut max_arity = 0u8;
    if let Term::Struct(_, args) = &norm.head {
        max_arity = args.len() as u8;
        walker.args(args, 0, Position::HeadArg);
    }

    let mut call_idx: u32 = 0;
    let mut deep_cut_last: Option<u32> = None;
    for goal in &norm.goals {
        match goal {
            Goal::Call(t) => {
                if let Term::Struct(_, args) = t {
                    max_arity = max_arity.max(args.len() as u8);
                    if call_idx == 0 {
                        walker.args(args, 0, Position::Goal0Arg);
                    } else {
                        walker.args(args, call_idx, |_| Position::GoalArg);
                    }
                }
                call_idx += 1;
            }
            Goal::Cut if call_idx > 0 => deep_cut_last = Some(call_idx),
            Goal::Cut | Goal::True => {}
        }
    }
    let call_goals = call_idx;

    // A deep cut needs the entry barrier in a slot that survives the calls
    // before it; model the level as a permanent variable.
    let level_var = match deep_cut_last {
        Some(last) => {
            let v = interner.intern_var("$cutlvl")?;
            let next_order = walker.vars.len() as u32;
            walker.order.push(v);
            walker.vars.insert(
                v,
                VarInfo {
                    occurrences: 2,
                    chunks: vec![0, last],
                    last_call: last,
                    non_arg_only: true,
                    order: next_order,
                    ..VarInfo::default()
                },
            );
            Some(v)
        }
        None => None,
    };

    let Walker {
        vars,
        order,
        const_occs,
        symtab,
    } = walker;

    for (&c, occs) in &const_occs {
        let key = SymbolKey::Functor(c);
        symtab.set(key, Attr::Occurrences, occs.count as i32);
        symtab.set(key, Attr::NonArgOnly, (!occs.any_arg) as i32);
    }
    for (&v, info) in &vars {
        let key = SymbolKey::Var(v);
        symtab.set(key, Attr::Occurrences, info.occurrences as i32);
        symtab.set(key, Attr::NonArgOnly, info.non_arg_only as i32);
        symtab.set(key, Attr::LastCall, info.last_call as i32);
    }

    let perm_count = vars.values().filter(|i| i.is_permanent()).count();
    if perm_count > u8::MAX as usize {
        return Err(CompileError::EnvOverflow { slots: perm_count });
    }

    let last_is_call = matches!(norm.goals.last(), Some(Goal::Call(_)));
    let needs_env = perm_count > 0
        || level_var.is_some()
        || call_goals > 1
        || (call_goals == 1 && !last_is_call);

    Ok(Analysis {
        vars,
        order,
        perm_count: perm_count as u8,
        call_goals,
        needs_env,
        level_var,
        temp_base: max_arity,
    })
}

/// Phase 4: pin down environment slots and the argument-register reuse for
/// bare head variables. Remaining temporaries are assigned on first use
/// during emission, above `temp_base`.
pub fn allocate(analysis: &Analysis, symtab: &mut SymbolTable) {
    // Longest-lived permanents get the lowest slots, so trimming advice in
    // call instructions stays truthful as later slots die first.
    let mut perms: Vec<VarId> = analysis
        .order
        .iter()
        .copied()
        .filter(|v| analysis.vars[v].is_permanent())
        .collect();
    perms.sort_by_key(|v| {
        let info = &analysis.vars[v];
        (core::cmp::Reverse(info.last_call), info.order)
    });
    for (k, v) in perms.iter().enumerate() {
        symtab.set_allocation(*v, Slot::stack(k as u8));
    }

    // A temporary whose occurrences are a bare head argument and at most a
    // bare first-goal argument at the same position can live in that
    // argument register; the head move then cancels entirely.
    for (&v, info) in &analysis.vars {
        if info.is_permanent() {
            continue;
        }
        if let Some(i) = info.head_bare {
            let compatible = info.other_occs == 0
                && (info.goal0_bare.is_none() || info.goal0_bare == Some(i));
            if compatible {
                symtab.set_allocation(v, Slot::reg(i));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{normalize, BuiltinTable};
    use crate::term::Clause;

    fn analyze_clause(
        interner: &mut Interner,
        head: Term,
        body: Option<Term>,
    ) -> (Analysis, SymbolTable) {
        let table = BuiltinTable::new(interner.well_known());
        let clause = Clause { head, body };
        let mut seq = 0;
        let norm = normalize(&clause, &table, interner, &mut seq).unwrap();
        let mut symtab = SymbolTable::new();
        let analysis = analyze(&norm, interner, &mut symtab).unwrap();
        allocate(&analysis, &mut symtab);
        (analysis, symtab)
    }

    #[test]
    fn head_and_first_goal_share_a_chunk() {
        // p(X) :- q(X).  X never outlives the first call: temporary.
        let mut interner = Interner::new();
        let x = interner.intern_var("X").unwrap();
        let p = interner.intern_functor("p", 1).unwrap();
        let q = interner.intern_functor("q", 1).unwrap();
        let (analysis, symtab) = analyze_clause(
            &mut interner,
            Term::Struct(p, vec![Term::Var(x)]),
            Some(Term::Struct(q, vec![Term::Var(x)])),
        );
        assert!(!analysis.vars[&x].is_permanent());
        assert!(!analysis.needs_env);
        // Same bare position on both sides: the argument register is reused.
        assert_eq!(symtab.allocation(x), Some(Slot::reg(0)));
    }

    #[test]
    fn spanning_a_call_makes_a_variable_permanent() {
        // p(X) :- q(X, Y), r(Y).
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let x = interner.intern_var("X").unwrap();
        let y = interner.intern_var("Y").unwrap();
        let p = interner.intern_functor("p", 1).unwrap();
        let q = interner.intern_functor("q", 2).unwrap();
        let r = interner.intern_functor("r", 1).unwrap();
        let body = Term::Struct(
            wk.conj,
            vec![
                Term::Struct(q, vec![Term::Var(x), Term::Var(y)]),
                Term::Struct(r, vec![Term::Var(y)]),
            ],
        );
        let (analysis, symtab) =
            analyze_clause(&mut interner, Term::Struct(p, vec![Term::Var(x)]), Some(body));
        assert!(!analysis.vars[&x].is_permanent());
        assert!(analysis.vars[&y].is_permanent());
        assert_eq!(analysis.perm_count, 1);
        assert!(analysis.needs_env);
        assert_eq!(symtab.allocation(y), Some(Slot::stack(0)));
        assert_eq!(analysis.live_after(0), 1);
        assert_eq!(analysis.live_after(1), 0);
    }

    #[test]
    fn head_to_second_goal_is_permanent() {
        // p(X) :- q, r(X).  The naive "more than one body goal" reading
        // would call X temporary and lose it across the call to q.
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let x = interner.intern_var("X").unwrap();
        let p = interner.intern_functor("p", 1).unwrap();
        let q = interner.intern_atom("q").unwrap();
        let r = interner.intern_functor("r", 1).unwrap();
        let body = Term::Struct(
            wk.conj,
            vec![Term::Atom(q), Term::Struct(r, vec![Term::Var(x)])],
        );
        let (analysis, _) =
            analyze_clause(&mut interner, Term::Struct(p, vec![Term::Var(x)]), Some(body));
        assert!(analysis.vars[&x].is_permanent());
    }

    #[test]
    fn deep_cut_synthesizes_a_permanent_level() {
        // p :- q, !.
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let p = interner.intern_atom("p").unwrap();
        let q = interner.intern_atom("q").unwrap();
        let body = Term::Struct(wk.conj, vec![Term::Atom(q), Term::Atom(wk.cut)]);
        let (analysis, symtab) = analyze_clause(&mut interner, Term::Atom(p), Some(body));
        let level = analysis.level_var.expect("deep cut present");
        assert!(analysis.vars[&level].is_permanent());
        assert!(analysis.needs_env);
        assert_eq!(symtab.allocation(level), Some(Slot::stack(0)));
    }

    #[test]
    fn neck_cut_needs_no_level() {
        // p :- !, q.
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let p = interner.intern_atom("p").unwrap();
        let q = interner.intern_atom("q").unwrap();
        let body = Term::Struct(wk.conj, vec![Term::Atom(wk.cut), Term::Atom(q)]);
        let (analysis, _) = analyze_clause(&mut interner, Term::Atom(p), Some(body));
        assert!(analysis.level_var.is_none());
        assert!(!analysis.needs_env);
    }
}
