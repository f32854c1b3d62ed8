//! The clause-to-bytecode compiler for the Horn abstract machine.
//!
//! Compilation runs in phases over one clause at a time: built-in
//! substitution and normalization ([`builtins`]), occurrence analysis and
//! register allocation ([`analysis`]), code emission ([`emit`]) and
//! peephole optimization ([`peephole`]). Queries compile as a hidden
//! clause whose arguments are the query's free variables, so the engine
//! can seed stable heap roots for binding extraction.

pub mod analysis;
pub mod builtins;
pub mod emit;
pub mod peephole;
pub mod symtab;
pub mod term;

use crate::builtins::BuiltinTable;
use crate::symtab::SymbolTable;
use crate::term::{Clause, Query, Term};
use horn_bytecode::{Functor, Inst, InternOverflow, Interner, VarId, REG_COUNT};

/// Compilation failures.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("clause head must be an atom or a structure")]
    BadHead,
    #[error("cannot define clauses for control construct {name}")]
    ControlHead { name: String },
    #[error("clause body contains an unbound goal")]
    UnboundGoal,
    #[error("meta-call argument must be bound at compile time")]
    UnboundMetaCall,
    #[error("register file exhausted: {needed} registers needed")]
    RegisterPressure { needed: usize },
    #[error("environment frame too large: {slots} permanent slots")]
    EnvOverflow { slots: usize },
    #[error(transparent)]
    Intern(#[from] InternOverflow),
}

/// Engine-owned compilation state that must survive across clauses:
/// sequence numbers keeping generated predicate names unique.
#[derive(Default)]
pub struct CompileCtx {
    aux_seq: u32,
    query_seq: u32,
}

impl CompileCtx {
    pub fn new() -> CompileCtx {
        CompileCtx::default()
    }
}

/// One compiled clause: the predicate it belongs to and its listing.
#[derive(Clone, Debug)]
pub struct CompiledClause {
    pub functor: Functor,
    pub code: Vec<Inst>,
}

/// A compiled query: the hidden entry predicate, its clauses (the entry
/// clause plus any lifted auxiliaries), and the free variables that became
/// the entry predicate's arguments.
#[derive(Debug)]
pub struct CompiledQuery {
    pub functor: Functor,
    pub clauses: Vec<CompiledClause>,
    pub vars: Vec<VarId>,
}

/// Compile a clause. The first element of the result is the clause itself;
/// the rest are auxiliary clauses produced by disjunction lifting.
pub fn compile_clause(
    clause: &Clause,
    interner: &mut Interner,
    ctx: &mut CompileCtx,
) -> Result<Vec<CompiledClause>, CompileError> {
    let table = BuiltinTable::new(interner.well_known());
    compile_with(clause, &table, interner, ctx)
}

fn compile_with(
    clause: &Clause,
    table: &BuiltinTable,
    interner: &mut Interner,
    ctx: &mut CompileCtx,
) -> Result<Vec<CompiledClause>, CompileError> {
    let norm = builtins::normalize(clause, table, interner, &mut ctx.aux_seq)?;
    let mut symtab = SymbolTable::new();
    let analysis = analysis::analyze(&norm, interner, &mut symtab)?;
    analysis::allocate(&analysis, &mut symtab);
    let insts = emit::emit(&norm, &analysis, &mut symtab)?;
    let code = peephole::optimize(insts, &symtab, interner.well_known());

    let functor = norm.head.descriptor().expect("normalize validated the head");
    if log::log_enabled!(log::Level::Debug) {
        let (name, arity) = interner.functor(functor.id);
        log::debug!("compiled {name}/{arity}: {} instructions", code.len());
    }

    let mut out = vec![CompiledClause { functor, code }];
    for aux in &norm.aux {
        out.extend(compile_with(aux, table, interner, ctx)?);
    }
    Ok(out)
}

/// Compile a query into a hidden clause `$queryN(V1, .., Vk) :- Body`.
pub fn compile_query(
    query: &Query,
    interner: &mut Interner,
    ctx: &mut CompileCtx,
) -> Result<CompiledQuery, CompileError> {
    let mut vars = Vec::new();
    query.goal.free_vars(&mut vars);
    if vars.len() > REG_COUNT as usize {
        return Err(CompileError::RegisterPressure { needed: vars.len() });
    }

    let name = format!("$query{}", ctx.query_seq);
    ctx.query_seq += 1;
    let id = interner.intern_functor(&name, vars.len() as u8)?;
    let head = if vars.is_empty() {
        Term::Atom(id)
    } else {
        Term::Struct(id, vars.iter().map(|v| Term::Var(*v)).collect())
    };
    let clause = Clause {
        head,
        body: Some(query.goal.clone()),
    };
    let clauses = compile_clause(&clause, interner, ctx)?;
    Ok(CompiledQuery {
        functor: Functor::new(id, vars.len() as u8),
        clauses,
        vars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(clause: &CompiledClause, interner: &Interner) -> Vec<String> {
        clause
            .code
            .iter()
            .map(|inst| inst.display(Some(interner)).to_string())
            .collect()
    }

    fn compile_one(clause: Clause, interner: &mut Interner) -> Vec<CompiledClause> {
        let mut ctx = CompileCtx::new();
        compile_clause(&clause, interner, &mut ctx).unwrap()
    }

    #[test]
    fn fact_with_constants() {
        let mut interner = Interner::new();
        let p = interner.intern_functor("p", 2).unwrap();
        let a = interner.intern_atom("a").unwrap();
        let b = interner.intern_atom("b").unwrap();
        let clauses = compile_one(
            Clause {
                head: Term::Struct(p, vec![Term::Atom(a), Term::Atom(b)]),
                body: None,
            },
            &mut interner,
        );
        assert_eq!(
            listing(&clauses[0], &interner),
            ["get_constant a, x0", "get_constant b, x1", "proceed"]
        );
    }

    #[test]
    fn atom_fact_is_a_bare_proceed() {
        let mut interner = Interner::new();
        let p = interner.intern_atom("p").unwrap();
        let clauses = compile_one(
            Clause {
                head: Term::Atom(p),
                body: None,
            },
            &mut interner,
        );
        assert_eq!(listing(&clauses[0], &interner), ["proceed"]);
    }

    #[test]
    fn permanent_variable_gets_an_environment() {
        // p(X) :- q(X, Y), r(Y).
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let x = interner.intern_var("X").unwrap();
        let y = interner.intern_var("Y").unwrap();
        let p = interner.intern_functor("p", 1).unwrap();
        let q = interner.intern_functor("q", 2).unwrap();
        let r = interner.intern_functor("r", 1).unwrap();
        let clauses = compile_one(
            Clause {
                head: Term::Struct(p, vec![Term::Var(x)]),
                body: Some(Term::Struct(
                    wk.conj,
                    vec![
                        Term::Struct(q, vec![Term::Var(x), Term::Var(y)]),
                        Term::Struct(r, vec![Term::Var(y)]),
                    ],
                )),
            },
            &mut interner,
        );
        assert_eq!(
            listing(&clauses[0], &interner),
            [
                "allocate 1",
                // get_var x0, a0 cancelled: X lives in its argument register
                "put_val x0, a0",
                "put_var y0, a1",
                "call q/2, 1",
                "put_val y0, a0",
                "deallocate",
                "execute r/1",
            ]
        );
    }

    #[test]
    fn deep_cut_uses_a_level_slot() {
        // max(X, Y, X) :- ge(X, Y), !.
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let x = interner.intern_var("X").unwrap();
        let y = interner.intern_var("Y").unwrap();
        let max = interner.intern_functor("max", 3).unwrap();
        let ge = interner.intern_functor("ge", 2).unwrap();
        let clauses = compile_one(
            Clause {
                head: Term::Struct(max, vec![Term::Var(x), Term::Var(y), Term::Var(x)]),
                body: Some(Term::Struct(
                    wk.conj,
                    vec![
                        Term::Struct(ge, vec![Term::Var(x), Term::Var(y)]),
                        Term::Atom(wk.cut),
                    ],
                )),
            },
            &mut interner,
        );
        assert_eq!(
            listing(&clauses[0], &interner),
            [
                "allocate 1",
                "get_level y0",
                "get_var x3, a0",
                "get_val x3, a2",
                "put_val x3, a0",
                "put_val x1, a1",
                "call ge/2, 1",
                "cut y0",
                "deallocate",
                "proceed",
            ]
        );
    }

    #[test]
    fn nested_constant_folds_to_unify_constant() {
        // p(f(a)).
        let mut interner = Interner::new();
        let p = interner.intern_functor("p", 1).unwrap();
        let f = interner.intern_functor("f", 1).unwrap();
        let a = interner.intern_atom("a").unwrap();
        let clauses = compile_one(
            Clause {
                head: Term::Struct(p, vec![Term::Struct(f, vec![Term::Atom(a)])]),
                body: None,
            },
            &mut interner,
        );
        assert_eq!(
            listing(&clauses[0], &interner),
            ["get_struc f/1, x0", "unify_constant a", "proceed"]
        );
    }

    #[test]
    fn void_runs_collapse() {
        // p(f(_, _, X)).
        let mut interner = Interner::new();
        let p = interner.intern_functor("p", 1).unwrap();
        let f = interner.intern_functor("f", 3).unwrap();
        let x = interner.intern_var("X").unwrap();
        let clauses = compile_one(
            Clause {
                head: Term::Struct(
                    p,
                    vec![Term::Struct(f, vec![Term::Anon, Term::Anon, Term::Var(x)])],
                ),
                body: None,
            },
            &mut interner,
        );
        assert_eq!(
            listing(&clauses[0], &interner),
            ["get_struc f/3, x0", "unify_void 2", "unify_var x1", "proceed"]
        );
    }

    #[test]
    fn query_tail_calls_through_its_argument() {
        // ?- p(X).
        let mut interner = Interner::new();
        let p = interner.intern_functor("p", 1).unwrap();
        let x = interner.intern_var("X").unwrap();
        let mut ctx = CompileCtx::new();
        let query = Query {
            goal: Term::Struct(p, vec![Term::Var(x)]),
        };
        let compiled = compile_query(&query, &mut interner, &mut ctx).unwrap();
        assert_eq!(compiled.vars, vec![x]);
        assert_eq!(compiled.functor.arity, 1);
        // The head move cancels; only the argument hand-off remains.
        assert_eq!(
            listing(&compiled.clauses[0], &interner),
            ["put_val x0, a0", "execute p/1"]
        );
    }

    #[test]
    fn list_arguments_build_bottom_up() {
        // ?- append([1,2], X).  (arity is irrelevant to the shape)
        let mut interner = Interner::new();
        let wk = *interner.well_known();
        let append = interner.intern_functor("append", 2).unwrap();
        let one = interner.intern_atom("1").unwrap();
        let two = interner.intern_atom("2").unwrap();
        let x = interner.intern_var("X").unwrap();
        let list = Term::Struct(
            wk.cons,
            vec![
                Term::Atom(one),
                Term::Struct(wk.cons, vec![Term::Atom(two), Term::Atom(wk.nil)]),
            ],
        );
        let mut ctx = CompileCtx::new();
        let compiled = compile_query(
            &Query {
                goal: Term::Struct(append, vec![list, Term::Var(x)]),
            },
            &mut interner,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            listing(&compiled.clauses[0], &interner),
            [
                "get_var x2, a0",
                "put_list x4",
                "set_constant 2",
                "set_constant []",
                "put_list x0",
                "set_constant 1",
                "set_val x4",
                "put_val x2, a1",
                "execute append/2",
            ]
        );
    }
}
