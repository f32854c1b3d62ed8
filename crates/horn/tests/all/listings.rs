//! Golden listings: source text through the reader and compiler.

use horn_bytecode::Interner;
use horn_compile::{compile_clause, compile_query, CompileCtx, CompiledClause};

fn compile_text(text: &str) -> (Interner, Vec<CompiledClause>) {
    let _ = env_logger::try_init();
    let mut interner = Interner::new();
    let clause = horn_reader::parse_clause(text, &mut interner).unwrap();
    let mut ctx = CompileCtx::new();
    let clauses = compile_clause(&clause, &mut interner, &mut ctx).unwrap();
    (interner, clauses)
}

fn listing(interner: &Interner, clause: &CompiledClause) -> Vec<String> {
    clause
        .code
        .iter()
        .map(|inst| inst.display(Some(interner)).to_string())
        .collect()
}

#[test]
fn append_base_case() {
    let (interner, clauses) = compile_text("append([], L, L).");
    assert_eq!(
        listing(&interner, &clauses[0]),
        ["get_nil x0", "get_var x3, a1", "get_val x3, a2", "proceed"]
    );
}

#[test]
fn append_recursive_case() {
    let (interner, clauses) = compile_text("append([H|T], L, [H|R]) :- append(T, L, R).");
    assert_eq!(
        listing(&interner, &clauses[0]),
        [
            "get_list x0",
            "unify_var x3",
            "unify_var x4",
            // L sits in its argument register; the head move cancelled.
            "get_list x2",
            "unify_val x3",
            "unify_var x5",
            "put_val x4, a0",
            "put_val x1, a1",
            "put_val x5, a2",
            "execute append/3",
        ]
    );
}

#[test]
fn ground_list_queries_build_bottom_up() {
    let mut interner = Interner::new();
    let query = horn_reader::parse_query("?- append([1,2], [3], X).", &mut interner).unwrap();
    let mut ctx = CompileCtx::new();
    let compiled = compile_query(&query, &mut interner, &mut ctx).unwrap();
    assert_eq!(
        listing(&interner, &compiled.clauses[0]),
        [
            "get_var x3, a0",
            "put_list x5",
            "set_constant 2",
            "set_constant []",
            "put_list x0",
            "set_constant 1",
            "set_val x5",
            "put_list x1",
            "set_constant 3",
            "set_constant []",
            "put_val x3, a2",
            "execute append/3",
        ]
    );
}

#[test]
fn disjunctions_lift_into_auxiliary_predicates() {
    let (interner, clauses) = compile_text("d(X) :- (=(X, a) ; =(X, b)).");
    assert_eq!(clauses.len(), 3, "main clause plus one clause per branch");
    let (name, arity) = interner.functor(clauses[1].functor.id);
    assert!(name.starts_with("$or"));
    assert_eq!(arity, 1);
    assert_eq!(clauses[1].functor, clauses[2].functor);
    // The main clause tail-calls the lifted predicate.
    let main = listing(&interner, &clauses[0]);
    assert_eq!(main.last().unwrap(), &format!("execute {name}/1"));
}

#[test]
fn deep_cut_saves_and_uses_a_level() {
    let (interner, clauses) = compile_text("f(X) :- g(X), !, h(X).");
    let main = listing(&interner, &clauses[0]);
    assert_eq!(main[0], "allocate 2");
    assert_eq!(main[1], "get_level y1");
    assert!(main.contains(&"cut y1".to_owned()));
}
