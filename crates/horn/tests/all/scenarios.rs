//! Resolution scenarios over the engine API.

use crate::{empty_solutions, engine_with, solution_count, var_texts};

#[test]
fn facts_enumerate_in_declaration_order() {
    let mut engine = engine_with("p(a). p(b). p(c).");
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a", "b", "c"]);
}

#[test]
fn heap_returns_to_its_post_load_size_after_exhaustion() {
    let mut engine = engine_with("p(a). p(b). p(c).");
    engine.set_query_text("?- p(X).").unwrap();
    let before = engine.heap_cells();
    assert_eq!(engine.solutions().count(), 3);
    // Everything above the single query root was reclaimed by the final
    // backtrack.
    assert_eq!(engine.heap_cells(), before + 1);
}

const APPEND: &str = "
append([], L, L).
append([H|T], L, [H|R]) :- append(T, L, R).
";

#[test]
fn append_builds_a_list() {
    let mut engine = engine_with(APPEND);
    assert_eq!(
        var_texts(&mut engine, "?- append([1,2], [3,4], X).", "X"),
        ["[1,2,3,4]"]
    );
}

#[test]
fn append_splits_a_list_in_order() {
    let mut engine = engine_with(APPEND);
    engine.set_query_text("?- append(X, Y, [1,2]).").unwrap();
    let splits: Vec<(String, String)> = engine
        .solutions()
        .map(|solution| {
            let s = solution.unwrap();
            (
                s.text("X").unwrap().to_owned(),
                s.text("Y").unwrap().to_owned(),
            )
        })
        .collect();
    assert_eq!(
        splits,
        [
            ("[]".to_owned(), "[1,2]".to_owned()),
            ("[1]".to_owned(), "[2]".to_owned()),
            ("[1,2]".to_owned(), "[]".to_owned()),
        ]
    );
}

#[test]
fn naive_reverse() {
    let mut engine = engine_with(
        "
        nrev([], []).
        nrev([X|R], A) :- nrev(R, L), append(L, [X], A).
        append([], L, L).
        append([H|T], L, [H|R]) :- append(T, L, R).
        ",
    );
    assert_eq!(
        var_texts(&mut engine, "?- nrev([a,b,c], X).", "X"),
        ["[c,b,a]"]
    );
}

#[test]
fn unification_failure_is_plain_exhaustion() {
    let mut engine = engine_with("");
    assert_eq!(solution_count(&mut engine, "?- =(f(a), f(b))."), 0);
}

#[test]
fn ground_queries_yield_empty_binding_sets() {
    let mut engine = engine_with("p(a).");
    assert_eq!(empty_solutions(&mut engine, "?- p(a)."), [true]);
    assert_eq!(solution_count(&mut engine, "?- p(b)."), 0);
}

#[test]
fn true_succeeds_and_fail_fails() {
    let mut engine = engine_with("");
    assert_eq!(empty_solutions(&mut engine, "?- true."), [true]);
    assert_eq!(solution_count(&mut engine, "?- fail."), 0);
    assert_eq!(solution_count(&mut engine, "?- =(X, a), fail."), 0);
}

#[test]
fn undefined_predicates_fail_rather_than_error() {
    let mut engine = engine_with("");
    assert_eq!(solution_count(&mut engine, "?- nosuch(a)."), 0);
}

#[test]
fn self_unification_binds_nothing() {
    let mut engine = engine_with("");
    engine.set_query_text("?- =(X, X).").unwrap();
    let before = engine.heap_cells();
    let solutions: Vec<_> = engine.solutions().map(Result::unwrap).collect();
    assert_eq!(solutions.len(), 1);
    // X stays free and decodes to a fresh variable.
    assert_eq!(solutions[0].text("X"), Some("_G0"));
    assert_eq!(engine.heap_cells(), before + 1);
}

#[test]
fn co_referenced_variables_decode_together() {
    let mut engine = engine_with("same(Z, Z).");
    engine.set_query_text("?- same(X, Y).").unwrap();
    let solution = engine.solutions().next().unwrap().unwrap();
    // X and Y are unbound but aliased: one shared decode context gives
    // them the same fresh variable.
    assert_eq!(solution.text("X"), solution.text("Y"));
}

#[test]
fn ground_terms_round_trip_through_the_heap() {
    let mut engine = engine_with("");
    for ground in ["a", "f(a,b)", "f(g(a),[1,2],h(b,c))", "[[a],[b,[c]]]"] {
        let query = format!("?- =(X, {ground}).");
        assert_eq!(var_texts(&mut engine, &query, "X"), [ground]);
    }
}

#[test]
fn missing_occurs_check_builds_a_cyclic_term() {
    let mut engine = engine_with("");
    assert_eq!(
        var_texts(&mut engine, "?- =(X, f(X)).", "X"),
        ["f($cycle)"]
    );
}

#[test]
fn solution_order_is_clause_order_times_goal_order() {
    let mut engine = engine_with(
        "
        edge(a, b). edge(a, c). edge(b, d).
        conn(X, Y) :- edge(X, Y).
        conn(X, Z) :- edge(X, Y), conn(Y, Z).
        ",
    );
    assert_eq!(
        var_texts(&mut engine, "?- conn(a, X).", "X"),
        ["b", "c", "d"]
    );
}

#[test]
fn clauses_append_to_existing_predicates() {
    let mut engine = engine_with("p(a).");
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a"]);
    // Appending repatches the predicate's chain in place.
    engine.add_clause_text("p(b).").unwrap();
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a", "b"]);
    engine.add_clause_text("p(c).").unwrap();
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a", "b", "c"]);
}

#[test]
fn queries_can_be_rerun_and_replaced() {
    let mut engine = engine_with("p(a). p(b).");
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a", "b"]);
    assert_eq!(var_texts(&mut engine, "?- p(Y).", "Y"), ["a", "b"]);
    assert_eq!(solution_count(&mut engine, "?- p(c)."), 0);
}

#[test]
fn partial_lists_decode_with_tails() {
    let mut engine = engine_with(APPEND);
    engine.set_query_text("?- append([1], T, X).").unwrap();
    let solution = engine.solutions().next().unwrap().unwrap();
    // T never gets bound; X shares it as a tail.
    assert_eq!(solution.text("T"), Some("_G0"));
    assert_eq!(solution.text("X"), Some("[1|_G0]"));
}
