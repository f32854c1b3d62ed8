//! Cut and disjunction behavior.

use crate::{engine_with, solution_count, var_texts};

#[test]
fn deep_cut_commits_to_the_first_answer() {
    // The classic max/3, with a ground comparison table standing in for
    // arithmetic (the engine defines none).
    let mut engine = engine_with(
        "
        ge(3, 1).
        max(X, Y, X) :- ge(X, Y), !.
        max(_, Y, Y).
        ",
    );
    assert_eq!(var_texts(&mut engine, "?- max(3, 1, M).", "M"), ["3"]);
    // Without a matching comparison the cut is never reached and the
    // default clause answers.
    assert_eq!(var_texts(&mut engine, "?- max(1, 3, M).", "M"), ["3"]);
}

#[test]
fn cut_prunes_alternatives_of_earlier_goals() {
    let mut engine = engine_with(
        "
        p(a). p(b). p(c).
        first(X) :- p(X), !.
        ",
    );
    assert_eq!(var_texts(&mut engine, "?- first(X).", "X"), ["a"]);
}

#[test]
fn neck_cut_keeps_later_clauses_out() {
    let mut engine = engine_with("r :- !. r.");
    assert_eq!(solution_count(&mut engine, "?- r."), 1);
}

#[test]
fn cut_leaves_outer_choice_points_alone() {
    // The cut inside q commits q's choice only; p still enumerates.
    let mut engine = engine_with(
        "
        p(a). p(b).
        q(x). q(y).
        pair(X, Y) :- p(X), first_q(Y).
        first_q(Y) :- q(Y), !.
        ",
    );
    engine.set_query_text("?- pair(X, Y).").unwrap();
    let pairs: Vec<(String, String)> = engine
        .solutions()
        .map(|s| {
            let s = s.unwrap();
            (
                s.text("X").unwrap().to_owned(),
                s.text("Y").unwrap().to_owned(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        [
            ("a".to_owned(), "x".to_owned()),
            ("b".to_owned(), "x".to_owned()),
        ]
    );
}

#[test]
fn disjunction_enumerates_both_branches() {
    let mut engine = engine_with("d(X) :- (=(X, a) ; =(X, b)).");
    assert_eq!(var_texts(&mut engine, "?- d(X).", "X"), ["a", "b"]);
}

#[test]
fn nested_disjunction_keeps_declaration_order() {
    let mut engine = engine_with("d(X) :- (=(X, a) ; =(X, b) ; =(X, c)).");
    assert_eq!(var_texts(&mut engine, "?- d(X).", "X"), ["a", "b", "c"]);
}

#[test]
fn disjunction_in_a_query_body() {
    let mut engine = engine_with("p(a).");
    assert_eq!(
        var_texts(&mut engine, "?- (p(X) ; =(X, z)).", "X"),
        ["a", "z"]
    );
}

#[test]
fn meta_call_runs_its_bound_goal() {
    let mut engine = engine_with("p(a). p(b).");
    assert_eq!(var_texts(&mut engine, "?- call(p(X)).", "X"), ["a", "b"]);
}
