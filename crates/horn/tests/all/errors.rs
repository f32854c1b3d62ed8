//! Error surfacing, poisoning, and recovery.

use crate::{engine_with, first_error, var_texts};
use horn::{EngineError, MachineError};

#[test]
fn parse_errors_surface_without_touching_the_machine() {
    let mut engine = engine_with("");
    let err = engine.add_clause_text("p(").unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    // The failed add left the engine fully usable.
    engine.add_clause_text("p(a).").unwrap();
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a"]);
}

#[test]
fn unbound_meta_calls_are_compile_errors() {
    let mut engine = engine_with("");
    let err = engine.add_clause_text("p(X) :- call(X).").unwrap_err();
    assert!(matches!(err, EngineError::Compile(_)));
}

#[test]
fn control_constructs_cannot_be_redefined() {
    let mut engine = engine_with("");
    let err = engine.add_clause_text("','(a, b).").unwrap_err();
    assert!(matches!(err, EngineError::Compile(_)));
}

#[test]
fn step_budget_poisons_until_reset() {
    let mut engine = engine_with("loop :- loop.");
    engine.set_step_budget(Some(200));
    let err = first_error(&mut engine, "?- loop.");
    assert!(matches!(
        err,
        EngineError::Machine(MachineError::BudgetExhausted { .. })
    ));

    // Fatal outcomes disable the engine until reset().
    assert!(matches!(
        engine.add_clause_text("p(a)."),
        Err(EngineError::Poisoned)
    ));
    engine.reset().unwrap();
    engine.set_step_budget(None);
    engine.add_clause_text("p(a).").unwrap();
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a"]);
}

#[test]
fn querying_without_set_query_is_an_error() {
    let mut engine = engine_with("");
    let err = engine
        .solutions()
        .next()
        .expect("an error item")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Machine(MachineError::NoQuery)
    ));
    // NoQuery poisons like any other machine error; reset recovers.
    engine.reset().unwrap();
    engine.add_clause_text("p(a).").unwrap();
    assert_eq!(var_texts(&mut engine, "?- p(X).", "X"), ["a"]);
}
