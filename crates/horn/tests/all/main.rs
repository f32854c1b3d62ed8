//! Engine-level tests.

mod control;
mod errors;
mod listings;
mod monitor;
mod scenarios;

use horn::{Engine, EngineError};

/// An engine with `program` loaded on top of the built-in library.
pub fn engine_with(program: &str) -> Engine {
    let _ = env_logger::try_init();
    let mut engine = Engine::new();
    engine.load_program(program).unwrap();
    engine
}

/// Run `query` and collect the rendered binding of `var` per solution.
pub fn var_texts(engine: &mut Engine, query: &str, var: &str) -> Vec<String> {
    engine.set_query_text(query).unwrap();
    engine
        .solutions()
        .map(|solution| solution.unwrap().text(var).unwrap().to_owned())
        .collect()
}

/// Run `query` and count its solutions.
pub fn solution_count(engine: &mut Engine, query: &str) -> usize {
    engine.set_query_text(query).unwrap();
    engine.solutions().map(Result::unwrap).count()
}

/// Run `query`, expecting it to neither error nor bind anything.
pub fn empty_solutions(engine: &mut Engine, query: &str) -> Vec<bool> {
    engine.set_query_text(query).unwrap();
    engine
        .solutions()
        .map(|solution| solution.unwrap().is_empty())
        .collect()
}

pub fn first_error(engine: &mut Engine, query: &str) -> EngineError {
    engine.set_query_text(query).unwrap();
    engine
        .solutions()
        .find_map(Result::err)
        .expect("query should fail")
}
