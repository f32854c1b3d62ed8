//! Horn is a Prolog-style resolution engine built on the Warren Abstract
//! Machine: a register-based bytecode VM over a tagged-cell heap, fed by a
//! compiler that lowers Horn clauses to its instruction set.
//!
//! ```
//! use horn::Engine;
//!
//! let mut engine = Engine::new();
//! engine.load_program("p(a). p(b).").unwrap();
//! engine.set_query_text("?- p(X).").unwrap();
//! let names: Vec<String> = engine
//!     .solutions()
//!     .map(|s| s.unwrap().text("X").unwrap().to_owned())
//!     .collect();
//! assert_eq!(names, ["a", "b"]);
//! ```

mod engine;

pub use engine::{Binding, Bindings, Engine, EngineError, Solutions};

pub use horn_bytecode::{Disassembler, Interner};
pub use horn_compile::term::{Clause, Query, Term, TermPrinter};
pub use horn_compile::CompileError;
pub use horn_machine::{
    CycleBehavior, DecodeSettings, MachineError, MemoryLayout, Monitor, RegisterView,
};
pub use horn_reader::ParseError;
