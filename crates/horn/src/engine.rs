//! The engine facade.
//!
//! An [`Engine`] owns one compiler front end and one machine. `reset`
//! clears everything and reloads the built-in library; clauses and queries
//! go through the reader and compiler and are emitted into the machine's
//! code buffer; `solutions` drives resolution lazily, decoding each
//! success into a binding set. A fatal machine error poisons the engine
//! until the next reset.

use horn_bytecode::Interner;
use horn_compile::term::{Clause, Query, Term, TermPrinter};
use horn_compile::{compile_clause, compile_query, CompileCtx, CompileError, CompiledClause};
use horn_machine::{Machine, MachineError, Monitor, Resolution, TermReader};
use horn_reader::ParseError;

/// Text of the built-in library, loaded at reset.
const BUILTIN_LIBRARY: &str = include_str!("builtins.pl");

/// Errors surfaced through the engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error("engine disabled by a previous fatal error; reset() required")]
    Poisoned,
}

/// One variable of a solution.
#[derive(Clone, Debug)]
pub struct Binding {
    pub name: String,
    pub term: Term,
    text: String,
}

impl Binding {
    /// The bound term rendered in source syntax.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A solution: each non-anonymous free query variable mapped to its
/// decoded term. Co-referenced variables decode through one shared
/// context, so they surface as the same fresh variable.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    entries: Vec<Binding>,
}

impl Bindings {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.entries.iter().find(|b| b.name == name).map(|b| &b.term)
    }

    /// The rendered form of a variable's binding.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.text.as_str())
    }
}

/// The resolution engine.
pub struct Engine {
    interner: Interner,
    machine: Machine,
    ctx: CompileCtx,
    query_vars: Vec<horn_bytecode::VarId>,
    poisoned: bool,
}

impl Engine {
    /// A fresh engine with the built-in library loaded.
    pub fn new() -> Engine {
        let interner = Interner::new();
        let machine = Machine::new(interner.well_known());
        let mut engine = Engine {
            interner,
            machine,
            ctx: CompileCtx::new(),
            query_vars: Vec::new(),
            poisoned: false,
        };
        engine
            .reset()
            .expect("the embedded built-in library compiles");
        engine
    }

    /// Clear machine memory, code, and names, then reload the built-in
    /// library. Also the only way out of the poisoned state.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.interner = Interner::new();
        self.ctx = CompileCtx::new();
        self.query_vars.clear();
        self.machine.reset();
        self.poisoned = false;
        let library = horn_reader::parse_program(BUILTIN_LIBRARY, &mut self.interner)?;
        for clause in &library {
            let compiled = compile_clause(clause, &mut self.interner, &mut self.ctx)?;
            self.emit(&compiled)?;
        }
        log::debug!("reset: {} library clauses loaded", library.len());
        Ok(())
    }

    /// Attach a passive monitor to the machine.
    pub fn attach_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.machine.attach_monitor(monitor);
    }

    /// Set or clear the per-resolution step budget. Off by default.
    pub fn set_step_budget(&mut self, budget: Option<u64>) {
        self.machine.set_step_budget(budget);
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Current heap size in cells, registers included. Diagnostics only.
    pub fn heap_cells(&self) -> u32 {
        self.machine.heap_len()
    }

    fn check_usable(&self) -> Result<(), EngineError> {
        if self.poisoned {
            Err(EngineError::Poisoned)
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, clauses: &[CompiledClause]) -> Result<(), EngineError> {
        for clause in clauses {
            self.machine.emit_clause(clause.functor, &clause.code)?;
        }
        Ok(())
    }

    /// Compile one clause and append it to its predicate.
    pub fn add_clause(&mut self, clause: &Clause) -> Result<(), EngineError> {
        self.check_usable()?;
        let compiled = compile_clause(clause, &mut self.interner, &mut self.ctx)?;
        self.emit(&compiled)
    }

    /// Parse and add one clause.
    pub fn add_clause_text(&mut self, text: &str) -> Result<(), EngineError> {
        self.check_usable()?;
        let clause = horn_reader::parse_clause(text, &mut self.interner)?;
        self.add_clause(&clause)
    }

    /// Parse and add a whole program.
    pub fn load_program(&mut self, text: &str) -> Result<(), EngineError> {
        self.check_usable()?;
        let clauses = horn_reader::parse_program(text, &mut self.interner)?;
        for clause in &clauses {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Compile a query and make it current. Any previous enumeration is
    /// discarded.
    pub fn set_query(&mut self, query: &Query) -> Result<(), EngineError> {
        self.check_usable()?;
        let compiled = compile_query(query, &mut self.interner, &mut self.ctx)?;
        self.emit(&compiled.clauses)?;
        self.machine
            .prepare_query(compiled.functor, compiled.vars.len() as u8);
        self.query_vars = compiled.vars;
        Ok(())
    }

    /// Parse a query and make it current.
    pub fn set_query_text(&mut self, text: &str) -> Result<(), EngineError> {
        self.check_usable()?;
        let query = horn_reader::parse_query(text, &mut self.interner)?;
        self.set_query(&query)
    }

    /// Lazily enumerate solutions of the current query.
    pub fn solutions(&mut self) -> Solutions<'_> {
        Solutions {
            engine: self,
            done: false,
        }
    }

    fn next_solution(&mut self) -> Result<Option<Bindings>, EngineError> {
        self.check_usable()?;
        match self.machine.resolve_next() {
            Ok(Resolution::Solution) => match self.decode_solution() {
                Ok(bindings) => Ok(Some(bindings)),
                Err(e) => {
                    self.poisoned = true;
                    Err(e.into())
                }
            },
            Ok(Resolution::Exhausted) => Ok(None),
            Err(e) => {
                self.poisoned = true;
                Err(e.into())
            }
        }
    }

    fn decode_solution(&mut self) -> Result<Bindings, MachineError> {
        let roots = self.machine.query_roots().to_vec();
        let mut reader = TermReader::new(self.machine.store(), &mut self.interner);
        let terms = roots
            .iter()
            .map(|root| reader.read(*root))
            .collect::<Result<Vec<_>, _>>()?;
        drop(reader);

        let printer = TermPrinter::new(&self.interner);
        let entries = self
            .query_vars
            .iter()
            .zip(terms)
            .map(|(v, term)| Binding {
                name: self.interner.var_name(*v).to_owned(),
                text: printer.print(&term),
                term,
            })
            .collect();
        Ok(Bindings { entries })
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

/// Lazy, cancellable solution sequence. Dropping it abandons enumeration;
/// nothing outlives the engine.
pub struct Solutions<'a> {
    engine: &'a mut Engine,
    done: bool,
}

impl Iterator for Solutions<'_> {
    type Item = Result<Bindings, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.engine.next_solution() {
            Ok(Some(bindings)) => Some(Ok(bindings)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
