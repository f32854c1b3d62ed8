//! The Horn abstract machine.
//!
//! A register-based bytecode interpreter over a tagged-cell heap: the data
//! arenas ([`store`]), the append-only code buffer with its call table and
//! indexing hash ([`code`]), the interpreter core ([`machine`]), the heap
//! decoder reconstructing abstract terms ([`decode`]), and the passive
//! debug surface ([`monitor`]).

pub mod code;
pub mod decode;
pub mod machine;
pub mod monitor;
pub mod store;

pub use code::{CallPoint, CodeBuffer};
pub use decode::{CycleBehavior, DecodeSettings, TermReader};
pub use machine::{Machine, Resolution};
pub use monitor::{MemoryLayout, Monitor, RegisterView};
pub use store::{Store, HEAP_BASE, SLOT_BASE};

use horn_bytecode::{CodeOffset, DecodeError, InternOverflow, Label};

/// Fatal machine conditions. Any of these marks the owning engine unusable
/// until reset.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("invalid cell tag {tag:#04x} at address {addr:#x}")]
    BadTag { tag: u8, addr: u32 },
    #[error("address {addr:#x} out of range for {region}")]
    OutOfRange { region: &'static str, addr: u32 },
    #[error("{region} exhausted")]
    Exhausted { region: &'static str },
    #[error("reference chain does not terminate at address {addr:#x}")]
    DerefCycle { addr: u32 },
    #[error("no environment frame is active")]
    MissingEnvironment,
    #[error("no query has been set")]
    NoQuery,
    #[error("step budget exhausted after {steps} steps")]
    BudgetExhausted { steps: u64 },
    #[error("cyclic term reached the decode limit")]
    CyclicTerm,
    #[error("code offset {at:#x} does not begin an instruction: {source}")]
    Code {
        at: CodeOffset,
        source: DecodeError,
    },
    #[error("{0} was never bound")]
    UnboundLabel(Label),
    #[error(transparent)]
    Intern(#[from] InternOverflow),
}
