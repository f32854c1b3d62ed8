//! Data and instruction encodings for the Horn abstract machine.
//!
//! This crate defines everything the compiler and the machine agree on:
//! tagged heap cells, functor descriptors, interned name ids, the opcode
//! set with its byte-level encoder and decoder, and the disassembler that
//! renders code buffers as text listings.

pub mod cell;
pub mod disas;
pub mod inst;
pub mod interner;

pub use cell::{Cell, Functor, Tag, PAYLOAD_BITS, PAYLOAD_MASK, REG_COUNT};
pub use disas::Disassembler;
pub use inst::{
    decode_at, AddrMode, CodeOffset, DecodeError, Inst, Label, LabelUse, Opcode, Slot, Target,
    FAIL_ADDR,
};
pub use interner::{FunctorId, InternOverflow, Interner, VarId, WellKnown};
