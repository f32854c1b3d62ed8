//! The compilation symbol table.
//!
//! A two-level mapping from symbol keys to named attributes, used by the
//! analysis passes to attach facts to syntax nodes: occurrence counts,
//! argument-position flags, register allocations. Each clause compilation
//! gets a fresh table; nothing here outlives a single compile.

use horn_bytecode::{AddrMode, FunctorId, Slot, VarId};
use rustc_hash::FxHashMap;

/// What a table row is keyed by.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    Var(VarId),
    Functor(FunctorId),
}

/// Attribute names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attr {
    /// Number of occurrences in the clause.
    Occurrences,
    /// The symbol appears only in non-argument (nested) positions.
    NonArgOnly,
    /// Index of the last body call in which a variable occurs.
    LastCall,
    /// Register allocation, encoded as `mode << 8 | slot`.
    Allocation,
}

/// Encode an allocation attribute value.
pub fn encode_alloc(slot: Slot) -> i32 {
    ((slot.mode as i32) << 8) | slot.index as i32
}

/// Decode an allocation attribute value.
pub fn decode_alloc(value: i32) -> Slot {
    let mode = if value >> 8 == AddrMode::Stack as i32 {
        AddrMode::Stack
    } else {
        AddrMode::Reg
    };
    Slot {
        mode,
        index: (value & 0xff) as u8,
    }
}

/// Per-compilation attribute storage.
#[derive(Default)]
pub struct SymbolTable {
    rows: FxHashMap<SymbolKey, FxHashMap<Attr, i32>>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn set(&mut self, key: SymbolKey, attr: Attr, value: i32) {
        self.rows.entry(key).or_default().insert(attr, value);
    }

    pub fn get(&self, key: SymbolKey, attr: Attr) -> Option<i32> {
        self.rows.get(&key)?.get(&attr).copied()
    }

    /// Increment a counter attribute, starting from zero.
    pub fn bump(&mut self, key: SymbolKey, attr: Attr) -> i32 {
        let slot = self.rows.entry(key).or_default().entry(attr).or_insert(0);
        *slot += 1;
        *slot
    }

    /// Read a flag attribute; unset means false.
    pub fn flag(&self, key: SymbolKey, attr: Attr) -> bool {
        self.get(key, attr).unwrap_or(0) != 0
    }

    /// The allocation of a variable, if one has been assigned.
    pub fn allocation(&self, var: VarId) -> Option<Slot> {
        self.get(SymbolKey::Var(var), Attr::Allocation)
            .map(decode_alloc)
    }

    pub fn set_allocation(&mut self, var: VarId, slot: Slot) {
        self.set(SymbolKey::Var(var), Attr::Allocation, encode_alloc(slot));
    }
}
