//! The code buffer, call table, label patching, and indexing hash.
//!
//! Bytecode is appended to a linear buffer addressed by byte offset. The
//! call table maps functor ids to entry points. Clause chains are built
//! incrementally: the first clause of a predicate is emitted behind a
//! `try_me_else <fail>` header that calls skip while the predicate is
//! deterministic; appending a clause patches the previous chain tail in
//! place (`trust_me` is encoded as wide as `retry_me_else` for exactly this
//! reason) and repoints the entry at the header.
//!
//! An optional open-addressing hash index lives inside the same buffer:
//! 8-byte `(key, addr)` entries, linear probing, key 0 marking empty slots.
//! The `switch_on_constant`/`switch_on_structure` instructions consult it.

use crate::MachineError;
use horn_bytecode::{CodeOffset, Functor, FunctorId, Inst, Label, LabelUse, Opcode, Target};
use rustc_hash::FxHashMap;

/// Keep offsets clear of the fail/halt sentinel values.
const CODE_LIMIT: usize = 0xffff_0000;

/// A predicate's entry: where calls land and how much code it owns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallPoint {
    pub entry: CodeOffset,
    pub len: u32,
}

struct Chain {
    /// Offset of the `try_me_else` header in front of the first clause.
    header: CodeOffset,
    /// Offset of the patchable chain-tail instruction of the last clause.
    patch_at: CodeOffset,
    clauses: u32,
}

/// The append-only code space and its side tables.
pub struct CodeBuffer {
    bytes: Vec<u8>,
    call_table: FxHashMap<FunctorId, CallPoint>,
    chains: FxHashMap<FunctorId, Chain>,
    labels: Vec<Option<CodeOffset>>,
    pending: Vec<LabelUse>,
}

impl CodeBuffer {
    pub fn new() -> CodeBuffer {
        CodeBuffer {
            bytes: Vec::new(),
            call_table: FxHashMap::default(),
            chains: FxHashMap::default(),
            labels: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.call_table.clear();
        self.chains.clear();
        self.labels.clear();
        self.pending.clear();
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn call_point(&self, f: FunctorId) -> Option<CallPoint> {
        self.call_table.get(&f).copied()
    }

    /// Register a predicate entry directly, bypassing chain management.
    pub fn define(&mut self, f: FunctorId, point: CallPoint) {
        self.call_table.insert(f, point);
    }

    /// Reserve a forward label.
    pub fn reserve_label(&mut self) -> Label {
        let label = Label::from_u32(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Bind a label to an offset and patch every recorded use.
    pub fn bind_label(&mut self, label: Label, at: CodeOffset) {
        self.labels[label.as_u32() as usize] = Some(at);
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].label == label {
                let use_ = self.pending.swap_remove(i);
                self.patch_addr(use_.at, at);
            } else {
                i += 1;
            }
        }
    }

    /// Labels that have uses but no address yet.
    pub fn unresolved_labels(&self) -> usize {
        self.pending.len()
    }

    fn patch_addr(&mut self, at: CodeOffset, addr: CodeOffset) {
        self.bytes[at as usize..at as usize + 4].copy_from_slice(&addr.to_le_bytes());
    }

    fn check_capacity(&self) -> Result<(), MachineError> {
        if self.bytes.len() > CODE_LIMIT {
            return Err(MachineError::Exhausted {
                region: "code buffer",
            });
        }
        Ok(())
    }

    /// Append raw instructions without touching the call table. Label
    /// operands resolve against this buffer's label space.
    pub fn emit_raw(&mut self, insts: &[Inst]) -> Result<CodeOffset, MachineError> {
        let start = self.len();
        let mut fixups = Vec::new();
        for inst in insts {
            inst.encode(&mut self.bytes, &mut fixups);
        }
        for use_ in fixups {
            match self.labels.get(use_.label.as_u32() as usize) {
                Some(Some(addr)) => {
                    let addr = *addr;
                    self.patch_addr(use_.at, addr);
                }
                Some(None) => self.pending.push(use_),
                None => return Err(MachineError::UnboundLabel(use_.label)),
            }
        }
        self.check_capacity()?;
        Ok(start)
    }

    /// Append one clause of predicate `f`, wiring it into the predicate's
    /// choice chain. Returns the start offset and length of the emitted
    /// block, for code-update notifications.
    pub fn emit_clause(
        &mut self,
        f: Functor,
        insts: &[Inst],
    ) -> Result<(CodeOffset, u32), MachineError> {
        let start = self.len();
        match self.chains.get(&f.id) {
            None => {
                // First clause: a header that calls skip until a second
                // clause arrives and repoints the entry here.
                self.emit_raw(&[Inst::TryMeElse { alt: Target::Fail }])?;
                let entry = self.len();
                self.emit_raw(insts)?;
                let len = self.len() - start;
                self.call_table.insert(f.id, CallPoint { entry, len });
                self.chains.insert(
                    f.id,
                    Chain {
                        header: start,
                        patch_at: start,
                        clauses: 1,
                    },
                );
                log::debug!("defined {f:?} at {entry:#x}");
                Ok((start, len))
            }
            Some(_) => {
                self.emit_raw(&[Inst::TrustMe])?;
                self.emit_raw(insts)?;
                let len = self.len() - start;

                let chain = self.chains.get_mut(&f.id).expect("chain exists");
                let (header, patch_at, clauses) = (chain.header, chain.patch_at, chain.clauses);
                chain.patch_at = start;
                chain.clauses += 1;

                if clauses == 1 {
                    // Activate the header and point its alternative here.
                    self.patch_addr(header + 1, start);
                    let point = self.call_table.get_mut(&f.id).expect("defined");
                    point.entry = header;
                    point.len += len;
                } else {
                    // Rewrite the previous tail: trust_me -> retry_me_else.
                    self.bytes[patch_at as usize] = Opcode::RetryMeElse as u8;
                    self.patch_addr(patch_at + 1, start);
                    let point = self.call_table.get_mut(&f.id).expect("defined");
                    point.len += len;
                }
                log::debug!("appended clause {} to {f:?}", clauses + 1);
                Ok((start, len))
            }
        }
    }

    /// Reserve a zero-filled hash index of `slots` 8-byte entries inside
    /// the buffer, returning its offset.
    pub fn alloc_index(&mut self, slots: u32) -> Result<CodeOffset, MachineError> {
        let at = self.len();
        self.bytes.resize(self.bytes.len() + slots as usize * 8, 0);
        self.check_capacity()?;
        Ok(at)
    }

    fn index_entry(&self, table: CodeOffset, slot: u32) -> (u32, CodeOffset) {
        let at = table as usize + slot as usize * 8;
        let key = u32::from_le_bytes(self.bytes[at..at + 4].try_into().unwrap());
        let addr = u32::from_le_bytes(self.bytes[at + 4..at + 8].try_into().unwrap());
        (key, addr)
    }

    /// Starting probe position. Functor ids hash by identity, spread with
    /// a multiplicative mix.
    fn index_home(key: u32, slots: u32) -> u32 {
        key.wrapping_mul(0x9e37_79b9) % slots
    }

    /// Insert `(key, addr)`; keys are never removed. Key 0 is reserved for
    /// empty slots.
    pub fn index_put(
        &mut self,
        table: CodeOffset,
        slots: u32,
        key: u32,
        addr: CodeOffset,
    ) -> Result<(), MachineError> {
        debug_assert_ne!(key, 0, "key 0 marks empty slots");
        let mut slot = Self::index_home(key, slots);
        for _ in 0..slots {
            let (k, _) = self.index_entry(table, slot);
            if k == 0 || k == key {
                let at = table as usize + slot as usize * 8;
                self.bytes[at..at + 4].copy_from_slice(&key.to_le_bytes());
                self.bytes[at + 4..at + 8].copy_from_slice(&addr.to_le_bytes());
                return Ok(());
            }
            slot = (slot + 1) % slots;
        }
        Err(MachineError::Exhausted {
            region: "indexing table",
        })
    }

    /// Look up `key`; 0 means not found.
    pub fn index_get(&self, table: CodeOffset, slots: u32, key: u32) -> CodeOffset {
        let mut slot = Self::index_home(key, slots);
        for _ in 0..slots {
            let (k, addr) = self.index_entry(table, slot);
            if k == key {
                return addr;
            }
            if k == 0 {
                return 0;
            }
            slot = (slot + 1) % slots;
        }
        0
    }
}

impl Default for CodeBuffer {
    fn default() -> CodeBuffer {
        CodeBuffer::new()
    }
}
