//! The tagged data arenas.
//!
//! One 24-bit address space covers every bindable cell. The register file
//! is the prefix of the heap array, so registers are ordinary cell
//! addresses; the heap proper grows from [`HEAP_BASE`]; environment slots
//! live in their own arena mapped in from [`SLOT_BASE`] upward. Slots never
//! hold self-references (fresh variables are always allocated on the heap),
//! so binding and trailing only ever touch heap addresses and truncating
//! either arena cannot dangle.

use crate::MachineError;
use horn_bytecode::{Cell, Tag, REG_COUNT};

/// First heap cell after the register file.
pub const HEAP_BASE: u32 = REG_COUNT as u32;

/// Start of the environment-slot address window. Also the heap size limit.
pub const SLOT_BASE: u32 = 1 << 23;

/// Heap plus environment-slot cells under one address space.
pub struct Store {
    heap: Vec<Cell>,
    slots: Vec<Cell>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            heap: vec![Cell::empty(); HEAP_BASE as usize],
            slots: Vec::new(),
        }
    }

    /// Drop everything except the (cleared) register file.
    pub fn reset(&mut self) {
        self.heap.clear();
        self.heap.resize(HEAP_BASE as usize, Cell::empty());
        self.slots.clear();
    }

    /// The heap top register `HP`.
    pub fn hp(&self) -> u32 {
        self.heap.len() as u32
    }

    pub fn slots_len(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn get(&self, addr: u32) -> Result<Cell, MachineError> {
        if addr >= SLOT_BASE {
            self.slots
                .get((addr - SLOT_BASE) as usize)
                .copied()
                .ok_or(MachineError::OutOfRange {
                    region: "environment slots",
                    addr,
                })
        } else {
            self.heap
                .get(addr as usize)
                .copied()
                .ok_or(MachineError::OutOfRange {
                    region: "heap",
                    addr,
                })
        }
    }

    pub fn set(&mut self, addr: u32, cell: Cell) -> Result<(), MachineError> {
        let slot = if addr >= SLOT_BASE {
            self.slots.get_mut((addr - SLOT_BASE) as usize)
        } else {
            self.heap.get_mut(addr as usize)
        };
        match slot {
            Some(s) => {
                *s = cell;
                Ok(())
            }
            None => Err(MachineError::OutOfRange {
                region: if addr >= SLOT_BASE {
                    "environment slots"
                } else {
                    "heap"
                },
                addr,
            }),
        }
    }

    /// Read an argument/temporary register.
    pub fn reg(&self, i: u8) -> Result<Cell, MachineError> {
        if i >= REG_COUNT {
            return Err(MachineError::OutOfRange {
                region: "registers",
                addr: i as u32,
            });
        }
        Ok(self.heap[i as usize])
    }

    /// Write an argument/temporary register.
    pub fn set_reg(&mut self, i: u8, cell: Cell) -> Result<(), MachineError> {
        if i >= REG_COUNT {
            return Err(MachineError::OutOfRange {
                region: "registers",
                addr: i as u32,
            });
        }
        self.heap[i as usize] = cell;
        Ok(())
    }

    /// Push a cell onto the heap, returning its address.
    pub fn push(&mut self, cell: Cell) -> Result<u32, MachineError> {
        let addr = self.hp();
        if addr >= SLOT_BASE {
            return Err(MachineError::Exhausted { region: "heap" });
        }
        self.heap.push(cell);
        Ok(addr)
    }

    /// Push a fresh unbound variable cell.
    pub fn push_unbound(&mut self) -> Result<u32, MachineError> {
        let addr = self.hp();
        self.push(Cell::reference(addr))
    }

    /// Grow the slot arena by `n` cells, returning the base index.
    pub fn grow_slots(&mut self, n: u8) -> Result<u32, MachineError> {
        let base = self.slots.len() as u32;
        if base + n as u32 > SLOT_BASE {
            return Err(MachineError::Exhausted {
                region: "environment slots",
            });
        }
        self.slots
            .resize(self.slots.len() + n as usize, Cell::empty());
        Ok(base)
    }

    pub fn truncate_heap(&mut self, hp: u32) {
        debug_assert!(hp >= HEAP_BASE);
        self.heap.truncate(hp as usize);
    }

    pub fn truncate_slots(&mut self, len: u32) {
        self.slots.truncate(len as usize);
    }

    /// Follow a reference chain to its root. The returned cell is never a
    /// forwarding reference: it is an unbound self-reference, a structure,
    /// a constant, or a list cell.
    pub fn deref(&self, mut addr: u32) -> Result<(u32, Cell), MachineError> {
        let mut hops = 0u32;
        loop {
            let cell = self.get(addr)?;
            match cell.tag() {
                None => {
                    return Err(MachineError::BadTag {
                        tag: cell.raw_tag(),
                        addr,
                    })
                }
                Some(Tag::Ref) if cell.payload() != addr => {
                    hops += 1;
                    if hops > self.heap.len() as u32 + 1 {
                        return Err(MachineError::DerefCycle { addr });
                    }
                    addr = cell.payload();
                }
                Some(_) => return Ok((addr, cell)),
            }
        }
    }
}

impl Default for Store {
    fn default() -> Store {
        Store::new()
    }
}
