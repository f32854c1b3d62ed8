//! The passive debug surface.
//!
//! A monitor attaches to a machine and receives callbacks with read-only
//! snapshots: reset with the memory layout, code updates with the touched
//! range, and execute/step with the register file. Monitors observe; they
//! are never handed write access.

use horn_bytecode::CodeOffset;

/// Snapshot of the machine registers at a callback point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterView {
    /// Instruction pointer.
    pub ip: CodeOffset,
    /// Continuation pointer.
    pub cp: CodeOffset,
    /// Heap top.
    pub hp: u32,
    /// Heap top at the newest choice point.
    pub hbp: u32,
    /// Structure-argument pointer (read mode).
    pub sp: u32,
    /// Current environment frame, if any.
    pub ep: Option<u32>,
    /// Choice-point stack depth.
    pub bp: u32,
    /// Cut barrier recorded at the current call.
    pub b0: u32,
    /// Trail top.
    pub trp: u32,
    /// Pushdown-list top.
    pub up: u32,
    /// Live argument-register count.
    pub num_args: u8,
    /// Structure matching is emitting rather than reading.
    pub write_mode: bool,
}

/// Fixed layout facts, reported at reset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryLayout {
    pub reg_count: u8,
    /// First heap cell past the register file.
    pub heap_base: u32,
    /// Start of the environment-slot address window.
    pub slot_base: u32,
    pub code_len: u32,
}

/// Receiver for machine events. All methods default to no-ops so a monitor
/// implements only what it watches.
pub trait Monitor {
    fn on_reset(&mut self, layout: &MemoryLayout) {
        let _ = layout;
    }

    fn on_code_update(&mut self, start: CodeOffset, len: u32) {
        let _ = (start, len);
    }

    /// A `resolve-next` is about to run.
    fn on_execute(&mut self, regs: &RegisterView) {
        let _ = regs;
    }

    /// One instruction is about to be dispatched.
    fn on_step(&mut self, regs: &RegisterView) {
        let _ = regs;
    }
}
