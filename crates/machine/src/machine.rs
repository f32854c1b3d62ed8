//! The interpreter core.
//!
//! Fetch, decode, dispatch over the code buffer, with the classic
//! primitives underneath: dereference, age-directed binding with
//! conditional trailing, pushdown-list unification, choice points and
//! backtracking, environment frames with choice-point protection, and the
//! cut. A machine owns all of its arenas; independent machines share
//! nothing.

use crate::code::CodeBuffer;
use crate::monitor::{MemoryLayout, Monitor, RegisterView};
use crate::store::{Store, HEAP_BASE, SLOT_BASE};
use crate::MachineError;
use horn_bytecode::{
    decode_at, AddrMode, Cell, CodeOffset, Functor, FunctorId, Inst, Slot, Tag, WellKnown,
    FAIL_ADDR, REG_COUNT,
};
use smallvec::SmallVec;

/// Continuation value meaning "the query's caller": reaching it is success.
pub const HALT_ADDR: CodeOffset = 0xffff_fffe;

/// An environment frame. Slots live in the store's slot arena so they are
/// addressable by unification.
#[derive(Copy, Clone, Debug)]
struct Frame {
    cp: CodeOffset,
    ce: Option<u32>,
    slot_base: u32,
    n: u8,
}

/// A saved machine state allowing retry of an alternative clause.
#[derive(Clone, Debug)]
struct ChoicePoint {
    args: SmallVec<[Cell; 8]>,
    ep: Option<u32>,
    cp: CodeOffset,
    next_alt: CodeOffset,
    trail_len: u32,
    heap_len: u32,
    frames_len: u32,
    slots_len: u32,
    b0: u32,
}

/// Outcome of a `resolve_next` call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The machine stopped at a success; bindings are readable until the
    /// next `resolve_next`.
    Solution,
    /// Every alternative is spent.
    Exhausted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RunState {
    /// No query prepared.
    Idle,
    /// Query prepared, not yet started.
    Ready,
    /// Stopped at a solution; machine state is live.
    Suspended,
    /// Enumeration finished.
    Done,
}

#[derive(Copy, Clone, Debug)]
struct QueryInfo {
    functor: Functor,
    nvars: u8,
}

enum Flow {
    Continue,
    Fail,
}

/// The Horn abstract machine.
pub struct Machine {
    store: Store,
    code: CodeBuffer,
    frames: Vec<Frame>,
    choices: Vec<ChoicePoint>,
    trail: Vec<u32>,
    pdl: Vec<u32>,

    ip: CodeOffset,
    cp: CodeOffset,
    hbp: u32,
    sp: u32,
    ep: Option<u32>,
    b0: u32,
    na: u8,
    write_mode: bool,

    query: Option<QueryInfo>,
    state: RunState,
    roots: Vec<u32>,

    /// Optional instruction budget per `resolve_next`; `None` disables it.
    budget: Option<u64>,
    steps: u64,

    monitor: Option<Box<dyn Monitor>>,
    nil: FunctorId,
}

impl Machine {
    pub fn new(wk: &WellKnown) -> Machine {
        Machine {
            store: Store::new(),
            code: CodeBuffer::new(),
            frames: Vec::new(),
            choices: Vec::new(),
            trail: Vec::new(),
            pdl: Vec::new(),
            ip: HALT_ADDR,
            cp: HALT_ADDR,
            hbp: HEAP_BASE,
            sp: 0,
            ep: None,
            b0: 0,
            na: 0,
            write_mode: false,
            query: None,
            state: RunState::Idle,
            roots: Vec::new(),
            budget: None,
            steps: 0,
            monitor: None,
            nil: wk.nil,
        }
    }

    /// Attach a passive monitor. At most one is held.
    pub fn attach_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitor = Some(monitor);
    }

    /// Clear all memory and code.
    pub fn reset(&mut self) {
        self.store.reset();
        self.code.reset();
        self.frames.clear();
        self.choices.clear();
        self.trail.clear();
        self.pdl.clear();
        self.ip = HALT_ADDR;
        self.cp = HALT_ADDR;
        self.hbp = HEAP_BASE;
        self.sp = 0;
        self.ep = None;
        self.b0 = 0;
        self.na = 0;
        self.write_mode = false;
        self.query = None;
        self.state = RunState::Idle;
        self.roots.clear();
        self.steps = 0;
        let layout = self.memory_layout();
        if let Some(m) = self.monitor.as_mut() {
            m.on_reset(&layout);
        }
    }

    /// Set (or clear) the per-`resolve_next` instruction budget. Disabled
    /// by default.
    pub fn set_step_budget(&mut self, budget: Option<u64>) {
        self.budget = budget;
    }

    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    pub fn code_mut(&mut self) -> &mut CodeBuffer {
        &mut self.code
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Heap addresses of the current query's variable roots.
    pub fn query_roots(&self) -> &[u32] {
        &self.roots
    }

    pub fn heap_len(&self) -> u32 {
        self.store.hp()
    }

    pub fn choice_len(&self) -> u32 {
        self.choices.len() as u32
    }

    pub fn trail_len(&self) -> u32 {
        self.trail.len() as u32
    }

    pub fn register_view(&self) -> RegisterView {
        RegisterView {
            ip: self.ip,
            cp: self.cp,
            hp: self.store.hp(),
            hbp: self.hbp,
            sp: self.sp,
            ep: self.ep,
            bp: self.choices.len() as u32,
            b0: self.b0,
            trp: self.trail.len() as u32,
            up: self.pdl.len() as u32,
            num_args: self.na,
            write_mode: self.write_mode,
        }
    }

    pub fn memory_layout(&self) -> MemoryLayout {
        MemoryLayout {
            reg_count: REG_COUNT,
            heap_base: HEAP_BASE,
            slot_base: SLOT_BASE,
            code_len: self.code.len(),
        }
    }

    /// Emit a compiled clause and notify any monitor of the code update.
    pub fn emit_clause(&mut self, f: Functor, insts: &[Inst]) -> Result<CodeOffset, MachineError> {
        let (start, len) = self.code.emit_clause(f, insts)?;
        if let Some(m) = self.monitor.as_mut() {
            m.on_code_update(start, len);
        }
        Ok(start)
    }

    /// Make `functor` the current query. Run state, heap, stacks and trail
    /// are cleared; program code stays.
    pub fn prepare_query(&mut self, functor: Functor, nvars: u8) {
        self.store.reset();
        self.frames.clear();
        self.choices.clear();
        self.trail.clear();
        self.pdl.clear();
        self.roots.clear();
        self.ep = None;
        self.b0 = 0;
        self.hbp = HEAP_BASE;
        self.write_mode = false;
        self.query = Some(QueryInfo { functor, nvars });
        self.state = RunState::Ready;
    }

    /// Run until the next solution or final failure. Between calls the
    /// machine's full state persists; the next call resumes by forcing a
    /// backtrack into the remaining alternatives.
    pub fn resolve_next(&mut self) -> Result<Resolution, MachineError> {
        match self.state {
            RunState::Idle => return Err(MachineError::NoQuery),
            RunState::Done => return Ok(Resolution::Exhausted),
            RunState::Ready => self.start()?,
            RunState::Suspended => {
                if !self.backtrack() {
                    self.state = RunState::Done;
                    return Ok(Resolution::Exhausted);
                }
            }
        }
        self.steps = 0;
        if self.monitor.is_some() {
            let view = self.register_view();
            if let Some(m) = self.monitor.as_mut() {
                m.on_execute(&view);
            }
        }
        self.run()
    }

    fn start(&mut self) -> Result<(), MachineError> {
        let q = self.query.ok_or(MachineError::NoQuery)?;
        // Seed one root cell per query variable below every future choice
        // point, so binding roots survive all backtracking.
        for i in 0..q.nvars {
            let h = self.store.push_unbound()?;
            self.store.set_reg(i, Cell::reference(h))?;
            self.roots.push(h);
        }
        self.na = q.nvars;
        self.cp = HALT_ADDR;
        self.b0 = 0;
        let point = self
            .code
            .call_point(q.functor.id)
            .ok_or(MachineError::NoQuery)?;
        self.ip = point.entry;
        Ok(())
    }

    fn run(&mut self) -> Result<Resolution, MachineError> {
        loop {
            if self.ip == HALT_ADDR {
                self.state = RunState::Suspended;
                return Ok(Resolution::Solution);
            }
            if let Some(budget) = self.budget {
                if self.steps >= budget {
                    return Err(MachineError::BudgetExhausted { steps: self.steps });
                }
            }
            self.steps += 1;
            if self.monitor.is_some() {
                let view = self.register_view();
                if let Some(m) = self.monitor.as_mut() {
                    m.on_step(&view);
                }
            }
            match self.step()? {
                Flow::Continue => {}
                Flow::Fail => {
                    if !self.backtrack() {
                        self.state = RunState::Done;
                        return Ok(Resolution::Exhausted);
                    }
                }
            }
        }
    }

    /// On failure, resume at the newest alternative. Choice points whose
    /// alternative is the fail sentinel are discarded; a deeper retry
    /// unwinds their bindings along with its own.
    fn backtrack(&mut self) -> bool {
        loop {
            match self.choices.last() {
                None => return false,
                Some(cp) if cp.next_alt == FAIL_ADDR => {
                    self.choices.pop();
                    self.hbp = self.choices.last().map_or(HEAP_BASE, |c| c.heap_len);
                }
                Some(cp) => {
                    self.ip = cp.next_alt;
                    return true;
                }
            }
        }
    }

    fn frame(&self) -> Result<&Frame, MachineError> {
        match self.ep {
            Some(e) => Ok(&self.frames[e as usize]),
            None => Err(MachineError::MissingEnvironment),
        }
    }

    /// The flat address of a variable operand.
    fn slot_addr(&self, v: Slot) -> Result<u32, MachineError> {
        match v.mode {
            AddrMode::Reg => {
                if v.index >= REG_COUNT {
                    return Err(MachineError::OutOfRange {
                        region: "registers",
                        addr: v.index as u32,
                    });
                }
                Ok(v.index as u32)
            }
            AddrMode::Stack => {
                let frame = self.frame()?;
                if v.index >= frame.n {
                    return Err(MachineError::OutOfRange {
                        region: "environment slots",
                        addr: v.index as u32,
                    });
                }
                Ok(SLOT_BASE + frame.slot_base + v.index as u32)
            }
        }
    }

    fn read_slot(&self, v: Slot) -> Result<Cell, MachineError> {
        let addr = self.slot_addr(v)?;
        self.store.get(addr)
    }

    fn write_slot(&mut self, v: Slot, cell: Cell) -> Result<(), MachineError> {
        let addr = self.slot_addr(v)?;
        self.store.set(addr, cell)
    }

    fn trail_if_conditional(&mut self, addr: u32) {
        // Cells younger than the newest choice point's heap mark are
        // discarded wholesale on backtracking; only older ones need undo.
        if addr < self.hbp {
            self.trail.push(addr);
        }
    }

    /// Overwrite one of two dereferenced cells with a reference to the
    /// other. The younger cell is chosen so references always point into
    /// space that outlives any heap truncation. A target inside the
    /// register file is copied by value instead: registers are restored
    /// and overwritten freely, so no heap cell may reference one.
    fn bind(&mut self, a1: u32, c1: Cell, a2: u32, c2: Cell) -> Result<(), MachineError> {
        let u1 = c1.is_unbound_at(a1);
        let u2 = c2.is_unbound_at(a2);
        let (from, to, to_cell) = if u1 && u2 {
            if a1 > a2 { (a1, a2, c2) } else { (a2, a1, c1) }
        } else if u1 {
            (a1, a2, c2)
        } else {
            debug_assert!(u2, "bind requires an unbound side");
            (a2, a1, c1)
        };
        if to < HEAP_BASE {
            self.store.set(from, to_cell)?;
        } else {
            self.store.set(from, Cell::reference(to))?;
        }
        self.trail_if_conditional(from);
        Ok(())
    }

    /// Robinson unification without occurs-check, driven by the pushdown
    /// list.
    fn unify(&mut self, a: u32, b: u32) -> Result<bool, MachineError> {
        self.pdl.clear();
        self.pdl.push(a);
        self.pdl.push(b);
        while !self.pdl.is_empty() {
            let b = self.pdl.pop().expect("pairs");
            let a = self.pdl.pop().expect("pairs");
            let (a1, c1) = self.store.deref(a)?;
            let (a2, c2) = self.store.deref(b)?;
            if a1 == a2 {
                continue;
            }
            if c1.is_unbound_at(a1) || c2.is_unbound_at(a2) {
                self.bind(a1, c1, a2, c2)?;
                continue;
            }
            match (c1.tag(), c2.tag()) {
                (Some(Tag::Con), Some(Tag::Con)) => {
                    if c1.payload() != c2.payload() {
                        return Ok(false);
                    }
                }
                (Some(Tag::Str), Some(Tag::Str)) => {
                    let d1 = self.store.get(c1.payload())?.bits();
                    let d2 = self.store.get(c2.payload())?.bits();
                    if d1 != d2 {
                        return Ok(false);
                    }
                    for i in 1..=Functor::from_word(d1).arity as u32 {
                        self.pdl.push(c1.payload() + i);
                        self.pdl.push(c2.payload() + i);
                    }
                }
                (Some(Tag::Lis), Some(Tag::Lis)) => {
                    self.pdl.push(c1.payload());
                    self.pdl.push(c2.payload());
                    self.pdl.push(c1.payload() + 1);
                    self.pdl.push(c2.payload() + 1);
                }
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Restore machine state from the newest choice point, without popping.
    fn restore_top(&mut self) -> Result<(), MachineError> {
        let cp = self.choices.last().expect("restore needs a choice point");
        let args = cp.args.clone();
        let (ep, cont, b0, trail_len, heap_len, frames_len, slots_len) = (
            cp.ep,
            cp.cp,
            cp.b0,
            cp.trail_len,
            cp.heap_len,
            cp.frames_len,
            cp.slots_len,
        );
        for (i, cell) in args.iter().enumerate() {
            self.store.set_reg(i as u8, *cell)?;
        }
        self.na = args.len() as u8;
        self.ep = ep;
        self.cp = cont;
        self.b0 = b0;
        while self.trail.len() as u32 > trail_len {
            let addr = self.trail.pop().expect("len checked");
            self.store.set(addr, Cell::reference(addr))?;
        }
        self.store.truncate_heap(heap_len);
        self.frames.truncate(frames_len as usize);
        self.store.truncate_slots(slots_len);
        self.hbp = heap_len;
        Ok(())
    }

    fn push_choice(&mut self, next_alt: CodeOffset) -> Result<(), MachineError> {
        let mut args = SmallVec::new();
        for i in 0..self.na {
            args.push(self.store.reg(i)?);
        }
        self.choices.push(ChoicePoint {
            args,
            ep: self.ep,
            cp: self.cp,
            next_alt,
            trail_len: self.trail.len() as u32,
            heap_len: self.store.hp(),
            frames_len: self.frames.len() as u32,
            slots_len: self.store.slots_len(),
            b0: self.b0,
        });
        self.hbp = self.store.hp();
        Ok(())
    }

    /// Discard choice points newer than `level`. Heap and trail stay; any
    /// conditional bindings above the restored `HBP` become unconditional.
    fn cut_to(&mut self, level: u32) {
        if self.choices.len() as u32 > level {
            self.choices.truncate(level as usize);
            self.hbp = self.choices.last().map_or(HEAP_BASE, |c| c.heap_len);
        }
    }

    fn target_addr(t: horn_bytecode::Target) -> CodeOffset {
        match t {
            horn_bytecode::Target::Addr(a) => a,
            horn_bytecode::Target::Fail => FAIL_ADDR,
            horn_bytecode::Target::Label(_) => FAIL_ADDR,
        }
    }

    fn jump(&mut self, t: horn_bytecode::Target) -> Flow {
        let addr = Self::target_addr(t);
        if addr == FAIL_ADDR {
            Flow::Fail
        } else {
            self.ip = addr;
            Flow::Continue
        }
    }

    fn step(&mut self) -> Result<Flow, MachineError> {
        let at = self.ip;
        let (inst, len) = decode_at(self.code.bytes(), at)
            .map_err(|source| MachineError::Code { at, source })?;
        log::trace!("{at:>8x}: {inst}");
        self.ip = at + len;

        let flow = match inst {
            Inst::PutVar { v, a } => {
                let h = self.store.push_unbound()?;
                self.write_slot(v, Cell::reference(h))?;
                self.store.set_reg(a, Cell::reference(h))?;
                Flow::Continue
            }
            Inst::PutVal { v, a } => {
                let cell = self.read_slot(v)?;
                self.store.set_reg(a, cell)?;
                Flow::Continue
            }
            Inst::PutStruc { f, x } => {
                let h = self.store.hp();
                self.store.push(Cell::structure(h + 1))?;
                self.store.push(Cell::from_bits(f.to_word()))?;
                self.store.set_reg(x, Cell::structure(h + 1))?;
                Flow::Continue
            }
            Inst::PutList { x } => {
                let cell = Cell::list(self.store.hp());
                self.store.set_reg(x, cell)?;
                Flow::Continue
            }
            Inst::PutConstant { f, x } => {
                self.store.set_reg(x, Cell::constant(f.id))?;
                Flow::Continue
            }
            Inst::PutVoid { a } => {
                let h = self.store.push_unbound()?;
                self.store.set_reg(a, Cell::reference(h))?;
                Flow::Continue
            }
            Inst::SetVar { v } => {
                let h = self.store.push_unbound()?;
                self.write_slot(v, Cell::reference(h))?;
                Flow::Continue
            }
            Inst::SetVal { v } => {
                let cell = self.read_slot(v)?;
                self.store.push(cell)?;
                Flow::Continue
            }
            Inst::SetConstant { f } => {
                self.store.push(Cell::constant(f.id))?;
                Flow::Continue
            }
            Inst::SetVoid { n } => {
                for _ in 0..n {
                    self.store.push_unbound()?;
                }
                Flow::Continue
            }
            Inst::GetVar { v, a } => {
                let cell = self.store.reg(a)?;
                self.write_slot(v, cell)?;
                Flow::Continue
            }
            Inst::GetVal { v, a } => {
                let addr = self.slot_addr(v)?;
                if self.unify(addr, a as u32)? {
                    Flow::Continue
                } else {
                    Flow::Fail
                }
            }
            Inst::GetStruc { f, x } => {
                let (addr, cell) = self.store.deref(x as u32)?;
                if cell.is_unbound_at(addr) {
                    let h = self.store.hp();
                    self.store.push(Cell::structure(h + 1))?;
                    self.store.push(Cell::from_bits(f.to_word()))?;
                    self.store.set(addr, Cell::reference(h))?;
                    self.trail_if_conditional(addr);
                    self.write_mode = true;
                    Flow::Continue
                } else if cell.tag() == Some(Tag::Str) {
                    if self.store.get(cell.payload())?.bits() == f.to_word() {
                        self.sp = cell.payload() + 1;
                        self.write_mode = false;
                        Flow::Continue
                    } else {
                        Flow::Fail
                    }
                } else {
                    Flow::Fail
                }
            }
            Inst::GetList { x } => {
                let (addr, cell) = self.store.deref(x as u32)?;
                if cell.is_unbound_at(addr) {
                    let h = self.store.hp();
                    self.store.push(Cell::list(h + 1))?;
                    self.store.set(addr, Cell::reference(h))?;
                    self.trail_if_conditional(addr);
                    self.write_mode = true;
                    Flow::Continue
                } else if cell.tag() == Some(Tag::Lis) {
                    self.sp = cell.payload();
                    self.write_mode = false;
                    Flow::Continue
                } else {
                    Flow::Fail
                }
            }
            Inst::GetConstant { f, x } => self.match_constant(f.id, x as u32)?,
            Inst::GetNil { x } => self.match_constant(self.nil, x as u32)?,
            Inst::UnifyVar { v } => {
                if self.write_mode {
                    let h = self.store.push_unbound()?;
                    self.write_slot(v, Cell::reference(h))?;
                } else {
                    let cell = self.store.get(self.sp)?;
                    self.write_slot(v, cell)?;
                    self.sp += 1;
                }
                Flow::Continue
            }
            Inst::UnifyVal { v } => {
                if self.write_mode {
                    let cell = self.read_slot(v)?;
                    self.store.push(cell)?;
                    Flow::Continue
                } else {
                    let addr = self.slot_addr(v)?;
                    let sp = self.sp;
                    self.sp += 1;
                    if self.unify(addr, sp)? {
                        Flow::Continue
                    } else {
                        Flow::Fail
                    }
                }
            }
            Inst::UnifyLocalVal { v } => {
                if self.write_mode {
                    let cell = self.read_slot(v)?;
                    match cell.tag() {
                        Some(Tag::Ref) => {
                            let (addr, root) = self.store.deref(cell.payload())?;
                            if root.is_unbound_at(addr) && addr >= SLOT_BASE {
                                // Globalize a stack-resident variable.
                                let h = self.store.push_unbound()?;
                                self.store.set(addr, Cell::reference(h))?;
                                self.trail_if_conditional(addr);
                            } else {
                                self.store.push(Cell::reference(addr))?;
                            }
                        }
                        _ => {
                            self.store.push(cell)?;
                        }
                    }
                    Flow::Continue
                } else {
                    let addr = self.slot_addr(v)?;
                    let sp = self.sp;
                    self.sp += 1;
                    if self.unify(addr, sp)? {
                        Flow::Continue
                    } else {
                        Flow::Fail
                    }
                }
            }
            Inst::UnifyConstant { f } => {
                if self.write_mode {
                    self.store.push(Cell::constant(f.id))?;
                    Flow::Continue
                } else {
                    let sp = self.sp;
                    self.sp += 1;
                    self.match_constant(f.id, sp)?
                }
            }
            Inst::UnifyVoid { n } => {
                if self.write_mode {
                    for _ in 0..n {
                        self.store.push_unbound()?;
                    }
                } else {
                    self.sp += n as u32;
                }
                Flow::Continue
            }
            Inst::Allocate { n } => {
                let slot_base = self.store.grow_slots(n)?;
                self.frames.push(Frame {
                    cp: self.cp,
                    ce: self.ep,
                    slot_base,
                    n,
                });
                self.ep = Some(self.frames.len() as u32 - 1);
                Flow::Continue
            }
            Inst::Deallocate => {
                let e = self.ep.ok_or(MachineError::MissingEnvironment)?;
                let frame = self.frames[e as usize];
                self.cp = frame.cp;
                self.ep = frame.ce;
                // Frames above the new top stay while a choice point
                // protects them; otherwise they are garbage.
                let protect = self.choices.last().map_or(0, |c| c.frames_len);
                let keep = protect.max(self.ep.map_or(0, |e| e + 1));
                if self.frames.len() as u32 > keep {
                    self.frames.truncate(keep as usize);
                    let slots = self
                        .frames
                        .last()
                        .map_or(0, |f| f.slot_base + f.n as u32);
                    self.store.truncate_slots(slots);
                }
                Flow::Continue
            }
            Inst::Call { f, live: _ } => {
                self.b0 = self.choices.len() as u32;
                self.na = f.arity;
                self.cp = self.ip;
                match self.code.call_point(f.id) {
                    Some(point) => {
                        self.ip = point.entry;
                        Flow::Continue
                    }
                    None => {
                        // Unresolved call points are failures, not errors.
                        log::debug!("call to undefined predicate {f:?}");
                        Flow::Fail
                    }
                }
            }
            Inst::Execute { f } => {
                self.b0 = self.choices.len() as u32;
                self.na = f.arity;
                match self.code.call_point(f.id) {
                    Some(point) => {
                        self.ip = point.entry;
                        Flow::Continue
                    }
                    None => {
                        log::debug!("call to undefined predicate {f:?}");
                        Flow::Fail
                    }
                }
            }
            Inst::Proceed => {
                self.ip = self.cp;
                Flow::Continue
            }
            Inst::TryMeElse { alt } => {
                self.push_choice(Self::target_addr(alt))?;
                Flow::Continue
            }
            Inst::RetryMeElse { alt } => {
                self.restore_top()?;
                let next = Self::target_addr(alt);
                self.choices.last_mut().expect("restored").next_alt = next;
                Flow::Continue
            }
            Inst::TrustMe => {
                self.restore_top()?;
                self.choices.pop();
                self.hbp = self.choices.last().map_or(HEAP_BASE, |c| c.heap_len);
                Flow::Continue
            }
            Inst::Try { target } => {
                let next_alt = self.ip;
                self.push_choice(next_alt)?;
                self.jump(target)
            }
            Inst::Retry { target } => {
                self.restore_top()?;
                let next_alt = self.ip;
                self.choices.last_mut().expect("restored").next_alt = next_alt;
                self.jump(target)
            }
            Inst::Trust { target } => {
                self.restore_top()?;
                self.choices.pop();
                self.hbp = self.choices.last().map_or(HEAP_BASE, |c| c.heap_len);
                self.jump(target)
            }
            Inst::NeckCut => {
                self.cut_to(self.b0);
                Flow::Continue
            }
            Inst::GetLevel { y } => {
                let level = Cell::new(Tag::Con, self.b0);
                self.write_slot(Slot::stack(y), level)?;
                Flow::Continue
            }
            Inst::Cut { y } => {
                let level = self.read_slot(Slot::stack(y))?;
                self.cut_to(level.payload());
                Flow::Continue
            }
            Inst::SwitchOnTerm { var, con, lis, str_ } => {
                let (_, cell) = self.store.deref(0)?;
                let target = match cell.tag().expect("deref validated") {
                    Tag::Ref => var,
                    Tag::Con => con,
                    Tag::Lis => lis,
                    Tag::Str => str_,
                };
                self.jump(target)
            }
            Inst::SwitchOnConstant { table, slots } => {
                let (_, cell) = self.store.deref(0)?;
                match cell.tag() {
                    Some(Tag::Con) => {
                        let addr = self.code.index_get(table, slots, cell.payload() + 1);
                        if addr == 0 {
                            Flow::Fail
                        } else {
                            self.ip = addr;
                            Flow::Continue
                        }
                    }
                    _ => Flow::Fail,
                }
            }
            Inst::SwitchOnStructure { table, slots } => {
                let (_, cell) = self.store.deref(0)?;
                match cell.tag() {
                    Some(Tag::Str) => {
                        let f = Functor::from_word(self.store.get(cell.payload())?.bits());
                        let addr = self.code.index_get(table, slots, f.id.as_u32() + 1);
                        if addr == 0 {
                            Flow::Fail
                        } else {
                            self.ip = addr;
                            Flow::Continue
                        }
                    }
                    _ => Flow::Fail,
                }
            }
        };
        Ok(flow)
    }

    /// Match a constant against the dereferenced cell at `addr`, binding an
    /// unbound cell in place.
    fn match_constant(&mut self, id: FunctorId, addr: u32) -> Result<Flow, MachineError> {
        let (addr, cell) = self.store.deref(addr)?;
        if cell.is_unbound_at(addr) {
            self.store.set(addr, Cell::constant(id))?;
            self.trail_if_conditional(addr);
            return Ok(Flow::Continue);
        }
        match cell.tag() {
            Some(Tag::Con) if cell.payload() == id.as_u32() => Ok(Flow::Continue),
            _ => Ok(Flow::Fail),
        }
    }
}
