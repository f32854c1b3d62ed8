//! The passive monitor surface.

use crate::engine_with;
use horn::{MemoryLayout, Monitor, RegisterView};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Counters {
    resets: usize,
    code_updates: usize,
    code_bytes: u32,
    executes: usize,
    steps: usize,
    layout: Option<MemoryLayout>,
}

struct Counting(Rc<RefCell<Counters>>);

impl Monitor for Counting {
    fn on_reset(&mut self, layout: &MemoryLayout) {
        let mut c = self.0.borrow_mut();
        c.resets += 1;
        c.layout = Some(*layout);
    }

    fn on_code_update(&mut self, _start: u32, len: u32) {
        let mut c = self.0.borrow_mut();
        c.code_updates += 1;
        c.code_bytes += len;
    }

    fn on_execute(&mut self, _regs: &RegisterView) {
        self.0.borrow_mut().executes += 1;
    }

    fn on_step(&mut self, regs: &RegisterView) {
        let mut c = self.0.borrow_mut();
        c.steps += 1;
        // Read-only sanity: the layout invariants hold at every step.
        assert!(regs.hbp <= regs.hp);
    }
}

#[test]
fn monitor_observes_reset_code_and_execution() {
    let counters = Rc::new(RefCell::new(Counters::default()));
    let mut engine = engine_with("");
    engine.attach_monitor(Box::new(Counting(counters.clone())));
    engine.reset().unwrap();
    assert_eq!(counters.borrow().resets, 1);
    // Reloading the built-in library produced code updates.
    let after_reset = counters.borrow().code_updates;
    assert!(after_reset > 0);

    engine.load_program("p(a). p(b).").unwrap();
    assert_eq!(counters.borrow().code_updates, after_reset + 2);
    assert!(counters.borrow().code_bytes > 0);

    engine.set_query_text("?- p(X).").unwrap();
    let n = engine.solutions().count();
    assert_eq!(n, 2);

    let c = counters.borrow();
    // One resolve per solution; the exhausting call never re-enters the
    // interpreter.
    assert_eq!(c.executes, 2);
    assert!(c.steps > 0);
    let layout = c.layout.expect("layout reported at reset");
    assert!(layout.heap_base >= layout.reg_count as u32);
    assert!(layout.slot_base > layout.heap_base);
}
