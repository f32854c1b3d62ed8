//! Head and body code emission.
//!
//! Head arguments compile to `get`/`unify` matching code, breadth-first
//! over nested structures so every structure's unify stream stays
//! contiguous. Body goals load argument registers with `put`/`set` code,
//! building nested terms bottom-up, then call; the final call drops the
//! environment and becomes a tail call. The listing leaves zero-arity
//! structures and list cells in their general form; the peephole pass
//! collapses them afterwards.

use crate::analysis::Analysis;
use crate::builtins::{Goal, NormalClause};
use crate::symtab::SymbolTable;
use crate::term::Term;
use crate::CompileError;
use horn_bytecode::{Functor, Inst, Slot, VarId, REG_COUNT};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Phases 5 through 8: produce the instruction listing for one clause.
pub fn emit(
    norm: &NormalClause,
    analysis: &Analysis,
    symtab: &mut SymbolTable,
) -> Result<Vec<Inst>, CompileError> {
    if analysis.temp_base > REG_COUNT {
        return Err(CompileError::RegisterPressure {
            needed: analysis.temp_base as usize,
        });
    }

    let mut e = Emitter {
        symtab,
        insts: Vec::new(),
        seen: FxHashSet::default(),
        temp_next: analysis.temp_base,
    };

    if analysis.needs_env {
        e.insts.push(Inst::Allocate {
            n: analysis.perm_count,
        });
    }
    if let Some(level) = analysis.level_var {
        e.insts.push(Inst::GetLevel {
            y: e.level_slot(level),
        });
    }

    if let Term::Struct(_, args) = &norm.head {
        for (i, arg) in args.iter().enumerate() {
            e.head_arg(i as u8, arg)?;
        }
    }

    let total = norm.goals.len();
    let mut call_idx: u32 = 0;
    for (gi, goal) in norm.goals.iter().enumerate() {
        match goal {
            Goal::True => {}
            Goal::Cut => {
                if call_idx == 0 {
                    e.insts.push(Inst::NeckCut);
                } else {
                    let level = analysis.level_var.expect("deep cut has a level variable");
                    e.insts.push(Inst::Cut {
                        y: e.level_slot(level),
                    });
                }
            }
            Goal::Call(t) => {
                let f = t.descriptor().expect("goals are atoms or structures");
                if let Term::Struct(_, args) = t {
                    e.load_args(args)?;
                }
                if gi + 1 == total {
                    if analysis.needs_env {
                        e.insts.push(Inst::Deallocate);
                    }
                    e.insts.push(Inst::Execute { f });
                } else {
                    e.insts.push(Inst::Call {
                        f,
                        live: analysis.live_after(call_idx),
                    });
                }
                call_idx += 1;
                // New chunk: temporaries from the previous one are dead.
                e.temp_next = analysis.temp_base;
            }
        }
    }

    if !matches!(norm.goals.last(), Some(Goal::Call(_))) {
        if analysis.needs_env {
            e.insts.push(Inst::Deallocate);
        }
        e.insts.push(Inst::Proceed);
    }

    Ok(e.insts)
}

struct Emitter<'a> {
    symtab: &'a mut SymbolTable,
    insts: Vec<Inst>,
    seen: FxHashSet<VarId>,
    temp_next: u8,
}

impl Emitter<'_> {
    fn level_slot(&self, level: VarId) -> u8 {
        self.symtab
            .allocation(level)
            .expect("level variable is allocated")
            .index
    }

    fn fresh_temp(&mut self) -> Result<u8, CompileError> {
        if self.temp_next >= REG_COUNT {
            return Err(CompileError::RegisterPressure {
                needed: self.temp_next as usize + 1,
            });
        }
        let t = self.temp_next;
        self.temp_next += 1;
        Ok(t)
    }

    fn slot_of(&mut self, v: VarId) -> Result<Slot, CompileError> {
        if let Some(slot) = self.symtab.allocation(v) {
            return Ok(slot);
        }
        let slot = Slot::reg(self.fresh_temp()?);
        self.symtab.set_allocation(v, slot);
        Ok(slot)
    }

    fn head_arg(&mut self, i: u8, arg: &Term) -> Result<(), CompileError> {
        match arg {
            Term::Anon => {}
            Term::Var(v) => {
                let slot = self.slot_of(*v)?;
                if self.seen.insert(*v) {
                    self.insts.push(Inst::GetVar { v: slot, a: i });
                } else {
                    self.insts.push(Inst::GetVal { v: slot, a: i });
                }
            }
            Term::Atom(c) => self.insts.push(Inst::GetStruc {
                f: Functor::new(*c, 0),
                x: i,
            }),
            Term::Struct(_, _) => {
                let mut queue = VecDeque::new();
                queue.push_back((i, arg));
                while let Some((x, term)) = queue.pop_front() {
                    match term {
                        Term::Atom(c) => self.insts.push(Inst::GetStruc {
                            f: Functor::new(*c, 0),
                            x,
                        }),
                        Term::Struct(_, args) => {
                            let f = term.descriptor().expect("structure");
                            self.insts.push(Inst::GetStruc { f, x });
                            self.unify_subterms(args, &mut queue)?;
                        }
                        Term::Var(_) | Term::Anon => unreachable!("only compounds are queued"),
                    }
                }
            }
        }
        Ok(())
    }

    fn unify_subterms<'t>(
        &mut self,
        args: &'t [Term],
        queue: &mut VecDeque<(u8, &'t Term)>,
    ) -> Result<(), CompileError> {
        for arg in args {
            match arg {
                Term::Anon => self.insts.push(Inst::UnifyVoid { n: 1 }),
                Term::Var(v) => {
                    let slot = self.slot_of(*v)?;
                    if self.seen.insert(*v) {
                        self.insts.push(Inst::UnifyVar { v: slot });
                    } else {
                        self.insts.push(Inst::UnifyVal { v: slot });
                    }
                }
                Term::Atom(_) | Term::Struct(_, _) => {
                    let t = self.fresh_temp()?;
                    self.insts.push(Inst::UnifyVar { v: Slot::reg(t) });
                    queue.push_back((t, arg));
                }
            }
        }
        Ok(())
    }

    fn load_args(&mut self, args: &[Term]) -> Result<(), CompileError> {
        for (i, arg) in args.iter().enumerate() {
            let i = i as u8;
            match arg {
                Term::Anon => self.insts.push(Inst::PutVoid { a: i }),
                Term::Var(v) => {
                    let slot = self.slot_of(*v)?;
                    if self.seen.insert(*v) {
                        self.insts.push(Inst::PutVar { v: slot, a: i });
                    } else {
                        self.insts.push(Inst::PutVal { v: slot, a: i });
                    }
                }
                Term::Atom(c) => self.insts.push(Inst::PutStruc {
                    f: Functor::new(*c, 0),
                    x: i,
                }),
                Term::Struct(_, sub) => {
                    let f = arg.descriptor().expect("structure");
                    self.build_into(f, sub, i)?;
                }
            }
        }
        Ok(())
    }

    /// Build a structure into `dst`, children first so every `set_val` of a
    /// nested term refers to an already-written register.
    fn build_into(&mut self, f: Functor, args: &[Term], dst: u8) -> Result<(), CompileError> {
        let mut built: Vec<Option<u8>> = vec![None; args.len()];
        for (k, arg) in args.iter().enumerate() {
            if matches!(arg, Term::Atom(_) | Term::Struct(_, _)) {
                built[k] = Some(self.build(arg)?);
            }
        }
        self.insts.push(Inst::PutStruc { f, x: dst });
        for (k, arg) in args.iter().enumerate() {
            match arg {
                Term::Anon => self.insts.push(Inst::SetVoid { n: 1 }),
                Term::Var(v) => {
                    let slot = self.slot_of(*v)?;
                    if self.seen.insert(*v) {
                        self.insts.push(Inst::SetVar { v: slot });
                    } else {
                        self.insts.push(Inst::SetVal { v: slot });
                    }
                }
                Term::Atom(_) | Term::Struct(_, _) => self.insts.push(Inst::SetVal {
                    v: Slot::reg(built[k].expect("prebuilt")),
                }),
            }
        }
        Ok(())
    }

    fn build(&mut self, term: &Term) -> Result<u8, CompileError> {
        let t = self.fresh_temp()?;
        match term {
            Term::Atom(c) => self.insts.push(Inst::PutStruc {
                f: Functor::new(*c, 0),
                x: t,
            }),
            Term::Struct(_, args) => {
                let f = term.descriptor().expect("structure");
                self.build_into(f, args, t)?;
            }
            Term::Var(_) | Term::Anon => unreachable!("variables are never prebuilt"),
        }
        Ok(t)
    }
}
