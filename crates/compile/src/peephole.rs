//! Peephole optimization of instruction listings.
//!
//! A rewrite pass over the emitted listing:
//!
//! - a zero-arity `get_struc`/`put_struc` paired with the `unify_var` /
//!   `set_val` that carries its register collapses into the matching
//!   constant instruction when the constant only occurs in non-argument
//!   positions; in argument position it becomes `get_constant` /
//!   `put_constant`;
//! - `./2` structure operations become the dedicated list instructions,
//!   and `get_constant []` becomes `get_nil`;
//! - runs of void subterms merge into counted `unify_void` / `set_void`;
//! - a head move `get_var xN, aN` between the same register disappears.

use crate::symtab::{Attr, SymbolKey, SymbolTable};
use horn_bytecode::{AddrMode, Inst, Slot, WellKnown};

/// Does the instruction read or write temporary register `x`?
fn mentions_reg(inst: &Inst, x: u8) -> bool {
    let slot_hits = |v: &Slot| v.mode == AddrMode::Reg && v.index == x;
    match inst {
        Inst::PutVar { v, a }
        | Inst::PutVal { v, a }
        | Inst::GetVar { v, a }
        | Inst::GetVal { v, a } => slot_hits(v) || *a == x,
        Inst::PutStruc { x: t, .. }
        | Inst::PutConstant { x: t, .. }
        | Inst::GetStruc { x: t, .. }
        | Inst::GetConstant { x: t, .. }
        | Inst::PutList { x: t }
        | Inst::GetList { x: t }
        | Inst::GetNil { x: t }
        | Inst::PutVoid { a: t } => *t == x,
        Inst::SetVar { v }
        | Inst::SetVal { v }
        | Inst::UnifyVar { v }
        | Inst::UnifyVal { v }
        | Inst::UnifyLocalVal { v } => slot_hits(v),
        _ => false,
    }
}

/// Run the rewrite rules over a listing.
pub fn optimize(insts: Vec<Inst>, symtab: &SymbolTable, wk: &WellKnown) -> Vec<Inst> {
    let mut slots: Vec<Option<Inst>> = insts.into_iter().map(Some).collect();

    // Zero-arity get_struc: fold into the unify_var that introduced its
    // register, or degrade to get_constant in argument position.
    for j in 0..slots.len() {
        let (f, x) = match &slots[j] {
            Some(Inst::GetStruc { f, x }) if f.arity == 0 => (*f, *x),
            _ => continue,
        };
        let non_arg = symtab.flag(SymbolKey::Functor(f.id), Attr::NonArgOnly);
        let mut fold = None;
        for i in (0..j).rev() {
            let Some(prev) = &slots[i] else { continue };
            if !mentions_reg(prev, x) {
                continue;
            }
            if non_arg {
                if let Inst::UnifyVar { v } = prev {
                    if v.mode == AddrMode::Reg && v.index == x {
                        fold = Some(i);
                    }
                }
            }
            break;
        }
        match fold {
            Some(i) => {
                slots[i] = Some(Inst::UnifyConstant { f });
                slots[j] = None;
            }
            None => slots[j] = Some(Inst::GetConstant { f, x }),
        }
    }

    // Zero-arity put_struc: fold into the set_val that consumes its
    // register, or degrade to put_constant in argument position.
    for i in 0..slots.len() {
        let (f, x) = match &slots[i] {
            Some(Inst::PutStruc { f, x }) if f.arity == 0 => (*f, *x),
            _ => continue,
        };
        let non_arg = symtab.flag(SymbolKey::Functor(f.id), Attr::NonArgOnly);
        let mut fold = None;
        for j in i + 1..slots.len() {
            let Some(next) = &slots[j] else { continue };
            if !mentions_reg(next, x) {
                continue;
            }
            if non_arg {
                if let Inst::SetVal { v } = next {
                    if v.mode == AddrMode::Reg && v.index == x {
                        fold = Some(j);
                    }
                }
            }
            break;
        }
        match fold {
            Some(j) => {
                slots[j] = Some(Inst::SetConstant { f });
                slots[i] = None;
            }
            None => slots[i] = Some(Inst::PutConstant { f, x }),
        }
    }

    // List cells and the empty list get their dedicated forms.
    for slot in slots.iter_mut() {
        *slot = match slot.take() {
            Some(Inst::GetStruc { f, x }) if f.id == wk.cons => Some(Inst::GetList { x }),
            Some(Inst::PutStruc { f, x }) if f.id == wk.cons => Some(Inst::PutList { x }),
            Some(Inst::GetConstant { f, x }) if f.id == wk.nil => Some(Inst::GetNil { x }),
            other => other,
        };
    }

    // Merge void runs and drop self-moves.
    let mut out: Vec<Inst> = Vec::with_capacity(slots.len());
    for inst in slots.into_iter().flatten() {
        match inst {
            Inst::UnifyVoid { n } => {
                if let Some(Inst::UnifyVoid { n: prev }) = out.last_mut() {
                    *prev += n;
                    continue;
                }
                out.push(inst);
            }
            Inst::SetVoid { n } => {
                if let Some(Inst::SetVoid { n: prev }) = out.last_mut() {
                    *prev += n;
                    continue;
                }
                out.push(inst);
            }
            Inst::GetVar { v, a } if v.mode == AddrMode::Reg && v.index == a => {}
            other => out.push(other),
        }
    }
    out
}
