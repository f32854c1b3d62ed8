//! The instruction model.
//!
//! Instructions are variable-length byte sequences: an opcode byte followed
//! by operands. An addressing-mode byte precedes every operand that may
//! name either a temporary register or an environment slot; plain register
//! operands are a single byte; functor operands occupy four little-endian
//! bytes in descriptor form (arity in the high byte); code addresses are
//! absolute four-byte offsets patched at link time.

use crate::cell::Functor;
use crate::interner::Interner;
use core::fmt;
use cranelift_entity::entity_impl;
use num_enum::TryFromPrimitive;

/// Offset in bytes from the beginning of the code buffer.
pub type CodeOffset = u32;

/// Address operand meaning "no alternative": backtracking through a choice
/// point holding it discards the choice point and keeps backtracking.
pub const FAIL_ADDR: CodeOffset = 0xffff_ffff;

/// A forward code reference, reserved during emission and patched once the
/// real address is known.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);
entity_impl!(Label, "label");

/// Addressing mode of a variable operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AddrMode {
    /// A temporary (`X`) register.
    Reg = 0x00,
    /// A permanent (`Y`) slot in the current environment.
    Stack = 0x01,
}

/// A variable operand: addressing mode plus index.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Slot {
    pub mode: AddrMode,
    pub index: u8,
}

impl Slot {
    /// Temporary register `x{index}`.
    pub fn reg(index: u8) -> Slot {
        Slot {
            mode: AddrMode::Reg,
            index,
        }
    }

    /// Environment slot `y{index}`.
    pub fn stack(index: u8) -> Slot {
        Slot {
            mode: AddrMode::Stack,
            index,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mode {
            AddrMode::Reg => write!(f, "x{}", self.index),
            AddrMode::Stack => write!(f, "y{}", self.index),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A code-address operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Unresolved; assembled as a placeholder and patched at label bind.
    Label(Label),
    /// An absolute byte offset into the code buffer.
    Addr(CodeOffset),
    /// The fail sentinel.
    Fail,
}

/// A recorded position of a label operand inside assembled code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LabelUse {
    pub label: Label,
    /// Offset of the four patch bytes.
    pub at: CodeOffset,
}

/// Opcode bytes. Part of the external encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    PutVar = 0x01,
    PutVal = 0x02,
    PutStruc = 0x03,
    PutList = 0x04,
    PutConstant = 0x05,
    PutVoid = 0x06,
    SetVar = 0x07,
    SetVal = 0x08,
    SetConstant = 0x09,
    SetVoid = 0x0a,
    GetVar = 0x0b,
    GetVal = 0x0c,
    GetStruc = 0x0d,
    GetList = 0x0e,
    GetConstant = 0x0f,
    GetNil = 0x10,
    UnifyVar = 0x11,
    UnifyVal = 0x12,
    UnifyLocalVal = 0x13,
    UnifyConstant = 0x14,
    UnifyVoid = 0x15,
    Allocate = 0x16,
    Deallocate = 0x17,
    Call = 0x18,
    Execute = 0x19,
    Proceed = 0x1a,
    TryMeElse = 0x1b,
    RetryMeElse = 0x1c,
    TrustMe = 0x1d,
    Try = 0x1e,
    Retry = 0x1f,
    Trust = 0x20,
    NeckCut = 0x21,
    GetLevel = 0x22,
    Cut = 0x23,
    SwitchOnTerm = 0x24,
    SwitchOnConstant = 0x25,
    SwitchOnStructure = 0x26,
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inst {
    PutVar { v: Slot, a: u8 },
    PutVal { v: Slot, a: u8 },
    PutStruc { f: Functor, x: u8 },
    PutList { x: u8 },
    PutConstant { f: Functor, x: u8 },
    PutVoid { a: u8 },
    SetVar { v: Slot },
    SetVal { v: Slot },
    SetConstant { f: Functor },
    SetVoid { n: u8 },
    GetVar { v: Slot, a: u8 },
    GetVal { v: Slot, a: u8 },
    GetStruc { f: Functor, x: u8 },
    GetList { x: u8 },
    GetConstant { f: Functor, x: u8 },
    GetNil { x: u8 },
    UnifyVar { v: Slot },
    UnifyVal { v: Slot },
    UnifyLocalVal { v: Slot },
    UnifyConstant { f: Functor },
    UnifyVoid { n: u8 },
    Allocate { n: u8 },
    Deallocate,
    Call { f: Functor, live: u8 },
    Execute { f: Functor },
    Proceed,
    TryMeElse { alt: Target },
    RetryMeElse { alt: Target },
    /// Encoded with four reserved operand bytes, the same width as
    /// `retry_me_else`, so a chain tail can be repatched in place when a
    /// clause is appended to its predicate.
    TrustMe,
    Try { target: Target },
    Retry { target: Target },
    Trust { target: Target },
    NeckCut,
    GetLevel { y: u8 },
    Cut { y: u8 },
    SwitchOnTerm { var: Target, con: Target, lis: Target, str_: Target },
    SwitchOnConstant { table: CodeOffset, slots: u32 },
    SwitchOnStructure { table: CodeOffset, slots: u32 },
}

impl Inst {
    pub fn opcode(&self) -> Opcode {
        match self {
            Inst::PutVar { .. } => Opcode::PutVar,
            Inst::PutVal { .. } => Opcode::PutVal,
            Inst::PutStruc { .. } => Opcode::PutStruc,
            Inst::PutList { .. } => Opcode::PutList,
            Inst::PutConstant { .. } => Opcode::PutConstant,
            Inst::PutVoid { .. } => Opcode::PutVoid,
            Inst::SetVar { .. } => Opcode::SetVar,
            Inst::SetVal { .. } => Opcode::SetVal,
            Inst::SetConstant { .. } => Opcode::SetConstant,
            Inst::SetVoid { .. } => Opcode::SetVoid,
            Inst::GetVar { .. } => Opcode::GetVar,
            Inst::GetVal { .. } => Opcode::GetVal,
            Inst::GetStruc { .. } => Opcode::GetStruc,
            Inst::GetList { .. } => Opcode::GetList,
            Inst::GetConstant { .. } => Opcode::GetConstant,
            Inst::GetNil { .. } => Opcode::GetNil,
            Inst::UnifyVar { .. } => Opcode::UnifyVar,
            Inst::UnifyVal { .. } => Opcode::UnifyVal,
            Inst::UnifyLocalVal { .. } => Opcode::UnifyLocalVal,
            Inst::UnifyConstant { .. } => Opcode::UnifyConstant,
            Inst::UnifyVoid { .. } => Opcode::UnifyVoid,
            Inst::Allocate { .. } => Opcode::Allocate,
            Inst::Deallocate => Opcode::Deallocate,
            Inst::Call { .. } => Opcode::Call,
            Inst::Execute { .. } => Opcode::Execute,
            Inst::Proceed => Opcode::Proceed,
            Inst::TryMeElse { .. } => Opcode::TryMeElse,
            Inst::RetryMeElse { .. } => Opcode::RetryMeElse,
            Inst::TrustMe => Opcode::TrustMe,
            Inst::Try { .. } => Opcode::Try,
            Inst::Retry { .. } => Opcode::Retry,
            Inst::Trust { .. } => Opcode::Trust,
            Inst::NeckCut => Opcode::NeckCut,
            Inst::GetLevel { .. } => Opcode::GetLevel,
            Inst::Cut { .. } => Opcode::Cut,
            Inst::SwitchOnTerm { .. } => Opcode::SwitchOnTerm,
            Inst::SwitchOnConstant { .. } => Opcode::SwitchOnConstant,
            Inst::SwitchOnStructure { .. } => Opcode::SwitchOnStructure,
        }
    }

    /// Append this instruction's encoding to `sink`. Label operands are
    /// assembled as placeholders and recorded in `fixups` for patching.
    pub fn encode(&self, sink: &mut Vec<u8>, fixups: &mut Vec<LabelUse>) {
        fn slot(sink: &mut Vec<u8>, v: Slot) {
            sink.push(v.mode as u8);
            sink.push(v.index);
        }
        fn functor(sink: &mut Vec<u8>, f: Functor) {
            sink.extend_from_slice(&f.to_word().to_le_bytes());
        }
        fn addr(sink: &mut Vec<u8>, a: CodeOffset) {
            sink.extend_from_slice(&a.to_le_bytes());
        }
        fn target(sink: &mut Vec<u8>, fixups: &mut Vec<LabelUse>, t: Target) {
            match t {
                Target::Addr(a) => addr(sink, a),
                Target::Fail => addr(sink, FAIL_ADDR),
                Target::Label(label) => {
                    fixups.push(LabelUse {
                        label,
                        at: sink.len() as CodeOffset,
                    });
                    addr(sink, FAIL_ADDR);
                }
            }
        }

        sink.push(self.opcode() as u8);
        match *self {
            Inst::PutVar { v, a } | Inst::PutVal { v, a } => {
                slot(sink, v);
                sink.push(a);
            }
            Inst::PutStruc { f, x } | Inst::PutConstant { f, x } => {
                functor(sink, f);
                sink.push(x);
            }
            Inst::PutList { x } | Inst::PutVoid { a: x } => sink.push(x),
            Inst::SetVar { v } | Inst::SetVal { v } => slot(sink, v),
            Inst::SetConstant { f } => functor(sink, f),
            Inst::SetVoid { n } => sink.push(n),
            Inst::GetVar { v, a } | Inst::GetVal { v, a } => {
                slot(sink, v);
                sink.push(a);
            }
            Inst::GetStruc { f, x } | Inst::GetConstant { f, x } => {
                functor(sink, f);
                sink.push(x);
            }
            Inst::GetList { x } | Inst::GetNil { x } => sink.push(x),
            Inst::UnifyVar { v } | Inst::UnifyVal { v } | Inst::UnifyLocalVal { v } => {
                slot(sink, v)
            }
            Inst::UnifyConstant { f } => functor(sink, f),
            Inst::UnifyVoid { n } => sink.push(n),
            Inst::Allocate { n } => sink.push(n),
            Inst::Deallocate | Inst::Proceed | Inst::NeckCut => {}
            Inst::Call { f, live } => {
                functor(sink, f);
                sink.push(live);
            }
            Inst::Execute { f } => functor(sink, f),
            Inst::TryMeElse { alt } | Inst::RetryMeElse { alt } => target(sink, fixups, alt),
            Inst::TrustMe => addr(sink, 0),
            Inst::Try { target: t } | Inst::Retry { target: t } | Inst::Trust { target: t } => {
                target(sink, fixups, t)
            }
            Inst::GetLevel { y } | Inst::Cut { y } => sink.push(y),
            Inst::SwitchOnTerm { var, con, lis, str_ } => {
                target(sink, fixups, var);
                target(sink, fixups, con);
                target(sink, fixups, lis);
                target(sink, fixups, str_);
            }
            Inst::SwitchOnConstant { table, slots }
            | Inst::SwitchOnStructure { table, slots } => {
                addr(sink, table);
                addr(sink, slots);
            }
        }
    }

    /// Render with functor names resolved through `interner`.
    pub fn display<'a>(&'a self, interner: Option<&'a Interner>) -> DisplayInst<'a> {
        DisplayInst {
            inst: self,
            interner,
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.display(None), f)
    }
}

/// Adapter pairing an instruction with an optional interner for name
/// resolution in listings.
pub struct DisplayInst<'a> {
    inst: &'a Inst,
    interner: Option<&'a Interner>,
}

impl DisplayInst<'_> {
    fn functor(&self, f: Functor) -> String {
        match self.interner {
            Some(interner) => {
                let (name, arity) = interner.functor(f.id);
                format!("{name}/{arity}")
            }
            None => format!("${}/{}", f.id.as_u32(), f.arity),
        }
    }

    fn constant(&self, f: Functor) -> String {
        match self.interner {
            Some(interner) => interner.functor(f.id).0.to_owned(),
            None => format!("${}", f.id.as_u32()),
        }
    }

    fn target(&self, t: Target) -> String {
        match t {
            Target::Label(label) => format!("{label}"),
            Target::Addr(a) => format!("{a:#x}"),
            Target::Fail => "fail".to_owned(),
        }
    }
}

impl fmt::Display for DisplayInst<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.inst {
            Inst::PutVar { v, a } => write!(f, "put_var {v}, a{a}"),
            Inst::PutVal { v, a } => write!(f, "put_val {v}, a{a}"),
            Inst::PutStruc { f: fun, x } => {
                write!(f, "put_struc {}, x{x}", self.functor(fun))
            }
            Inst::PutList { x } => write!(f, "put_list x{x}"),
            Inst::PutConstant { f: fun, x } => {
                write!(f, "put_constant {}, x{x}", self.constant(fun))
            }
            Inst::PutVoid { a } => write!(f, "put_void a{a}"),
            Inst::SetVar { v } => write!(f, "set_var {v}"),
            Inst::SetVal { v } => write!(f, "set_val {v}"),
            Inst::SetConstant { f: fun } => write!(f, "set_constant {}", self.constant(fun)),
            Inst::SetVoid { n } => write!(f, "set_void {n}"),
            Inst::GetVar { v, a } => write!(f, "get_var {v}, a{a}"),
            Inst::GetVal { v, a } => write!(f, "get_val {v}, a{a}"),
            Inst::GetStruc { f: fun, x } => {
                write!(f, "get_struc {}, x{x}", self.functor(fun))
            }
            Inst::GetList { x } => write!(f, "get_list x{x}"),
            Inst::GetConstant { f: fun, x } => {
                write!(f, "get_constant {}, x{x}", self.constant(fun))
            }
            Inst::GetNil { x } => write!(f, "get_nil x{x}"),
            Inst::UnifyVar { v } => write!(f, "unify_var {v}"),
            Inst::UnifyVal { v } => write!(f, "unify_val {v}"),
            Inst::UnifyLocalVal { v } => write!(f, "unify_local_val {v}"),
            Inst::UnifyConstant { f: fun } => {
                write!(f, "unify_constant {}", self.constant(fun))
            }
            Inst::UnifyVoid { n } => write!(f, "unify_void {n}"),
            Inst::Allocate { n } => write!(f, "allocate {n}"),
            Inst::Deallocate => write!(f, "deallocate"),
            Inst::Call { f: fun, live } => {
                write!(f, "call {}, {live}", self.functor(fun))
            }
            Inst::Execute { f: fun } => write!(f, "execute {}", self.functor(fun)),
            Inst::Proceed => write!(f, "proceed"),
            Inst::TryMeElse { alt } => write!(f, "try_me_else {}", self.target(alt)),
            Inst::RetryMeElse { alt } => write!(f, "retry_me_else {}", self.target(alt)),
            Inst::TrustMe => write!(f, "trust_me"),
            Inst::Try { target } => write!(f, "try {}", self.target(target)),
            Inst::Retry { target } => write!(f, "retry {}", self.target(target)),
            Inst::Trust { target } => write!(f, "trust {}", self.target(target)),
            Inst::NeckCut => write!(f, "neck_cut"),
            Inst::GetLevel { y } => write!(f, "get_level y{y}"),
            Inst::Cut { y } => write!(f, "cut y{y}"),
            Inst::SwitchOnTerm { var, con, lis, str_ } => write!(
                f,
                "switch_on_term {}, {}, {}, {}",
                self.target(var),
                self.target(con),
                self.target(lis),
                self.target(str_),
            ),
            Inst::SwitchOnConstant { table, slots } => {
                write!(f, "switch_on_constant {table:#x}, {slots}")
            }
            Inst::SwitchOnStructure { table, slots } => {
                write!(f, "switch_on_structure {table:#x}, {slots}")
            }
        }
    }
}

/// Bytecode decoding failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of code at offset {0:#x}")]
    UnexpectedEnd(CodeOffset),
    #[error("invalid opcode {opcode:#04x} at offset {at:#x}")]
    BadOpcode { opcode: u8, at: CodeOffset },
    #[error("invalid addressing mode {mode:#04x} at offset {at:#x}")]
    BadAddrMode { mode: u8, at: CodeOffset },
}

/// Decode the instruction at `offset`, returning it and its encoded length.
pub fn decode_at(bytes: &[u8], offset: CodeOffset) -> Result<(Inst, u32), DecodeError> {
    let mut r = Reader {
        bytes,
        pos: offset as usize,
    };
    let inst = r.inst()?;
    Ok((inst, r.pos as u32 - offset))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEnd(self.pos as CodeOffset))?;
        self.pos += 1;
        Ok(b)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let end = self.pos + 4;
        let bytes = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEnd(self.pos as CodeOffset))?;
        self.pos = end;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn slot(&mut self) -> Result<Slot, DecodeError> {
        let at = self.pos as CodeOffset;
        let mode = self.u8()?;
        let mode = AddrMode::try_from(mode).map_err(|_| DecodeError::BadAddrMode { mode, at })?;
        let index = self.u8()?;
        Ok(Slot { mode, index })
    }

    fn functor(&mut self) -> Result<Functor, DecodeError> {
        Ok(Functor::from_word(self.u32()?))
    }

    fn target(&mut self) -> Result<Target, DecodeError> {
        let addr = self.u32()?;
        Ok(if addr == FAIL_ADDR {
            Target::Fail
        } else {
            Target::Addr(addr)
        })
    }

    fn inst(&mut self) -> Result<Inst, DecodeError> {
        let at = self.pos as CodeOffset;
        let opcode = self.u8()?;
        let opcode =
            Opcode::try_from(opcode).map_err(|_| DecodeError::BadOpcode { opcode, at })?;
        Ok(match opcode {
            Opcode::PutVar => Inst::PutVar {
                v: self.slot()?,
                a: self.u8()?,
            },
            Opcode::PutVal => Inst::PutVal {
                v: self.slot()?,
                a: self.u8()?,
            },
            Opcode::PutStruc => Inst::PutStruc {
                f: self.functor()?,
                x: self.u8()?,
            },
            Opcode::PutList => Inst::PutList { x: self.u8()? },
            Opcode::PutConstant => Inst::PutConstant {
                f: self.functor()?,
                x: self.u8()?,
            },
            Opcode::PutVoid => Inst::PutVoid { a: self.u8()? },
            Opcode::SetVar => Inst::SetVar { v: self.slot()? },
            Opcode::SetVal => Inst::SetVal { v: self.slot()? },
            Opcode::SetConstant => Inst::SetConstant { f: self.functor()? },
            Opcode::SetVoid => Inst::SetVoid { n: self.u8()? },
            Opcode::GetVar => Inst::GetVar {
                v: self.slot()?,
                a: self.u8()?,
            },
            Opcode::GetVal => Inst::GetVal {
                v: self.slot()?,
                a: self.u8()?,
            },
            Opcode::GetStruc => Inst::GetStruc {
                f: self.functor()?,
                x: self.u8()?,
            },
            Opcode::GetList => Inst::GetList { x: self.u8()? },
            Opcode::GetConstant => Inst::GetConstant {
                f: self.functor()?,
                x: self.u8()?,
            },
            Opcode::GetNil => Inst::GetNil { x: self.u8()? },
            Opcode::UnifyVar => Inst::UnifyVar { v: self.slot()? },
            Opcode::UnifyVal => Inst::UnifyVal { v: self.slot()? },
            Opcode::UnifyLocalVal => Inst::UnifyLocalVal { v: self.slot()? },
            Opcode::UnifyConstant => Inst::UnifyConstant { f: self.functor()? },
            Opcode::UnifyVoid => Inst::UnifyVoid { n: self.u8()? },
            Opcode::Allocate => Inst::Allocate { n: self.u8()? },
            Opcode::Deallocate => Inst::Deallocate,
            Opcode::Call => Inst::Call {
                f: self.functor()?,
                live: self.u8()?,
            },
            Opcode::Execute => Inst::Execute { f: self.functor()? },
            Opcode::Proceed => Inst::Proceed,
            Opcode::TryMeElse => Inst::TryMeElse { alt: self.target()? },
            Opcode::RetryMeElse => Inst::RetryMeElse { alt: self.target()? },
            Opcode::TrustMe => {
                self.u32()?;
                Inst::TrustMe
            }
            Opcode::Try => Inst::Try {
                target: self.target()?,
            },
            Opcode::Retry => Inst::Retry {
                target: self.target()?,
            },
            Opcode::Trust => Inst::Trust {
                target: self.target()?,
            },
            Opcode::NeckCut => Inst::NeckCut,
            Opcode::GetLevel => Inst::GetLevel { y: self.u8()? },
            Opcode::Cut => Inst::Cut { y: self.u8()? },
            Opcode::SwitchOnTerm => Inst::SwitchOnTerm {
                var: self.target()?,
                con: self.target()?,
                lis: self.target()?,
                str_: self.target()?,
            },
            Opcode::SwitchOnConstant => Inst::SwitchOnConstant {
                table: self.u32()?,
                slots: self.u32()?,
            },
            Opcode::SwitchOnStructure => Inst::SwitchOnStructure {
                table: self.u32()?,
                slots: self.u32()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::FunctorId;

    fn roundtrip(inst: Inst) {
        let mut bytes = vec![];
        let mut fixups = vec![];
        inst.encode(&mut bytes, &mut fixups);
        assert!(fixups.is_empty());
        let (decoded, len) = decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, inst);
        assert_eq!(len as usize, bytes.len());
    }

    #[test]
    fn encode_decode() {
        let f = Functor::new(FunctorId::from_u32(9), 2);
        roundtrip(Inst::PutVar {
            v: Slot::stack(3),
            a: 1,
        });
        roundtrip(Inst::GetStruc { f, x: 0 });
        roundtrip(Inst::Call { f, live: 2 });
        roundtrip(Inst::TryMeElse {
            alt: Target::Addr(0x1234),
        });
        roundtrip(Inst::TryMeElse { alt: Target::Fail });
        roundtrip(Inst::SwitchOnTerm {
            var: Target::Addr(1),
            con: Target::Addr(2),
            lis: Target::Fail,
            str_: Target::Addr(4),
        });
    }

    #[test]
    fn trust_me_is_as_wide_as_retry_me_else() {
        // Appending a clause repatches the previous chain tail in place.
        let mut trust = vec![];
        let mut retry = vec![];
        let mut fixups = vec![];
        Inst::TrustMe.encode(&mut trust, &mut fixups);
        Inst::RetryMeElse {
            alt: Target::Addr(0xdead),
        }
        .encode(&mut retry, &mut fixups);
        assert_eq!(trust.len(), retry.len());
    }

    #[test]
    fn label_operands_record_fixups() {
        let mut bytes = vec![];
        let mut fixups = vec![];
        let label = Label::from_u32(4);
        Inst::Try {
            target: Target::Label(label),
        }
        .encode(&mut bytes, &mut fixups);
        assert_eq!(
            fixups,
            vec![LabelUse { label, at: 1 }],
            "patch bytes follow the opcode"
        );
    }

    #[test]
    fn bad_opcode_is_an_error() {
        assert_eq!(
            decode_at(&[0xee], 0),
            Err(DecodeError::BadOpcode {
                opcode: 0xee,
                at: 0
            })
        );
    }
}
