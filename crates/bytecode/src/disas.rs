//! Textual disassembly of encoded code.

use crate::inst::{decode_at, CodeOffset, DecodeError};
use crate::interner::Interner;
use core::fmt::Write;

/// Renders a byte slice of encoded instructions as one listing line per
/// instruction, `offset: mnemonic operands`.
pub struct Disassembler<'a> {
    bytes: &'a [u8],
    interner: Option<&'a Interner>,
    base: CodeOffset,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytes: &'a [u8]) -> Disassembler<'a> {
        Disassembler {
            bytes,
            interner: None,
            base: 0,
        }
    }

    /// Resolve functor operands to names in the listing.
    pub fn with_interner(mut self, interner: &'a Interner) -> Disassembler<'a> {
        self.interner = Some(interner);
        self
    }

    /// Display offsets relative to `base` instead of the slice start.
    pub fn base(mut self, base: CodeOffset) -> Disassembler<'a> {
        self.base = base;
        self
    }

    /// Decode and render every instruction in the slice.
    pub fn disas(&self) -> Result<String, DecodeError> {
        let mut out = String::new();
        let mut offset: CodeOffset = 0;
        while (offset as usize) < self.bytes.len() {
            let (inst, len) = decode_at(self.bytes, offset)?;
            writeln!(
                out,
                "{:>8x}: {}",
                self.base + offset,
                inst.display(self.interner)
            )
            .unwrap();
            offset += len;
        }
        Ok(out)
    }
}
