//! Tagged heap cells.
//!
//! The machine's data space is an array of fixed-width tagged words. A cell
//! packs an 8-bit tag and a 24-bit payload into a `u32`; the payload is a
//! cell address for the pointer tags and an interned functor id for `CON`.
//! A second word form, [`Functor`], describes a structure: the high 8 bits
//! carry the arity and the low 24 bits the interned name id. Descriptor
//! words only ever appear immediately behind a `STR` pointer, so the two
//! forms never need to be distinguished by inspection.

use crate::interner::FunctorId;
use core::fmt;
use num_enum::TryFromPrimitive;

/// Size of the argument/temporary register file. The register cells occupy
/// the prefix `[0, REG_COUNT)` of the heap array, so every register has an
/// ordinary cell address; the heap proper begins at `REG_COUNT`.
pub const REG_COUNT: u8 = 32;

/// Width of a cell payload in bits. Addresses and functor ids must fit.
pub const PAYLOAD_BITS: u32 = 24;

/// Mask selecting the payload of a cell word.
pub const PAYLOAD_MASK: u32 = (1 << PAYLOAD_BITS) - 1;

/// Cell tags. The discriminants are part of the external encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// A reference. Payload is a cell address; a cell whose payload is its
    /// own address is an unbound variable.
    Ref = 0x01,
    /// A structure pointer. Payload is the address of a functor descriptor
    /// cell, followed by the structure's argument cells.
    Str = 0x02,
    /// A constant. Payload is an interned functor id of arity 0.
    Con = 0x03,
    /// A list pair pointer. Payload is the address of the head cell; the
    /// tail cell follows it.
    Lis = 0x04,
}

/// A tagged data word.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Cell(u32);

impl Cell {
    /// Build a cell from a tag and payload.
    pub fn new(tag: Tag, payload: u32) -> Cell {
        debug_assert_eq!(payload & !PAYLOAD_MASK, 0, "payload out of range");
        Cell(((tag as u32) << PAYLOAD_BITS) | (payload & PAYLOAD_MASK))
    }

    /// A `REF` cell pointing at `addr`.
    pub fn reference(addr: u32) -> Cell {
        Cell::new(Tag::Ref, addr)
    }

    /// A `STR` cell pointing at the functor descriptor at `addr`.
    pub fn structure(addr: u32) -> Cell {
        Cell::new(Tag::Str, addr)
    }

    /// A `CON` cell for an arity-0 functor.
    pub fn constant(id: FunctorId) -> Cell {
        Cell::new(Tag::Con, id.as_u32())
    }

    /// A `LIS` cell pointing at the head of a two-cell pair at `addr`.
    pub fn list(addr: u32) -> Cell {
        Cell::new(Tag::Lis, addr)
    }

    /// The zero word. Not a legal tagged cell; reads of uninitialized
    /// memory surface as a tag error rather than silent misbehavior.
    pub fn empty() -> Cell {
        Cell(0)
    }

    /// The raw 32-bit word.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Rebuild a cell from its raw word.
    pub fn from_bits(bits: u32) -> Cell {
        Cell(bits)
    }

    /// The tag byte, unvalidated.
    pub fn raw_tag(self) -> u8 {
        (self.0 >> PAYLOAD_BITS) as u8
    }

    /// The tag, or `None` if the tag byte is outside the known set.
    pub fn tag(self) -> Option<Tag> {
        Tag::try_from(self.raw_tag()).ok()
    }

    /// The 24-bit payload.
    pub fn payload(self) -> u32 {
        self.0 & PAYLOAD_MASK
    }

    /// True if this cell is an unbound variable stored at `addr`.
    pub fn is_unbound_at(self, addr: u32) -> bool {
        self.tag() == Some(Tag::Ref) && self.payload() == addr
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.tag() {
            Some(tag) => write!(f, "<{tag:?},{}>", self.payload()),
            None => write!(f, "<raw {:#010x}>", self.0),
        }
    }
}

/// A functor: an interned name id plus an arity.
///
/// Interning already folds the arity into id assignment, so `id` alone
/// identifies the functor; the arity rides along because the machine needs
/// it as a number when writing descriptors and saving argument registers.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Functor {
    pub id: FunctorId,
    pub arity: u8,
}

impl Functor {
    pub fn new(id: FunctorId, arity: u8) -> Functor {
        Functor { id, arity }
    }

    /// Pack into a descriptor word: arity in the high 8 bits, id below.
    pub fn to_word(self) -> u32 {
        ((self.arity as u32) << PAYLOAD_BITS) | (self.id.as_u32() & PAYLOAD_MASK)
    }

    /// Unpack a descriptor word.
    pub fn from_word(word: u32) -> Functor {
        Functor {
            id: FunctorId::from_u32(word & PAYLOAD_MASK),
            arity: (word >> PAYLOAD_BITS) as u8,
        }
    }
}

impl fmt::Debug for Functor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}/{}", self.id.as_u32(), self.arity)
    }
}
