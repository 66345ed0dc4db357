//! References to the entities that make up a function body.
//!
//! Every reference here is a plain index into a `PrimaryMap` owned by the `DataFlowGraph` or
//! `Layout`, not a pointer or a borrow, following the same discipline `Ebb`/`Value`/`Inst` follow
//! in the codegen core this container is grounded on: a reference stays valid and cheap to copy
//! across edits that only append, and is never mistaken for a reference into a different
//! function because `entity_impl!` gives each type its own incomparable `Debug`/`Display` prefix.

use kefir_entity::entity_impl;

/// A reference to a basic block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(u32);
entity_impl!(BlockRef, "block");

/// A reference to an instruction. Every instruction, including phis, has one of these; `PhiRef`
/// further narrows a reference known to name a phi.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrRef(u32);
entity_impl!(InstrRef, "instr");

/// A reference to a phi instruction, known by construction to be a `PHI` opcode.
///
/// Carried separately from `InstrRef` so APIs that only make sense for phis (splitting a phi at a
/// new pre-header, enumerating a phi's incoming links) cannot be handed an arbitrary instruction
/// by accident; converting back to the underlying `InstrRef` is always available via `instr()`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhiRef(u32);
entity_impl!(PhiRef, "phi");

impl PhiRef {
    /// Create a `PhiRef` from its raw `InstrRef`. The caller is responsible for the instruction
    /// actually being a `PHI`; `DataFlowGraph::phi` performs that check and is the usual way to
    /// obtain a `PhiRef`.
    pub fn from_instr_unchecked(instr: InstrRef) -> Self {
        Self(instr.index() as u32)
    }

    /// The underlying instruction reference.
    pub fn instr(self) -> InstrRef {
        InstrRef::new(self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kefir_entity::EntityRef;

    #[test]
    fn phi_ref_round_trips_through_instr_ref() {
        let instr = InstrRef::new(7);
        let phi = PhiRef::from_instr_unchecked(instr);
        assert_eq!(phi.instr(), instr);
    }

    #[test]
    fn display_prefixes_differ() {
        assert_eq!(format!("{}", BlockRef::new(3)), "block3");
        assert_eq!(format!("{}", InstrRef::new(3)), "instr3");
    }
}
