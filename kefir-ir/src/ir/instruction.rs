//! The data stored per instruction.

use crate::ir::{BlockRef, InstrRef, Opcode};
use kefir_entity::EntityList;

/// The opcode and operand list of a single instruction, as stored in a `DataFlowGraph`.
///
/// Operands are themselves `InstrRef`s: the opt-IR is a dense SSA-style container where every
/// instruction's result is identified by the instruction's own reference rather than by a
/// separate `Value` entity, so "operand" and "the instruction producing this operand's value" are
/// the same thing.
#[derive(Debug, Clone)]
pub struct InstructionData {
    /// The instruction's opcode.
    pub opcode: Opcode,
    /// The instruction's operands, in order.
    pub operands: EntityList<InstrRef>,
}

/// One incoming edge of a phi instruction: the value to select when control arrives from
/// `from_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiLink {
    /// The predecessor block this link corresponds to.
    pub from_block: BlockRef,
    /// The value selected when control arrives from `from_block`.
    pub value: InstrRef,
}

impl InstructionData {
    /// Create a new instruction with no operands.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: EntityList::new(),
        }
    }
}
