//! Static initializer data produced by the front-end for an object with static storage duration.
//!
//! `IrData` is opaque cargo: the optimizer core stores it verbatim and never interprets or
//! rewrites a slot's contents, the same way the codegen core this crate is grounded on treats a
//! `DataContext`'s initializer bytes as payload it moves around but never inspects.

/// One initializer slot's value.
#[derive(Debug, Clone, PartialEq)]
pub enum IrDataValue {
    /// A plain signed integer of the given bit width.
    Integer {
        /// Width in bits (8, 16, 32, or 64).
        bits: u8,
        /// The value, sign-extended to 64 bits.
        value: i64,
    },
    /// A floating-point constant.
    Float {
        /// Width in bits (32 or 64).
        bits: u8,
        /// The value.
        value: f64,
    },
    /// A pointer-sized reference to another identifier (see [`crate::ir::identifiers`]), plus a
    /// byte offset from its start.
    PointerToSymbol {
        /// The referenced identifier's index in the translation unit's identifier table.
        symbol: u32,
        /// Offset in bytes from the start of the referenced object.
        offset: i64,
    },
    /// A pointer to a string literal held elsewhere in the translation unit.
    StringPointer(u32),
    /// Opaque initializer bytes, copied verbatim into the slot.
    RawBytes(Vec<u8>),
    /// Marks the start or end of a nested aggregate (struct/union/array) within the slot
    /// sequence, so a flat `Vec<IrDataSlot>` can still represent nested initializers.
    AggregateMarker(AggregateBoundary),
    /// A packed run of bitfield chunks sharing a single storage unit.
    BitfieldChunks(Vec<BitfieldChunk>),
}

/// Which end of a nested aggregate an [`IrDataValue::AggregateMarker`] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateBoundary {
    /// The start of a nested aggregate.
    Begin,
    /// The end of a nested aggregate.
    End,
}

/// One bitfield's value and position within a shared storage unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitfieldChunk {
    /// Offset, in bits, from the start of the storage unit.
    pub bit_offset: u32,
    /// Width in bits.
    pub bit_width: u32,
    /// The bitfield's value, right-justified.
    pub value: u64,
}

/// One initializer slot: its byte offset within the object and the value stored there.
#[derive(Debug, Clone, PartialEq)]
pub struct IrDataSlot {
    /// Byte offset of this slot within the object being initialized.
    pub offset: u64,
    /// The slot's value.
    pub value: IrDataValue,
}

/// Static initializer data for one object, as a flat, offset-ordered sequence of slots.
#[derive(Debug, Clone, Default)]
pub struct IrData {
    slots: Vec<IrDataSlot>,
}

impl IrData {
    /// Create an empty initializer (equivalent to a fully zero-initialized object).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot. Slots are expected to be appended in non-decreasing offset order by the
    /// producer; this type does not sort or validate that itself.
    pub fn push_slot(&mut self, offset: u64, value: IrDataValue) {
        self.slots.push(IrDataSlot { offset, value });
    }

    /// The slots, in the order they were pushed.
    pub fn slots(&self) -> &[IrDataSlot] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_preserve_insertion_order() {
        let mut data = IrData::new();
        data.push_slot(0, IrDataValue::Integer { bits: 32, value: 1 });
        data.push_slot(4, IrDataValue::Float { bits: 64, value: 2.5 });
        assert_eq!(data.slots().len(), 2);
        assert_eq!(data.slots()[0].offset, 0);
        assert_eq!(data.slots()[1].offset, 4);
    }
}
