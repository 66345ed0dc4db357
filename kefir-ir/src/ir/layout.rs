//! The two orthogonal orderings of instructions within a function: definition order and control
//! order.
//!
//! Both are intrusive doubly linked lists threaded through `SecondaryMap`-stored nodes rather than
//! a `Vec<InstrRef>` per block, so splicing an instruction in or out is O(1) and does not
//! invalidate any other instruction's position, matching how the codegen core this container is
//! grounded on threads its own instruction layout through `Inst`-keyed links rather than moving
//! elements in a vector.

use crate::ir::{BlockRef, InstrRef};
use kefir_entity::packed_option::PackedOption;
use kefir_entity::SecondaryMap;

#[derive(Clone, Copy, Default)]
struct InstrNode {
    block: PackedOption<BlockRef>,
    def_prev: PackedOption<InstrRef>,
    def_next: PackedOption<InstrRef>,
    in_control_order: bool,
    control_prev: PackedOption<InstrRef>,
    control_next: PackedOption<InstrRef>,
}

#[derive(Clone, Copy, Default)]
struct BlockNode {
    def_first: PackedOption<InstrRef>,
    def_last: PackedOption<InstrRef>,
    control_first: PackedOption<InstrRef>,
    control_last: PackedOption<InstrRef>,
}

/// Tracks, for every block, its definition-order instruction sequence and the (sparser)
/// control-order subsequence.
#[derive(Default)]
pub struct Layout {
    insts: SecondaryMap<InstrRef, InstrNode>,
    blocks: SecondaryMap<BlockRef, BlockNode>,
    block_order: Vec<BlockRef>,
}

impl Layout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly created, empty block.
    pub fn append_block(&mut self, block: BlockRef) {
        self.blocks[block] = BlockNode::default();
        self.block_order.push(block);
    }

    /// Blocks in the order they were created.
    pub fn block_order(&self) -> &[BlockRef] {
        &self.block_order
    }

    /// Which block `instr` currently belongs to, if it has been placed.
    pub fn block_of(&self, instr: InstrRef) -> Option<BlockRef> {
        self.insts[instr].block.expand()
    }

    /// Append `instr` to the end of `block`'s definition order. If `in_control_order` is set, it
    /// is also appended to the end of the control order.
    pub fn append_instruction(&mut self, block: BlockRef, instr: InstrRef, in_control_order: bool) {
        let prev_last = self.blocks[block].def_last.expand();
        self.insts[instr] = InstrNode {
            block: block.into(),
            def_prev: prev_last.into(),
            def_next: None.into(),
            in_control_order,
            control_prev: None.into(),
            control_next: None.into(),
        };
        match prev_last {
            Some(last) => self.insts[last].def_next = instr.into(),
            None => self.blocks[block].def_first = instr.into(),
        }
        self.blocks[block].def_last = instr.into();

        if in_control_order {
            let prev_control_last = self.blocks[block].control_last.expand();
            self.insts[instr].control_prev = prev_control_last.into();
            match prev_control_last {
                Some(last) => self.insts[last].control_next = instr.into(),
                None => self.blocks[block].control_first = instr.into(),
            }
            self.blocks[block].control_last = instr.into();
        }
    }

    /// Prepend `instr` to the head of `block`'s definition order (used for phis, which are
    /// always definition-order-only and live at the head of their block).
    pub fn prepend_instruction(&mut self, block: BlockRef, instr: InstrRef) {
        let prev_first = self.blocks[block].def_first.expand();
        self.insts[instr] = InstrNode {
            block: block.into(),
            def_prev: None.into(),
            def_next: prev_first.into(),
            in_control_order: false,
            control_prev: None.into(),
            control_next: None.into(),
        };
        match prev_first {
            Some(first) => self.insts[first].def_prev = instr.into(),
            None => self.blocks[block].def_last = instr.into(),
        }
        self.blocks[block].def_first = instr.into();
    }

    /// Remove `instr` from both orderings. The instruction's node is cleared; its `InstrRef` must
    /// not be looked up in the layout again.
    pub fn remove(&mut self, instr: InstrRef) {
        let node = self.insts[instr];
        let block = node.block.expand().expect("remove of unplaced instruction");

        match node.def_prev.expand() {
            Some(prev) => self.insts[prev].def_next = node.def_next,
            None => self.blocks[block].def_first = node.def_next,
        }
        match node.def_next.expand() {
            Some(next) => self.insts[next].def_prev = node.def_prev,
            None => self.blocks[block].def_last = node.def_prev,
        }

        if node.in_control_order {
            match node.control_prev.expand() {
                Some(prev) => self.insts[prev].control_next = node.control_next,
                None => self.blocks[block].control_first = node.control_next,
            }
            match node.control_next.expand() {
                Some(next) => self.insts[next].control_prev = node.control_prev,
                None => self.blocks[block].control_last = node.control_prev,
            }
        }

        self.insts[instr] = InstrNode::default();
    }

    /// Relocate `instr` to the end of `target`'s definition order. `instr` must not currently be
    /// in control order (LICM only ever relocates side-effect-free, non-control-flow
    /// instructions, the only kind this layout ever places outside control order).
    pub fn move_to(&mut self, target: BlockRef, instr: InstrRef) {
        debug_assert!(!self.insts[instr].in_control_order);
        self.remove(instr);
        self.append_instruction(target, instr, false);
    }

    /// The last instruction in `block`'s control order, i.e. its terminator, if placed.
    pub fn control_tail(&self, block: BlockRef) -> Option<InstrRef> {
        self.blocks[block].control_last.expand()
    }

    /// The first instruction in `block`'s control order.
    pub fn control_head(&self, block: BlockRef) -> Option<InstrRef> {
        self.blocks[block].control_first.expand()
    }

    /// The instruction following `instr` in control order, within the same block.
    pub fn control_next(&self, instr: InstrRef) -> Option<InstrRef> {
        self.insts[instr].control_next.expand()
    }

    /// The instruction preceding `instr` in control order, within the same block.
    pub fn control_prev(&self, instr: InstrRef) -> Option<InstrRef> {
        self.insts[instr].control_prev.expand()
    }

    /// The first instruction in `block`'s definition order.
    pub fn def_head(&self, block: BlockRef) -> Option<InstrRef> {
        self.blocks[block].def_first.expand()
    }

    /// The last instruction in `block`'s definition order.
    pub fn def_tail(&self, block: BlockRef) -> Option<InstrRef> {
        self.blocks[block].def_last.expand()
    }

    /// The instruction following `instr` in definition order, within the same block.
    pub fn def_next(&self, instr: InstrRef) -> Option<InstrRef> {
        self.insts[instr].def_next.expand()
    }

    /// The instruction preceding `instr` in definition order, within the same block.
    pub fn def_prev(&self, instr: InstrRef) -> Option<InstrRef> {
        self.insts[instr].def_prev.expand()
    }

    /// Iterate `block`'s instructions in definition order.
    pub fn def_order_iter(&self, block: BlockRef) -> DefOrderIter<'_> {
        DefOrderIter {
            layout: self,
            cur: self.def_head(block),
        }
    }

    /// Iterate `block`'s instructions in control order.
    pub fn control_order_iter(&self, block: BlockRef) -> ControlOrderIter<'_> {
        ControlOrderIter {
            layout: self,
            cur: self.control_head(block),
        }
    }
}

/// Iterator over a block's instructions in definition order.
pub struct DefOrderIter<'a> {
    layout: &'a Layout,
    cur: Option<InstrRef>,
}

impl<'a> Iterator for DefOrderIter<'a> {
    type Item = InstrRef;

    fn next(&mut self) -> Option<InstrRef> {
        let cur = self.cur?;
        self.cur = self.layout.def_next(cur);
        Some(cur)
    }
}

/// Iterator over a block's instructions in control order.
pub struct ControlOrderIter<'a> {
    layout: &'a Layout,
    cur: Option<InstrRef>,
}

impl<'a> Iterator for ControlOrderIter<'a> {
    type Item = InstrRef;

    fn next(&mut self) -> Option<InstrRef> {
        let cur = self.cur?;
        self.cur = self.layout.control_next(cur);
        Some(cur)
    }
}
