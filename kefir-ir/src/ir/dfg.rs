//! Instruction and block storage, operand use-lists, and phi incoming-edge bookkeeping.
//!
//! Split out from `OptCodeContainer` the way the codegen core this crate is grounded on splits
//! its own `DataFlowGraph` from `Layout`: this module owns *what* an instruction is and who
//! references it, `layout` owns *where* it sits relative to its neighbors.

use crate::ir::instruction::{InstructionData, PhiLink};
use crate::ir::{BlockRef, InstrRef, Opcode, PhiRef};
use kefir_entity::{EntityList, EntityRef, ListPool, PrimaryMap, SecondaryMap};

/// Minimal per-block data not related to instruction ordering (that lives in `Layout`).
#[derive(Clone, Default)]
pub struct BlockData {
    /// Whether this is the function's designated entry point.
    pub is_entry: bool,
}

/// The definitions and uses making up a function body.
#[derive(Default)]
pub struct DataFlowGraph {
    insts: PrimaryMap<InstrRef, InstructionData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    phi_links: SecondaryMap<InstrRef, Vec<PhiLink>>,
    uses: SecondaryMap<InstrRef, Vec<InstrRef>>,
    operand_pool: ListPool<InstrRef>,
}

impl DataFlowGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, empty block.
    pub fn make_block(&mut self) -> BlockRef {
        self.blocks.push(BlockData::default())
    }

    /// Is `block` a valid reference into this graph?
    pub fn is_valid_block(&self, block: BlockRef) -> bool {
        block.index() < self.blocks.len()
    }

    /// Is `instr` a valid reference into this graph?
    pub fn is_valid_instr(&self, instr: InstrRef) -> bool {
        instr.index() < self.insts.len()
    }

    /// Mark `block` as the function's entry point.
    pub fn set_entry(&mut self, block: BlockRef) {
        self.blocks[block].is_entry = true;
    }

    /// Is `block` the function's entry point?
    pub fn is_entry(&self, block: BlockRef) -> bool {
        self.blocks[block].is_entry
    }

    /// Number of blocks allocated so far.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Allocate a new instruction with the given opcode and operands, recording the use-edge from
    /// each operand to this new instruction.
    pub fn make_instruction(&mut self, opcode: Opcode, operands: &[InstrRef]) -> InstrRef {
        let operand_list = EntityList::from_slice(operands, &mut self.operand_pool);
        let instr = self.insts.push(InstructionData {
            opcode,
            operands: operand_list,
        });
        for &operand in operands {
            self.uses[operand].push(instr);
        }
        instr
    }

    /// The opcode of `instr`.
    pub fn opcode(&self, instr: InstrRef) -> Opcode {
        self.insts[instr].opcode
    }

    /// The operands of `instr`, in order.
    pub fn operands(&self, instr: InstrRef) -> &[InstrRef] {
        self.insts[instr].operands.as_slice(&self.operand_pool)
    }

    /// The direct users of `instr`: every instruction that currently has `instr` as one of its
    /// operands, or (for a phi output) as an incoming value.
    pub fn uses(&self, instr: InstrRef) -> &[InstrRef] {
        &self.uses[instr]
    }

    /// Number of direct users of `instr`.
    pub fn use_count(&self, instr: InstrRef) -> usize {
        self.uses[instr].len()
    }

    /// Allocate a phi instruction with no incoming edges yet. The phi's own `InstrRef` is its
    /// output value, usable anywhere an operand is expected.
    pub fn make_phi(&mut self) -> (PhiRef, InstrRef) {
        let instr = self.insts.push(InstructionData::new(Opcode::Phi));
        (PhiRef::from_instr_unchecked(instr), instr)
    }

    /// Is `instr` a phi?
    pub fn is_phi(&self, instr: InstrRef) -> bool {
        self.insts[instr].opcode.is_phi()
    }

    /// Narrow `instr` to a `PhiRef`, if it is in fact a phi.
    pub fn phi(&self, instr: InstrRef) -> Option<PhiRef> {
        if self.is_phi(instr) {
            Some(PhiRef::from_instr_unchecked(instr))
        } else {
            None
        }
    }

    /// The incoming links currently attached to `phi`.
    pub fn phi_links(&self, phi: PhiRef) -> &[PhiLink] {
        &self.phi_links[phi.instr()]
    }

    /// Attach a new incoming edge to `phi`, recording the use-edge from `value` to the phi.
    pub fn attach_phi_link(&mut self, phi: PhiRef, from_block: BlockRef, value: InstrRef) {
        self.phi_links[phi.instr()].push(PhiLink { from_block, value });
        self.uses[value].push(phi.instr());
    }

    /// Remove every incoming edge attached to `phi` coming from `from_block`, if any, undoing the
    /// matching use-edge. Returns the removed links.
    pub fn detach_phi_links_from(&mut self, phi: PhiRef, from_block: BlockRef) -> Vec<PhiLink> {
        let links = &mut self.phi_links[phi.instr()];
        let mut removed = Vec::new();
        links.retain(|link| {
            if link.from_block == from_block {
                removed.push(*link);
                false
            } else {
                true
            }
        });
        for link in &removed {
            remove_one(&mut self.uses[link.value], phi.instr());
        }
        removed
    }

    /// Rewrite every use of `old` to `new`: every instruction operand and every phi incoming
    /// value. After this call `use_count(old) == 0`. Pushes one reverse edge into `new`'s
    /// use-list per rewritten slot, so a user that named `old` in more than one operand slot (or
    /// as more than one phi incoming value) contributes that many edges to `new`, matching
    /// `make_instruction`'s one-edge-per-slot convention instead of collapsing them.
    pub fn replace_references(&mut self, old: InstrRef, new: InstrRef) {
        let users = std::mem::take(&mut self.uses[old]);
        for user in &users {
            let operand_list = self.insts[*user].operands;
            let slice = operand_list.as_slice(&self.operand_pool).to_vec();
            let mut rewritten_slots = 0usize;
            let rewritten: Vec<InstrRef> = slice
                .iter()
                .map(|&o| {
                    if o == old {
                        rewritten_slots += 1;
                        new
                    } else {
                        o
                    }
                })
                .collect();
            self.insts[*user].operands = EntityList::from_slice(&rewritten, &mut self.operand_pool);

            if let Some(phi) = self.phi(*user) {
                for link in self.phi_links[phi.instr()].iter_mut() {
                    if link.value == old {
                        link.value = new;
                        rewritten_slots += 1;
                    }
                }
            }

            for _ in 0..rewritten_slots {
                self.uses[new].push(*user);
            }
        }
    }

    /// Remove the use-edges from every operand of `instr` to `instr` itself. Called when
    /// dropping an instruction, after confirming its own use-list is empty.
    pub fn release_operands(&mut self, instr: InstrRef) {
        let operands: Vec<InstrRef> = self.operands(instr).to_vec();
        for operand in operands {
            remove_one(&mut self.uses[operand], instr);
        }
        if let Some(phi) = self.phi(instr) {
            let links = std::mem::take(&mut self.phi_links[phi.instr()]);
            for link in links {
                remove_one(&mut self.uses[link.value], instr);
            }
        }
    }

    /// Rewrite a terminator's embedded branch target(s) naming `old_block` to name `new_block`
    /// instead. `Jump`/`Branch` carry their targets as immediates on the opcode rather than as
    /// operands, so this mutates `opcode` directly rather than going through the operand list;
    /// `Branch`'s two arms are rewritten independently, covering a self-branch (`if_true ==
    /// if_false == old_block`).
    pub fn retarget_branch(&mut self, instr: InstrRef, old_block: BlockRef, new_block: BlockRef) {
        let opcode = &mut self.insts[instr].opcode;
        *opcode = match *opcode {
            Opcode::Jump(target) if target == old_block => Opcode::Jump(new_block),
            Opcode::Branch { if_true, if_false } => Opcode::Branch {
                if_true: if if_true == old_block { new_block } else { if_true },
                if_false: if if_false == old_block { new_block } else { if_false },
            },
            other => other,
        };
    }
}

fn remove_one(users: &mut Vec<InstrRef>, target: InstrRef) {
    if let Some(pos) = users.iter().position(|&u| u == target) {
        users.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_instruction_records_uses() {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.make_instruction(Opcode::IntConst(1), &[]);
        let b = dfg.make_instruction(Opcode::IntAdd, &[a, a]);
        assert_eq!(dfg.use_count(a), 2);
        assert_eq!(dfg.operands(b), &[a, a]);
    }

    #[test]
    fn replace_references_moves_uses() {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.make_instruction(Opcode::IntConst(1), &[]);
        let b = dfg.make_instruction(Opcode::IntConst(2), &[]);
        let c = dfg.make_instruction(Opcode::IntAdd, &[a, a]);
        dfg.replace_references(a, b);
        assert_eq!(dfg.use_count(a), 0);
        // `c` named `a` in two operand slots, so `b` picks up two reverse edges, not one: the
        // multiset convention `make_instruction` establishes must survive a replacement.
        assert_eq!(dfg.use_count(b), 2);
        assert_eq!(dfg.operands(c), &[b, b]);
    }

    #[test]
    fn phi_links_track_uses() {
        let mut dfg = DataFlowGraph::new();
        let block0 = dfg.make_block();
        let block1 = dfg.make_block();
        let a = dfg.make_instruction(Opcode::IntConst(1), &[]);
        let (phi, phi_instr) = dfg.make_phi();
        dfg.attach_phi_link(phi, block0, a);
        assert_eq!(dfg.use_count(a), 1);
        let removed = dfg.detach_phi_links_from(phi, block0);
        assert_eq!(removed.len(), 1);
        assert_eq!(dfg.use_count(a), 0);
        assert_eq!(dfg.phi_links(phi).len(), 0);
        let _ = block1;
        let _ = phi_instr;
    }

    #[test]
    fn release_operands_clears_use_edges_before_drop() {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.make_instruction(Opcode::IntConst(1), &[]);
        let b = dfg.make_instruction(Opcode::IntAdd, &[a, a]);
        dfg.release_operands(b);
        assert_eq!(dfg.use_count(a), 0);
    }

    #[test]
    fn retarget_branch_rewrites_embedded_jump_target() {
        let mut dfg = DataFlowGraph::new();
        let old_target = dfg.make_block();
        let new_target = dfg.make_block();
        let jump = dfg.make_instruction(Opcode::Jump(old_target), &[]);
        dfg.retarget_branch(jump, old_target, new_target);
        assert_eq!(dfg.opcode(jump), Opcode::Jump(new_target));
    }

    #[test]
    fn retarget_branch_rewrites_both_arms_independently() {
        let mut dfg = DataFlowGraph::new();
        let old_target = dfg.make_block();
        let other = dfg.make_block();
        let new_target = dfg.make_block();
        let branch = dfg.make_instruction(
            Opcode::Branch {
                if_true: old_target,
                if_false: other,
            },
            &[],
        );
        dfg.retarget_branch(branch, old_target, new_target);
        assert_eq!(
            dfg.opcode(branch),
            Opcode::Branch {
                if_true: new_target,
                if_false: other,
            }
        );
    }
}
