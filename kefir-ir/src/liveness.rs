//! Liveness analysis: which instructions' results are still needed at the boundary of each block.
//!
//! Standard backward dataflow to a fixpoint, grounded on `source/optimizer/analysis/local_variables.c`'s
//! `kefir_opt_code_liveness_build`, which stores a single per-block `alive_instr` bucket set rather
//! than separate live-in/live-out tables. This port keeps both (they are what the dataflow equations
//! are naturally stated over, and `is_alive` needs to distinguish "alive coming in" for some callers)
//! but also exposes the merged per-block set directly, since that is what `var_conflict` consumes.
//!
//! The original's `alive_instr` bucket set is seeded from both the block's live-in/live-out values
//! *and* its own definitions (that is how `kefir_opt_code_variable_conflicts_build` ever sees an
//! `ALLOC_LOCAL` that is defined and dies entirely within one block). `alive`/`is_alive`/`alive_instr`
//! below stay boundary-only, since some callers need exactly that distinction; `defined_or_alive`
//! reconstructs the original's wider per-block set for callers, like `var_conflict`, that need it.

use crate::flowgraph::ControlFlowGraph;
use crate::ir::{BlockRef, InstrRef, OptCodeContainer};
use kefir_collections::BucketSet;
use kefir_entity::{EntitySet, SecondaryMap};

/// Live-in, live-out, and combined alive-instruction sets for every block of a function.
#[derive(Default)]
pub struct Liveness {
    live_in: SecondaryMap<BlockRef, BucketSet<InstrRef>>,
    live_out: SecondaryMap<BlockRef, BucketSet<InstrRef>>,
    alive: SecondaryMap<BlockRef, BucketSet<InstrRef>>,
    def: SecondaryMap<BlockRef, EntitySet<InstrRef>>,
    valid: bool,
}

impl Liveness {
    /// Create an empty, invalid liveness result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute liveness for `container` over its already-computed control-flow graph.
    pub fn compute(container: &OptCodeContainer, cfg: &ControlFlowGraph) -> Self {
        let mut liveness = Self::new();
        liveness.rebuild(container, cfg);
        liveness
    }

    fn rebuild(&mut self, container: &OptCodeContainer, cfg: &ControlFlowGraph) {
        self.clear();
        let order = full_postorder(container, cfg);

        let mut def: SecondaryMap<BlockRef, EntitySet<InstrRef>> = SecondaryMap::new();
        let mut uses: SecondaryMap<BlockRef, BucketSet<InstrRef>> = SecondaryMap::new();
        for &block in &order {
            let (block_def, block_uses) = def_use(container, block);
            def[block] = block_def;
            uses[block] = block_uses;
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in &order {
                let mut new_live_out: BucketSet<InstrRef> = BucketSet::new();
                for succ in cfg.successors(block) {
                    for &value in self.live_in[succ].iter() {
                        new_live_out.insert(value);
                    }
                    for instr in container.def_order_iter(succ) {
                        let phi = match container.phi(instr) {
                            Some(phi) => phi,
                            None => continue,
                        };
                        for link in container.phi_links(phi) {
                            if link.from_block == block {
                                new_live_out.insert(link.value);
                            }
                        }
                    }
                }

                let mut new_live_in = uses[block].clone();
                for &value in new_live_out.iter() {
                    if !def[block].contains(value) {
                        new_live_in.insert(value);
                    }
                }

                let old_total = self.live_in[block].len() + self.live_out[block].len();
                let new_total = new_live_in.len() + new_live_out.len();
                if new_total != old_total {
                    changed = true;
                }
                self.live_in[block] = new_live_in;
                self.live_out[block] = new_live_out;
            }
        }

        for &block in &order {
            let mut alive = self.live_in[block].clone();
            alive.merge(&self.live_out[block]);
            self.alive[block] = alive;
        }
        self.def = def;
        self.valid = true;
    }

    /// Has liveness been computed at least once (and not cleared since)?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Remove every entry. `is_valid` becomes `false`.
    pub fn clear(&mut self) {
        self.live_in.clear();
        self.live_out.clear();
        self.alive.clear();
        self.def.clear();
        self.valid = false;
    }

    /// Is `instr`'s value live somewhere at `block`'s boundary (either coming in or going out)?
    pub fn is_alive(&self, instr: InstrRef, block: BlockRef) -> bool {
        self.alive[block].contains(&instr)
    }

    /// Every instruction alive at `block`'s boundary, in unspecified order.
    pub fn alive_instr(&self, block: BlockRef) -> impl Iterator<Item = InstrRef> + '_ {
        self.alive[block].iter().copied()
    }

    /// Every instruction defined in `block`, or alive at its boundary, in unspecified order.
    ///
    /// This is the per-block set `local_variables.c` actually iterates when classifying
    /// `ALLOC_LOCAL` instructions: a value defined and dead entirely within one block is in
    /// neither `live_in` nor `live_out`, but must still be visited for its allocation to be
    /// classified at all.
    pub fn defined_or_alive(&self, block: BlockRef) -> impl Iterator<Item = InstrRef> + '_ {
        let def = &self.def[block];
        def.keys()
            .filter(move |&instr| def.contains(instr))
            .chain(self.alive[block].iter().copied().filter(move |&instr| !def.contains(instr)))
    }

    /// The set of values live coming into `block`.
    pub fn live_in(&self, block: BlockRef) -> impl Iterator<Item = InstrRef> + '_ {
        self.live_in[block].iter().copied()
    }

    /// The set of values live going out of `block`.
    pub fn live_out(&self, block: BlockRef) -> impl Iterator<Item = InstrRef> + '_ {
        self.live_out[block].iter().copied()
    }
}

fn def_use(container: &OptCodeContainer, block: BlockRef) -> (EntitySet<InstrRef>, BucketSet<InstrRef>) {
    let mut def = EntitySet::new();
    for instr in container.def_order_iter(block) {
        def.insert(instr);
    }
    let mut uses = BucketSet::new();
    for instr in container.def_order_iter(block) {
        if container.is_phi(instr) {
            continue;
        }
        for &operand in container.operands(instr) {
            if !def.contains(operand) {
                uses.insert(operand);
            }
        }
    }
    (def, uses)
}

fn full_postorder(container: &OptCodeContainer, cfg: &ControlFlowGraph) -> Vec<BlockRef> {
    let mut visited = EntitySet::new();
    let mut postorder = Vec::new();
    for &root in container.blocks() {
        if visited.contains(root) {
            continue;
        }
        let mut stack: Vec<(BlockRef, std::vec::IntoIter<BlockRef>)> = Vec::new();
        visited.insert(root);
        stack.push((root, cfg.successors(root).collect::<Vec<_>>().into_iter()));
        while let Some(frame) = stack.last_mut() {
            match frame.1.next() {
                Some(successor) => {
                    if visited.insert(successor) {
                        let successors: Vec<BlockRef> = cfg.successors(successor).collect();
                        stack.push((successor, successors.into_iter()));
                    }
                }
                None => {
                    postorder.push(frame.0);
                    stack.pop();
                }
            }
        }
    }
    postorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn value_used_in_successor_is_live_out_of_predecessor() {
        let mut c = OptCodeContainer::new();
        let a = c.new_block();
        let b = c.new_block();
        c.set_entry_point(a).unwrap();
        let v = c.append_instruction(a, Opcode::IntConst(1), &[]).unwrap();
        c.append_instruction(a, Opcode::Jump(b), &[]).unwrap();
        c.append_instruction(b, Opcode::IntAdd, &[v, v]).unwrap();
        c.append_instruction(b, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let liveness = Liveness::compute(&c, &cfg);
        assert!(liveness.is_valid());
        assert!(liveness.live_out(a).collect::<Vec<_>>().contains(&v));
        assert!(liveness.live_in(b).collect::<Vec<_>>().contains(&v));
        assert!(!liveness.live_in(a).collect::<Vec<_>>().contains(&v));
    }

    #[test]
    fn locally_used_value_does_not_escape_its_block() {
        let mut c = OptCodeContainer::new();
        let block = c.new_block();
        c.set_entry_point(block).unwrap();
        let v = c.append_instruction(block, Opcode::IntConst(1), &[]).unwrap();
        c.append_instruction(block, Opcode::IntAdd, &[v, v]).unwrap();
        c.append_instruction(block, Opcode::Return, &[]).unwrap();
        let cfg = ControlFlowGraph::compute(&c);
        let liveness = Liveness::compute(&c, &cfg);
        assert!(!liveness.is_alive(v, block));
    }

    #[test]
    fn locally_used_value_still_appears_in_defined_or_alive() {
        let mut c = OptCodeContainer::new();
        let block = c.new_block();
        c.set_entry_point(block).unwrap();
        let v = c.append_instruction(block, Opcode::IntConst(1), &[]).unwrap();
        c.append_instruction(block, Opcode::IntAdd, &[v, v]).unwrap();
        c.append_instruction(block, Opcode::Return, &[]).unwrap();
        let cfg = ControlFlowGraph::compute(&c);
        let liveness = Liveness::compute(&c, &cfg);
        assert!(!liveness.is_alive(v, block));
        assert!(liveness.defined_or_alive(block).collect::<Vec<_>>().contains(&v));
    }

    #[test]
    fn phi_incoming_value_is_live_out_of_its_own_predecessor_only() {
        let mut c = OptCodeContainer::new();
        let entry = c.new_block();
        let left = c.new_block();
        let right = c.new_block();
        let join = c.new_block();
        c.set_entry_point(entry).unwrap();
        let cond = c.append_instruction(entry, Opcode::IntConst(1), &[]).unwrap();
        c.append_instruction(
            entry,
            Opcode::Branch {
                if_true: left,
                if_false: right,
            },
            &[cond],
        )
        .unwrap();
        let from_left = c.append_instruction(left, Opcode::IntConst(2), &[]).unwrap();
        c.append_instruction(left, Opcode::Jump(join), &[]).unwrap();
        let from_right = c.append_instruction(right, Opcode::IntConst(3), &[]).unwrap();
        c.append_instruction(right, Opcode::Jump(join), &[]).unwrap();
        let (phi, _phi_instr) = c.new_phi(join).unwrap();
        c.attach_phi(phi, left, from_left).unwrap();
        c.attach_phi(phi, right, from_right).unwrap();
        c.append_instruction(join, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let liveness = Liveness::compute(&c, &cfg);
        assert!(liveness.live_out(left).collect::<Vec<_>>().contains(&from_left));
        assert!(!liveness.live_out(right).collect::<Vec<_>>().contains(&from_left));
    }
}
