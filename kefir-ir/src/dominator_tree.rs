//! Dominance over the control-flow graph, computed with the iterative Cooper-Harvey-Kennedy
//! algorithm.
//!
//! Grounded on `cranelift-codegen`'s `dominator_tree.rs`, simplified to block-level dominance only:
//! the teacher additionally tracks dominance between individual instructions within a block (a
//! program-point refinement used by its instruction scheduler), which this crate's passes never
//! need since every query here — `is_dominator` for back-edge detection, dominance frontiers for
//! the loop analyses — operates at block granularity.

use crate::flowgraph::ControlFlowGraph;
use crate::ir::{BlockRef, OptCodeContainer};
use kefir_entity::packed_option::PackedOption;
use kefir_entity::{EntitySet, SecondaryMap};

/// The immediate-dominator relation between a function's reachable blocks.
///
/// Like [`ControlFlowGraph`], a `DominatorTree` is a snapshot: it must be recomputed after any
/// edit that changes control flow. Blocks unreachable from the entry point have no immediate
/// dominator and are never considered dominated by anything other than themselves.
#[derive(Default)]
pub struct DominatorTree {
    entry: Option<BlockRef>,
    idom: SecondaryMap<BlockRef, PackedOption<BlockRef>>,
    rpo_number: SecondaryMap<BlockRef, u32>,
    reachable: EntitySet<BlockRef>,
    valid: bool,
}

impl DominatorTree {
    /// Create an empty, invalid tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the dominator tree for `container`, given its already-computed control-flow graph.
    /// Returns an empty, invalid tree if `container` has no entry point.
    pub fn compute(container: &OptCodeContainer, cfg: &ControlFlowGraph) -> Self {
        let mut tree = Self::new();
        if let Some(entry) = container.entry_point() {
            tree.rebuild(cfg, entry);
        }
        tree
    }

    fn rebuild(&mut self, cfg: &ControlFlowGraph, entry: BlockRef) {
        self.entry = Some(entry);
        let postorder = postorder_from(cfg, entry);
        let rpo: Vec<BlockRef> = postorder.iter().rev().copied().collect();
        for (number, &block) in rpo.iter().enumerate() {
            self.rpo_number[block] = number as u32;
            self.reachable.insert(block);
        }

        self.idom[entry] = entry.into();
        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockRef> = None;
                for pred in cfg.predecessors(block) {
                    if !self.reachable.contains(pred) || self.idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(cur) => self.intersect(cur, pred),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if self.idom[block].expand() != Some(new_idom) {
                        self.idom[block] = new_idom.into();
                        changed = true;
                    }
                }
            }
        }
        self.valid = true;
    }

    fn intersect(&self, mut finger1: BlockRef, mut finger2: BlockRef) -> BlockRef {
        while finger1 != finger2 {
            while self.rpo_number[finger1] > self.rpo_number[finger2] {
                finger1 = self.idom[finger1].unwrap();
            }
            while self.rpo_number[finger2] > self.rpo_number[finger1] {
                finger2 = self.idom[finger2].unwrap();
            }
        }
        finger1
    }

    /// Has this tree been computed at least once (and not cleared since)?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Remove every entry. `is_valid` becomes `false`.
    pub fn clear(&mut self) {
        self.entry = None;
        self.idom.clear();
        self.rpo_number.clear();
        self.reachable.clear();
        self.valid = false;
    }

    /// Is `block` reachable from the entry point?
    pub fn is_reachable(&self, block: BlockRef) -> bool {
        self.reachable.contains(block)
    }

    /// `block`'s immediate dominator, or `None` if `block` is the entry point or is unreachable.
    pub fn immediate_dominator(&self, block: BlockRef) -> Option<BlockRef> {
        if Some(block) == self.entry || !self.is_reachable(block) {
            return None;
        }
        self.idom[block].expand()
    }

    /// Does `a` dominate `b`? Every block dominates itself; an unreachable block is dominated by
    /// nothing (including itself is still true by the first check, but it dominates no one else).
    pub fn is_dominator(&self, a: BlockRef, b: BlockRef) -> bool {
        if a == b {
            return self.is_reachable(b) || Some(b) == self.entry;
        }
        if !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            let idom = match self.idom[cur].expand() {
                Some(idom) => idom,
                None => return false,
            };
            if idom == cur {
                // `cur` is the entry point and does not equal `a`: chain exhausted.
                return false;
            }
            if idom == a {
                return true;
            }
            cur = idom;
        }
    }

    /// The number of steps from `block` up to the entry point along immediate dominators, with
    /// the entry point itself at depth 0. `None` if `block` is unreachable.
    pub fn dominance_tree_depth(&self, block: BlockRef) -> Option<u32> {
        if !self.is_reachable(block) {
            return None;
        }
        let mut depth = 0;
        let mut cur = block;
        while let Some(idom) = self.immediate_dominator(cur) {
            depth += 1;
            cur = idom;
        }
        Some(depth)
    }

    /// The dominance frontier of every reachable block: for each block `b`, the set of blocks `f`
    /// such that `b` dominates a predecessor of `f` but does not strictly dominate `f` itself.
    /// Computed with Cytron et al.'s join-point algorithm.
    pub fn dominance_frontiers(&self, cfg: &ControlFlowGraph) -> SecondaryMap<BlockRef, Vec<BlockRef>> {
        let mut frontier: SecondaryMap<BlockRef, Vec<BlockRef>> = SecondaryMap::new();
        for block in self.reachable.keys() {
            if !self.is_reachable(block) || cfg.predecessor_count(block) < 2 {
                continue;
            }
            let idom_block = match self.immediate_dominator(block) {
                Some(idom) => idom,
                None => continue,
            };
            for pred in cfg.predecessors(block) {
                if !self.is_reachable(pred) {
                    continue;
                }
                let mut runner = pred;
                while runner != idom_block {
                    if !frontier[runner].contains(&block) {
                        frontier[runner].push(block);
                    }
                    runner = match self.immediate_dominator(runner) {
                        Some(idom) => idom,
                        None => break,
                    };
                }
            }
        }
        frontier
    }
}

fn postorder_from(cfg: &ControlFlowGraph, entry: BlockRef) -> Vec<BlockRef> {
    let mut visited = EntitySet::new();
    let mut postorder = Vec::new();
    let mut stack: Vec<(BlockRef, std::vec::IntoIter<BlockRef>)> = Vec::new();

    visited.insert(entry);
    stack.push((entry, cfg.successors(entry).collect::<Vec<_>>().into_iter()));

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
    postorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn entry_has_no_immediate_dominator() {
        let mut c = OptCodeContainer::new();
        let entry = c.new_block();
        c.set_entry_point(entry).unwrap();
        c.append_instruction(entry, Opcode::Return, &[]).unwrap();
        let cfg = ControlFlowGraph::compute(&c);
        let tree = DominatorTree::compute(&c, &cfg);
        assert!(tree.is_valid());
        assert_eq!(tree.immediate_dominator(entry), None);
        assert!(tree.is_dominator(entry, entry));
    }

    #[test]
    fn straight_line_chain_dominates_transitively() {
        let mut c = OptCodeContainer::new();
        let a = c.new_block();
        let b = c.new_block();
        let d = c.new_block();
        c.set_entry_point(a).unwrap();
        c.append_instruction(a, Opcode::Jump(b), &[]).unwrap();
        c.append_instruction(b, Opcode::Jump(d), &[]).unwrap();
        c.append_instruction(d, Opcode::Return, &[]).unwrap();
        let cfg = ControlFlowGraph::compute(&c);
        let tree = DominatorTree::compute(&c, &cfg);
        assert_eq!(tree.immediate_dominator(b), Some(a));
        assert_eq!(tree.immediate_dominator(d), Some(b));
        assert!(tree.is_dominator(a, d));
        assert_eq!(tree.dominance_tree_depth(d), Some(2));
    }

    #[test]
    fn diamond_join_point_is_dominated_only_by_the_shared_ancestor() {
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
        c.append_instruction(left, Opcode::Jump(join), &[]).unwrap();
        c.append_instruction(right, Opcode::Jump(join), &[]).unwrap();
        c.append_instruction(join, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let tree = DominatorTree::compute(&c, &cfg);
        assert_eq!(tree.immediate_dominator(join), Some(entry));
        assert!(!tree.is_dominator(left, join));
        assert!(!tree.is_dominator(right, join));
        assert!(tree.is_dominator(entry, join));

        let frontiers = tree.dominance_frontiers(&cfg);
        assert_eq!(frontiers[left], vec![join]);
        assert_eq!(frontiers[right], vec![join]);
    }

    #[test]
    fn unreachable_block_has_no_dominator_and_dominates_nothing() {
        let mut c = OptCodeContainer::new();
        let entry = c.new_block();
        let unreachable = c.new_block();
        c.set_entry_point(entry).unwrap();
        c.append_instruction(entry, Opcode::Return, &[]).unwrap();
        c.append_instruction(unreachable, Opcode::Return, &[]).unwrap();
        let cfg = ControlFlowGraph::compute(&c);
        let tree = DominatorTree::compute(&c, &cfg);
        assert!(!tree.is_reachable(unreachable));
        assert_eq!(tree.immediate_dominator(unreachable), None);
        assert!(!tree.is_dominator(unreachable, entry));
        assert!(!tree.is_dominator(entry, unreachable));
    }
}
