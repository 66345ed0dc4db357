//! The control-flow graph: predecessor and successor sets per block.
//!
//! Grounded on `cranelift-codegen`'s `flowgraph.rs`: a `ControlFlowGraph` is a derived view
//! recomputed from a function's terminators rather than maintained incrementally as the function
//! is edited. Unlike the teacher, which keys edges by the `Inst` that causes them (to support
//! removing exactly one edge when a single branch changes), this crate's terminators carry their
//! targets as opcode immediates rather than operands, and every edge this crate's passes care about
//! is block-to-block, so predecessors and successors are plain block sets.

use crate::ir::{BlockRef, OptCodeContainer};
use kefir_collections::forest;
use kefir_entity::SecondaryMap;

#[derive(Clone, Default)]
struct CfgNode {
    predecessors: forest::Set<BlockRef>,
    successors: forest::Set<BlockRef>,
}

/// The predecessor/successor relation between a function's blocks, derived from its terminators.
///
/// A `ControlFlowGraph` does not track whether the function it was computed from has since
/// changed; callers that mutate control flow (inserting a pre-header, retargeting a branch) must
/// call [`ControlFlowGraph::compute`] again, or [`ControlFlowGraph::recompute_block`] for the
/// narrower case of a single block's terminator changing. [`ControlFlowGraph::is_valid`] only
/// tracks whether this graph has ever been computed at all, not whether it is stale.
#[derive(Default)]
pub struct ControlFlowGraph {
    data: SecondaryMap<BlockRef, CfgNode>,
    valid: bool,
}

impl ControlFlowGraph {
    /// Create an empty, invalid graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the graph from scratch by scanning every block's control-order terminator.
    pub fn compute(container: &OptCodeContainer) -> Self {
        let mut cfg = Self::new();
        cfg.rebuild(container);
        cfg
    }

    fn rebuild(&mut self, container: &OptCodeContainer) {
        self.clear();
        for &block in container.blocks() {
            self.compute_block(container, block);
        }
        self.valid = true;
    }

    fn compute_block(&mut self, container: &OptCodeContainer, block: BlockRef) {
        let targets = match container.control_tail(block) {
            Some(terminator) => container.opcode(terminator).branch_targets(),
            None => Vec::new(),
        };
        for target in targets {
            self.add_edge(block, target);
        }
    }

    fn add_edge(&mut self, from: BlockRef, to: BlockRef) {
        self.data[from].successors.insert(to);
        self.data[to].predecessors.insert(from);
    }

    /// Recompute a single block's outgoing edges after its terminator changed, without
    /// recomputing the whole graph. Removes every edge this block used to have as a predecessor of
    /// some other block, then re-derives its current successors.
    pub fn recompute_block(&mut self, container: &OptCodeContainer, block: BlockRef) {
        let stale_successors: Vec<BlockRef> = self.data[block].successors.iter().collect();
        for successor in stale_successors {
            self.data[successor].predecessors.remove(block);
        }
        self.data[block].successors.clear();
        self.compute_block(container, block);
    }

    /// Remove every edge. `is_valid` becomes `false`.
    pub fn clear(&mut self) {
        self.data.clear();
        self.valid = false;
    }

    /// Has this graph been computed at least once (and not cleared since)?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The blocks that branch directly to `block`.
    pub fn predecessors(&self, block: BlockRef) -> impl Iterator<Item = BlockRef> + '_ {
        self.data[block].predecessors.iter()
    }

    /// The blocks `block` branches directly to.
    pub fn successors(&self, block: BlockRef) -> impl Iterator<Item = BlockRef> + '_ {
        self.data[block].successors.iter()
    }

    /// Number of distinct predecessors of `block`.
    pub fn predecessor_count(&self, block: BlockRef) -> usize {
        self.data[block].predecessors.len()
    }

    /// Number of distinct successors of `block`.
    pub fn successor_count(&self, block: BlockRef) -> usize {
        self.data[block].successors.len()
    }
}
