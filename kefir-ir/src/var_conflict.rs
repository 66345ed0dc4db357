//! Partitions a function's `ALLOC_LOCAL` instructions into globally-alive and locally-alive, and
//! builds a conflict set for each locally-alive allocation.
//!
//! Grounded on `kefir_opt_code_variable_conflicts_build` in
//! `source/optimizer/analysis/local_variables.c`: an allocation with at least one
//! `LOCAL_LIFETIME_MARK` user has its storage reusable once its lifetime ends, so the back-end
//! needs to know which other such allocations are ever alive at the same time (a conflict, forcing
//! distinct stack slots); an allocation with no lifetime marks is conservatively alive for the
//! whole function and never needs a conflict set.

use crate::ir::{InstrRef, LifetimeMarkKind, OptCodeContainer, Opcode};
use crate::liveness::Liveness;
use std::collections::HashMap;

/// The global/local partition of a function's `ALLOC_LOCAL` instructions, with a conflict set per
/// locally-alive allocation.
#[derive(Default)]
pub struct VariableConflicts {
    globally_alive: kefir_collections::HashSet<InstrRef>,
    locally_alive: HashMap<InstrRef, kefir_collections::HashSet<InstrRef>>,
    valid: bool,
}

impl VariableConflicts {
    /// Create an empty, invalid result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the partition and conflict sets for `container`, given its already-computed
    /// liveness. Visits every block's defined-or-alive set in block order, matching the
    /// original's per-block `alive_instr` scan, which includes a block's own definitions (an
    /// `ALLOC_LOCAL` that is defined and dies entirely within one block still needs to be
    /// classified, even though it never reaches `live_in`/`live_out`).
    pub fn build(container: &OptCodeContainer, liveness: &Liveness) -> Self {
        let mut vars = Self::new();
        for &block in container.blocks() {
            let alive: Vec<InstrRef> = liveness.defined_or_alive(block).collect();
            for &instr_ref in &alive {
                vars.process_instr(container, &alive, instr_ref);
            }
        }
        vars.valid = true;
        vars
    }

    fn process_instr(&mut self, container: &OptCodeContainer, alive_in_block: &[InstrRef], instr_ref: InstrRef) {
        if self.globally_alive.contains(&instr_ref) {
            return;
        }
        if container.opcode(instr_ref) != Opcode::AllocLocal {
            return;
        }

        if !self.locally_alive.contains_key(&instr_ref) {
            if has_local_lifetime_marks(container, instr_ref) {
                self.locally_alive.insert(instr_ref, kefir_collections::HashSet::new());
            } else {
                self.globally_alive.insert(instr_ref);
                return;
            }
        }

        for &conflict_ref in alive_in_block {
            if conflict_ref == instr_ref {
                continue;
            }
            if container.opcode(conflict_ref) != Opcode::AllocLocal {
                continue;
            }
            if has_local_lifetime_marks(container, conflict_ref) {
                self.locally_alive.get_mut(&instr_ref).unwrap().insert(conflict_ref);
            }
        }
    }

    /// Has this partition been built at least once (and not cleared since)?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Is `instr_ref` a globally-alive allocation?
    pub fn is_globally_alive(&self, instr_ref: InstrRef) -> bool {
        self.globally_alive.contains(&instr_ref)
    }

    /// Is `instr_ref` a locally-alive allocation (one with a conflict set)?
    pub fn is_locally_alive(&self, instr_ref: InstrRef) -> bool {
        self.locally_alive.contains_key(&instr_ref)
    }

    /// The conflict set of a locally-alive allocation: every other locally-alive allocation ever
    /// co-alive with it in some block. `None` if `instr_ref` is not locally-alive.
    pub fn conflicts_of(&self, instr_ref: InstrRef) -> Option<impl Iterator<Item = InstrRef> + '_> {
        self.locally_alive.get(&instr_ref).map(|set| set.iter().copied())
    }
}

fn has_local_lifetime_marks(container: &OptCodeContainer, instr_ref: InstrRef) -> bool {
    container
        .uses(instr_ref)
        .iter()
        .any(|&user| matches!(container.opcode(user), Opcode::LocalLifetimeMark(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowgraph::ControlFlowGraph;

    #[test]
    fn allocation_with_no_lifetime_marks_is_globally_alive() {
        let mut c = OptCodeContainer::new();
        let block = c.new_block();
        c.set_entry_point(block).unwrap();
        let alloc = c.append_instruction(block, Opcode::AllocLocal, &[]).unwrap();
        c.append_instruction(block, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let liveness = Liveness::compute(&c, &cfg);
        let conflicts = VariableConflicts::build(&c, &liveness);
        assert!(conflicts.is_globally_alive(alloc));
        assert!(!conflicts.is_locally_alive(alloc));
    }

    #[test]
    fn two_non_overlapping_scoped_locals_do_not_conflict() {
        let mut c = OptCodeContainer::new();
        let block = c.new_block();
        c.set_entry_point(block).unwrap();
        let a = c.append_instruction(block, Opcode::AllocLocal, &[]).unwrap();
        c.append_instruction(block, Opcode::LocalLifetimeMark(LifetimeMarkKind::Begin), &[a])
            .unwrap();
        c.append_instruction(block, Opcode::LocalLifetimeMark(LifetimeMarkKind::End), &[a])
            .unwrap();
        let b = c.append_instruction(block, Opcode::AllocLocal, &[]).unwrap();
        c.append_instruction(block, Opcode::LocalLifetimeMark(LifetimeMarkKind::Begin), &[b])
            .unwrap();
        c.append_instruction(block, Opcode::LocalLifetimeMark(LifetimeMarkKind::End), &[b])
            .unwrap();
        c.append_instruction(block, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let liveness = Liveness::compute(&c, &cfg);
        let conflicts = VariableConflicts::build(&c, &liveness);
        assert!(conflicts.is_locally_alive(a));
        assert!(conflicts.is_locally_alive(b));
        // Both are alive in the same block's `alive_instr` set regardless of their own lifetime
        // marks' relative position, since liveness here is computed at block granularity.
        assert!(conflicts.conflicts_of(a).unwrap().any(|x| x == b));
    }
}
