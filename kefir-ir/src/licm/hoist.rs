//! Hoist-candidate collection and the dependency-closed hoisting traversal.
//!
//! Grounded on `process_loop`/`do_hoist`/`all_inputs_processed`/`all_inputs_hoisted` in
//! `source/optimizer/pipeline/licm.c`. Candidate collection mirrors the C source closely: a
//! worklist seeded with every instruction of every loop block in definition order, each popped
//! instruction checked for whether all its (regular, non-phi-link) operands are already processed, re-enqueued
//! if not, and on success classified as a hoist candidate when side-effect-free and not
//! control-flow. Phis are always immediately processed (and excluded from candidacy, a structural
//! extension beyond the C source: a phi is bound to its block's incoming edges and "hoisting" one
//! out is incoherent).
//!
//! `do_hoist` departs from the C source in one place: the original skips calling `do_hoist` at all
//! for an `is_always_hoistable` candidate (an "intentionally left blank" switch case), which would
//! leave an unreferenced constant sitting in the loop body forever. This module instead treats
//! every hoist candidate, including always-hoistable ones, as a direct traversal seed, and uses
//! `is_always_hoistable` only inside `can_hoist` as an unconditional-legal fast path.

use super::worklist::Worklist;
use crate::dominator_tree::DominatorTree;
use crate::flowgraph::ControlFlowGraph;
use crate::ir::{BlockRef, InstrRef, OptCodeContainer};
use crate::loop_analysis::NaturalLoop;
use crate::result::OptResult;
use kefir_entity::EntityRef;

/// Collect every instruction in `natural_loop`'s body whose operands are all defined outside the
/// loop (or are themselves hoist candidates), excluding phis, side-effecting instructions, and
/// control flow. Returned in ascending `InstrRef` order for deterministic traversal.
pub(crate) fn collect_hoist_candidates(
    container: &OptCodeContainer,
    natural_loop: &NaturalLoop,
) -> Vec<InstrRef> {
    let mut processed = kefir_collections::HashSet::new();
    let mut candidates = kefir_collections::HashSet::new();
    let mut queue = Worklist::new();

    for block in natural_loop.body() {
        for instr in container.def_order_iter(block) {
            queue.push(instr);
        }
    }

    while let Some(instr) = queue.pop() {
        if processed.contains(&instr) {
            continue;
        }

        if container.is_phi(instr) {
            processed.insert(instr);
            continue;
        }

        let mut all_inputs_processed = true;
        let mut all_inputs_nonlocal = true;
        for &operand in container.operands(instr) {
            let operand_block = container.block_of(operand);
            let is_loop_local = operand_block.map(|b| natural_loop.contains_block(b)).unwrap_or(false);
            if !is_loop_local {
                continue;
            }
            if !candidates.contains(&operand) {
                all_inputs_nonlocal = false;
            }
            if !processed.contains(&operand) {
                all_inputs_processed = false;
            }
        }

        if !all_inputs_processed {
            queue.push(instr);
            continue;
        }

        processed.insert(instr);

        let opcode = container.opcode(instr);
        if all_inputs_nonlocal && opcode.is_side_effect_free() && !opcode.is_control_flow() {
            candidates.insert(instr);
        }
    }

    let mut result: Vec<InstrRef> = candidates.into_iter().collect();
    result.sort_by_key(|instr| instr.index());
    result
}

/// Is `instr` legal to move out of its current block, given that it is already known to be a hoist
/// candidate (side-effect-free, non-control-flow, non-phi, all operands outside the loop or
/// already hoisted)?
fn can_hoist(container: &OptCodeContainer, instr: InstrRef) -> bool {
    if container.is_phi(instr) {
        return false;
    }
    let opcode = container.opcode(instr);
    if opcode.is_always_hoistable() {
        return true;
    }
    opcode.is_side_effect_free() && !opcode.is_control_flow()
}

/// Hoist `seed` and the closure of its not-yet-hoisted, loop-local operands into `target`.
///
/// Pops from a worklist seeded with `seed`; for each popped instruction, if it is already outside
/// the loop (moved there by an earlier seed's traversal, or never loop-local to begin with), it is
/// skipped. Otherwise any loop-local operand not yet in `target` is pushed ahead of it and the
/// instruction is re-enqueued; once every operand is outside the loop, `can_hoist` is checked and,
/// if it passes, the instruction is moved. If `can_hoist` fails, the whole traversal stops
/// immediately, leaving everything already moved in place — later seeds may still make progress
/// independently.
///
/// `max_iterations` bounds how many times the traversal may pop an instruction off its worklist
/// before giving up on this seed altogether, as a backstop against an operand cycle the candidate
/// analysis failed to rule out; 0 means unbounded. SSA's operand DAG is acyclic by construction, so
/// a correctly-computed candidate set never hits this bound in practice.
///
/// Returns the number of instructions actually moved.
pub(crate) fn do_hoist(
    container: &mut OptCodeContainer,
    natural_loop: &NaturalLoop,
    seed: InstrRef,
    target: BlockRef,
    max_iterations: usize,
) -> OptResult<usize> {
    let mut queue = Worklist::new();
    queue.push(seed);
    let mut moved = 0;
    let mut iterations = 0usize;

    while let Some(instr) = queue.pop() {
        iterations += 1;
        if max_iterations != 0 && iterations > max_iterations {
            log::warn!(
                "licm: {:?} hit its iteration bound while hoisting toward {:?}; giving up on this candidate",
                seed,
                target
            );
            break;
        }

        let current_block = match container.block_of(instr) {
            Some(b) => b,
            None => continue,
        };
        if !natural_loop.contains_block(current_block) {
            continue;
        }

        let mut all_inputs_hoisted = true;
        for &operand in container.operands(instr) {
            let operand_block = match container.block_of(operand) {
                Some(b) => b,
                None => continue,
            };
            if natural_loop.contains_block(operand_block) {
                all_inputs_hoisted = false;
                queue.push(operand);
            }
        }

        if !all_inputs_hoisted {
            queue.push(instr);
            continue;
        }

        if !can_hoist(container, instr) {
            break;
        }

        container.move_instruction(instr, target)?;
        moved += 1;
    }

    Ok(moved)
}
