//! Pre-header insertion: splits the loop header's non-back-edge predecessors off into a new
//! block, and splits every phi at the header into a pre-header half and a header half.
//!
//! Grounded on `insert_predecessor_block_impl` in `source/optimizer/pipeline/licm.c`: a
//! predecessor only gets retargeted if it is reachable (an unreachable predecessor's own
//! terminator is left alone, matching `IS_BLOCK_REACHABLE`), and every phi at the header is split
//! into a phi in the pre-header (aggregating every non-back-edge incoming value) and a replacement
//! phi at the header with exactly two incoming edges: one from the pre-header, one from the
//! back-edge source.

use crate::dominator_tree::DominatorTree;
use crate::flowgraph::ControlFlowGraph;
use crate::ir::{BlockRef, Opcode, OptCodeContainer, PhiLink, PhiRef};
use crate::result::{OptError, OptResult};
use std::collections::BTreeSet;

/// Insert a pre-header for the loop with the given `header`/`tail`, retargeting every reachable
/// non-back-edge predecessor of `header` to it and splitting `header`'s phis accordingly. Returns
/// `None` without touching the container if `header` has no reachable non-back-edge predecessor.
pub(crate) fn insert_preheader(
    container: &mut OptCodeContainer,
    cfg: &ControlFlowGraph,
    dom: &DominatorTree,
    header: BlockRef,
    tail: BlockRef,
) -> OptResult<Option<BlockRef>> {
    let reachable_preds: Vec<BlockRef> = cfg
        .predecessors(header)
        .filter(|&pred| pred != tail && dom.is_reachable(pred))
        .collect();
    if reachable_preds.is_empty() {
        return Ok(None);
    }

    let preheader = container.new_block();
    container.append_instruction(preheader, Opcode::Jump(header), &[])?;

    for &pred in &reachable_preds {
        let control_tail = container
            .control_tail(pred)
            .ok_or_else(|| OptError::InvalidState(format!("{:?} has no control terminator", pred)))?;
        container.replace_control_flow_target(control_tail, header, preheader)?;
    }

    split_phis(container, header, tail, preheader, &reachable_preds)?;

    Ok(Some(preheader))
}

fn split_phis(
    container: &mut OptCodeContainer,
    header: BlockRef,
    tail: BlockRef,
    preheader: BlockRef,
    reachable_preds: &[BlockRef],
) -> OptResult<()> {
    let phis: Vec<PhiRef> = container
        .def_order_iter(header)
        .filter_map(|instr| container.phi(instr))
        .collect();

    let expected_preds: BTreeSet<BlockRef> = reachable_preds.iter().copied().collect();

    for phi in phis {
        let links: Vec<PhiLink> = container.phi_links(phi).to_vec();

        let mut pred_links: Vec<PhiLink> = Vec::new();
        let mut tail_value = None;
        for link in &links {
            if link.from_block == tail {
                tail_value = Some(link.value);
            } else {
                pred_links.push(*link);
            }
        }

        let actual_preds: BTreeSet<BlockRef> = pred_links.iter().map(|link| link.from_block).collect();
        if actual_preds != expected_preds {
            return Err(OptError::InternalError(format!(
                "phi at {:?} has an incoming-edge set inconsistent with {:?}'s non-back-edge predecessors",
                header, header
            )));
        }
        let tail_value = tail_value.ok_or_else(|| {
            OptError::InternalError(format!(
                "phi at {:?} has no incoming edge from back-edge source {:?}",
                header, tail
            ))
        })?;

        let (pre_phi, pre_phi_instr) = container.new_phi(preheader)?;
        for link in &pred_links {
            container.attach_phi(pre_phi, link.from_block, link.value)?;
        }

        let (_header_phi, header_phi_instr) = container.new_phi(header)?;
        let header_phi = container.phi(header_phi_instr).expect("just created");
        container.attach_phi(header_phi, preheader, pre_phi_instr)?;
        container.attach_phi(header_phi, tail, tail_value)?;

        let old_instr = phi.instr();
        container.replace_references(old_instr, header_phi_instr)?;
        container.drop_instr(old_instr)?;
    }
    Ok(())
}
