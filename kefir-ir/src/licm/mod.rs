//! Loop-invariant code motion: hoists side-effect-free, loop-invariant instructions out of a
//! loop's body and into a freshly inserted pre-header.
//!
//! Grounded on `loop_invariant_code_motion_apply`/`licm_impl`/`process_nest`/`process_loop` in
//! `source/optimizer/pipeline/licm.c`. The original builds its `kefir_opt_code_structure` and loop
//! collection once and walks the nest forest in a single preorder pass; this driver does the same
//! per round, but wraps that single pass in an outer fixpoint loop, since hoisting out of an inner
//! loop's pre-header can turn an instruction into a candidate for an enclosing loop only on a
//! subsequent pass over a freshly recomputed nest forest.

mod hoist;
mod preheader;
mod worklist;

use crate::dominator_tree::DominatorTree;
use crate::flowgraph::ControlFlowGraph;
use crate::ir::{BlockRef, InstrRef, OptCodeContainer};
use crate::loop_analysis::{LoopCollection, LoopNest};
use crate::result::OptResult;
use crate::settings::OptConfig;
use crate::diagnostics::{DiagnosticSink, Severity};

/// Summary of what a LICM run actually did.
#[derive(Debug, Default, Clone)]
pub struct LicmReport {
    /// Number of instructions moved into some pre-header, across every round.
    pub hoisted_instructions: usize,
    /// Number of pre-header blocks inserted.
    pub preheaders_inserted: usize,
    /// Number of fixpoint rounds run, including the final round that hoisted nothing.
    pub rounds: usize,
}

/// Run loop-invariant code motion on `container` to a fixpoint, bounded by
/// `config.licm_max_iterations` rounds (0 = unbounded).
///
/// Each round recomputes the control-flow graph, dominator tree, and loop nest forest from
/// scratch, then walks the forest outer-loop-first so that an instruction hoisted into an inner
/// loop's pre-header is immediately visible as a loop-invariant candidate of any enclosing loop
/// later in the same round. A round that hoists nothing ends the fixpoint.
pub fn run(
    container: &mut OptCodeContainer,
    config: &OptConfig,
    diagnostics: &mut dyn DiagnosticSink,
) -> OptResult<LicmReport> {
    let mut report = LicmReport::default();

    loop {
        report.rounds += 1;
        log::debug!("licm: starting round {}", report.rounds);

        let cfg = ControlFlowGraph::compute(container);
        let dom = DominatorTree::compute(container, &cfg);
        let loops = LoopCollection::build(container, &cfg, &dom);

        let mut round_hoisted = 0;
        let mut round_preheaders = 0;
        for nest in loops.nests() {
            process_nest(container, config, diagnostics, nest, &mut round_hoisted, &mut round_preheaders)?;
        }

        report.hoisted_instructions += round_hoisted;
        report.preheaders_inserted += round_preheaders;

        log::debug!(
            "licm: round {} hoisted {} instruction(s) into {} new pre-header(s)",
            report.rounds,
            round_hoisted,
            round_preheaders
        );

        if round_hoisted == 0 {
            break;
        }
        if config.licm_max_iterations != 0 && report.rounds >= config.licm_max_iterations {
            log::warn!(
                "licm: stopping after {} round(s), the configured maximum, with more work possibly remaining",
                report.rounds
            );
            break;
        }
    }

    Ok(report)
}

fn process_nest(
    container: &mut OptCodeContainer,
    config: &OptConfig,
    diagnostics: &mut dyn DiagnosticSink,
    nest: &LoopNest,
    hoisted: &mut usize,
    preheaders: &mut usize,
) -> OptResult<()> {
    process_loop(container, config, diagnostics, nest, hoisted, preheaders)?;
    for child in nest.children() {
        process_nest(container, config, diagnostics, child, hoisted, preheaders)?;
    }
    Ok(())
}

fn process_loop(
    container: &mut OptCodeContainer,
    config: &OptConfig,
    diagnostics: &mut dyn DiagnosticSink,
    nest: &LoopNest,
    hoisted: &mut usize,
    preheaders: &mut usize,
) -> OptResult<()> {
    let natural_loop = nest.natural_loop().clone();
    let header = natural_loop.header();
    let tail = natural_loop.tail();

    let candidates = hoist::collect_hoist_candidates(container, &natural_loop);
    log::trace!(
        "licm: loop with header {:?}/tail {:?} has {} hoist candidate(s)",
        header,
        tail,
        candidates.len()
    );
    if candidates.is_empty() {
        return Ok(());
    }

    let mut target: Option<BlockRef> = None;
    for seed in candidates {
        if target.is_none() {
            let cfg = ControlFlowGraph::compute(container);
            let dom = DominatorTree::compute(container, &cfg);
            match preheader::insert_preheader(container, &cfg, &dom, header, tail)? {
                Some(preheader) => {
                    *preheaders += 1;
                    target = Some(preheader);
                }
                None => {
                    diagnostics.report(
                        Severity::Note,
                        None,
                        &format!(
                            "loop with header {:?} has no reachable non-back-edge predecessor; skipping",
                            header
                        ),
                    );
                    return Ok(());
                }
            }
        }
        let target = target.expect("set above");
        let moved = hoist_seed(container, &natural_loop, seed, target, config.licm_max_iterations)?;
        *hoisted += moved;
    }

    Ok(())
}

fn hoist_seed(
    container: &mut OptCodeContainer,
    natural_loop: &crate::loop_analysis::NaturalLoop,
    seed: InstrRef,
    target: BlockRef,
    max_iterations: usize,
) -> OptResult<usize> {
    hoist::do_hoist(container, natural_loop, seed, target, max_iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullDiagnosticSink;
    use crate::ir::Opcode;

    fn loop_with_hoistable_constant() -> (OptCodeContainer, BlockRef, BlockRef, InstrRef, InstrRef) {
        let mut c = OptCodeContainer::new();
        let entry = c.new_block();
        let header = c.new_block();
        let exit = c.new_block();
        c.set_entry_point(entry).unwrap();
        c.append_instruction(entry, Opcode::Jump(header), &[]).unwrap();

        let ptr = c.append_instruction(header, Opcode::AllocLocal, &[]).unwrap();
        let konst = c.append_instruction(header, Opcode::IntConst(42), &[]).unwrap();
        let store = c.append_instruction(header, Opcode::Store, &[ptr, konst]).unwrap();
        let cond = c.append_instruction(header, Opcode::IntConst(1), &[]).unwrap();
        c.append_instruction(
            header,
            Opcode::Branch {
                if_true: header,
                if_false: exit,
            },
            &[cond],
        )
        .unwrap();
        c.append_instruction(exit, Opcode::Return, &[]).unwrap();
        (c, entry, header, konst, store)
    }

    #[test]
    fn hoists_a_constant_into_a_new_preheader() {
        let (mut c, entry, header, konst, _store) = loop_with_hoistable_constant();
        let config = OptConfig::default();
        let mut sink = NullDiagnosticSink;
        let report = run(&mut c, &config, &mut sink).unwrap();

        assert!(report.hoisted_instructions >= 1);
        assert_eq!(report.preheaders_inserted, 1);
        assert_ne!(c.block_of(konst), Some(header));

        let cfg = ControlFlowGraph::compute(&c);
        assert_eq!(cfg.successors(entry).count(), 1);
        let preheader = cfg.successors(entry).next().unwrap();
        assert_ne!(preheader, header);
        assert_eq!(c.block_of(konst), Some(preheader));
    }

    #[test]
    fn does_not_hoist_a_load() {
        let mut c = OptCodeContainer::new();
        let entry = c.new_block();
        let header = c.new_block();
        let exit = c.new_block();
        c.set_entry_point(entry).unwrap();
        c.append_instruction(entry, Opcode::Jump(header), &[]).unwrap();
        let ptr = c.append_instruction(header, Opcode::AllocLocal, &[]).unwrap();
        let loaded = c.append_instruction(header, Opcode::Load, &[ptr]).unwrap();
        c.append_instruction(header, Opcode::Store, &[ptr, loaded]).unwrap();
        let cond = c.append_instruction(header, Opcode::IntConst(1), &[]).unwrap();
        c.append_instruction(
            header,
            Opcode::Branch {
                if_true: header,
                if_false: exit,
            },
            &[cond],
        )
        .unwrap();
        c.append_instruction(exit, Opcode::Return, &[]).unwrap();

        let config = OptConfig::default();
        let mut sink = NullDiagnosticSink;
        let report = run(&mut c, &config, &mut sink).unwrap();
        assert_eq!(report.hoisted_instructions, 0);
        assert_eq!(c.block_of(loaded), Some(header));
    }

    #[test]
    fn acyclic_function_runs_to_a_one_round_no_op() {
        let mut c = OptCodeContainer::new();
        let a = c.new_block();
        let b = c.new_block();
        c.set_entry_point(a).unwrap();
        c.append_instruction(a, Opcode::Jump(b), &[]).unwrap();
        c.append_instruction(b, Opcode::Return, &[]).unwrap();

        let config = OptConfig::default();
        let mut sink = NullDiagnosticSink;
        let report = run(&mut c, &config, &mut sink).unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.hoisted_instructions, 0);
        assert_eq!(report.preheaders_inserted, 0);
    }
}
