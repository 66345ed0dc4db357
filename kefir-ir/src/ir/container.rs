//! `OptCodeContainer`: the single owner of a function body's instructions, blocks, and layout.
//!
//! Every mutator here either leaves the container in a state satisfying the invariants in
//! `SPEC_FULL.md` §3, or returns an `OptError` without touching anything — there is no partially
//! applied mutation a caller could observe. Internal invariant checks that indicate a bug in this
//! crate rather than caller misuse use `debug_assert!`; everything a caller can legitimately
//! trigger (an instruction from a different function, an already-terminated block) is an
//! `OptError`.

use crate::ir::debuginfo::DebugInfo;
use crate::ir::dfg::DataFlowGraph;
use crate::ir::instruction::PhiLink;
use crate::ir::layout::Layout;
use crate::ir::{BlockRef, ControlOrderIter, DefOrderIter, InstrRef, Opcode, PhiRef};
use crate::result::{not_found_block, not_found_instr, OptError, OptResult};

/// The instructions, blocks, both instruction orderings, and debug-info side tables of a single
/// function body.
///
/// `debug_info` lives here, alongside `dfg`/`layout` rather than off in `IrFunction`, so that
/// `replace_references` is the one place able to keep it in lockstep with the rewrite it is
/// doing; a caller that only ever goes through this container (as every pass, including LICM,
/// does) can never observe the two drifting apart.
#[derive(Default)]
pub struct OptCodeContainer {
    dfg: DataFlowGraph,
    layout: Layout,
    debug_info: DebugInfo,
}

impl OptCodeContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_block(&self, block: BlockRef) -> OptResult<()> {
        if self.dfg.is_valid_block(block) {
            Ok(())
        } else {
            Err(not_found_block(block))
        }
    }

    fn check_instr(&self, instr: InstrRef) -> OptResult<()> {
        if self.dfg.is_valid_instr(instr) {
            Ok(())
        } else {
            Err(not_found_instr(instr))
        }
    }

    /// Allocate a new, empty block with no predecessors until some other block's control-flow
    /// instruction names it as a target.
    pub fn new_block(&mut self) -> BlockRef {
        let block = self.dfg.make_block();
        self.layout.append_block(block);
        block
    }

    /// Mark `block` as the function's entry point.
    pub fn set_entry_point(&mut self, block: BlockRef) -> OptResult<()> {
        self.check_block(block)?;
        self.dfg.set_entry(block);
        Ok(())
    }

    /// The function's entry point, if one has been set.
    pub fn entry_point(&self) -> Option<BlockRef> {
        self.layout
            .block_order()
            .iter()
            .copied()
            .find(|&b| self.dfg.is_entry(b))
    }

    /// Blocks in creation order.
    pub fn blocks(&self) -> &[BlockRef] {
        self.layout.block_order()
    }

    /// Append a new instruction to the end of `block`'s definition order (and, if `opcode` is a
    /// control-flow or otherwise side-effecting instruction, to the end of its control order
    /// too). Fails if `block` already has a control-order terminator.
    pub fn append_instruction(
        &mut self,
        block: BlockRef,
        opcode: Opcode,
        operands: &[InstrRef],
    ) -> OptResult<InstrRef> {
        self.check_block(block)?;
        for &operand in operands {
            self.check_instr(operand)?;
        }
        let in_control_order = !opcode.is_side_effect_free() || opcode.is_control_flow();
        if in_control_order {
            if let Some(tail) = self.layout.control_tail(block) {
                if self.dfg.opcode(tail).is_control_flow() {
                    return Err(OptError::InvalidState(format!(
                        "{:?} already has a control terminator",
                        block
                    )));
                }
            }
        }
        let instr = self.dfg.make_instruction(opcode, operands);
        self.layout.append_instruction(block, instr, in_control_order);
        Ok(instr)
    }

    /// Allocate a phi at the head of `block`'s definition order. Phis never appear in control
    /// order.
    pub fn new_phi(&mut self, block: BlockRef) -> OptResult<(PhiRef, InstrRef)> {
        self.check_block(block)?;
        let (phi, instr) = self.dfg.make_phi();
        self.layout.prepend_instruction(block, instr);
        Ok((phi, instr))
    }

    /// Register an incoming edge on `phi` from `predecessor_block`, carrying `incoming`'s value.
    ///
    /// The caller is responsible for `predecessor_block` actually being a CFG predecessor of the
    /// phi's block; this container has no CFG view of its own (see `flowgraph::ControlFlowGraph`)
    /// and cannot check that itself. Analyses that need phi well-formedness verify it against a
    /// freshly computed CFG instead.
    pub fn attach_phi(
        &mut self,
        phi: PhiRef,
        predecessor_block: BlockRef,
        incoming: InstrRef,
    ) -> OptResult<()> {
        self.check_instr(phi.instr())?;
        self.check_block(predecessor_block)?;
        self.check_instr(incoming)?;
        self.dfg.attach_phi_link(phi, predecessor_block, incoming);
        Ok(())
    }

    /// The incoming links currently attached to `phi`.
    pub fn phi_links(&self, phi: PhiRef) -> &[PhiLink] {
        self.dfg.phi_links(phi)
    }

    /// Remove every incoming edge on `phi` coming from `from_block`.
    pub fn detach_phi_links_from(&mut self, phi: PhiRef, from_block: BlockRef) -> Vec<PhiLink> {
        self.dfg.detach_phi_links_from(phi, from_block)
    }

    /// Rewrite every use of `old` to `new`. Afterwards `use_count(old) == 0`. Carries `old`'s
    /// debug-info (source range, variable-definition entries) over to `new` in the same call, so
    /// the side tables never fall out of step with the instructions they describe.
    pub fn replace_references(&mut self, old: InstrRef, new: InstrRef) -> OptResult<()> {
        self.check_instr(old)?;
        self.check_instr(new)?;
        self.dfg.replace_references(old, new);
        self.debug_info.on_replace_references(old, new);
        Ok(())
    }

    /// This function body's debug-info side tables.
    pub fn debug_info(&self) -> &DebugInfo {
        &self.debug_info
    }

    /// This function body's debug-info side tables, mutably.
    pub fn debug_info_mut(&mut self) -> &mut DebugInfo {
        &mut self.debug_info
    }

    /// Remove `instr`. Fails if it still has uses, or if it is a block's control terminator.
    pub fn drop_instr(&mut self, instr: InstrRef) -> OptResult<()> {
        self.check_instr(instr)?;
        if self.dfg.use_count(instr) != 0 {
            return Err(OptError::InvalidState(format!(
                "cannot drop {:?}: use_count is {}",
                instr,
                self.dfg.use_count(instr)
            )));
        }
        self.dfg.release_operands(instr);
        self.layout.remove(instr);
        Ok(())
    }

    /// Retarget `branch`'s embedded target `old_target` to `new_target` instead. `branch` must be
    /// a `Jump` or `Branch`; `old_target` and `new_target` name blocks, not instructions, since a
    /// terminator's targets are immediates on its own opcode rather than operands. Downstream
    /// consumers (the CFG, dominator tree) must be rebuilt afterwards; this container does not
    /// track whether its cached structure is stale.
    pub fn replace_control_flow_target(
        &mut self,
        branch: InstrRef,
        old_target: BlockRef,
        new_target: BlockRef,
    ) -> OptResult<()> {
        self.check_instr(branch)?;
        self.check_block(old_target)?;
        self.check_block(new_target)?;
        if !self.dfg.opcode(branch).is_control_flow() {
            return Err(OptError::InvalidParameter(format!(
                "{:?} is not a control-flow instruction",
                branch
            )));
        }
        self.dfg.retarget_branch(branch, old_target, new_target);
        Ok(())
    }

    /// Relocate `instr` to the end of `target`'s definition order. Used by LICM to place a
    /// hoisted instruction into a pre-header; `instr` must be side-effect-free and
    /// non-control-flow; neither property is checked here, since every caller is expected to have
    /// already confirmed hoist-legality before calling this.
    pub fn move_instruction(&mut self, instr: InstrRef, target: BlockRef) -> OptResult<()> {
        self.check_instr(instr)?;
        self.check_block(target)?;
        self.layout.move_to(target, instr);
        Ok(())
    }

    /// The opcode of `instr`.
    pub fn opcode(&self, instr: InstrRef) -> Opcode {
        self.dfg.opcode(instr)
    }

    /// The operands of `instr`.
    pub fn operands(&self, instr: InstrRef) -> &[InstrRef] {
        self.dfg.operands(instr)
    }

    /// The direct users of `instr`.
    pub fn uses(&self, instr: InstrRef) -> &[InstrRef] {
        self.dfg.uses(instr)
    }

    /// Number of direct users of `instr`.
    pub fn use_count(&self, instr: InstrRef) -> usize {
        self.dfg.use_count(instr)
    }

    /// Is `instr` a phi?
    pub fn is_phi(&self, instr: InstrRef) -> bool {
        self.dfg.is_phi(instr)
    }

    /// Narrow `instr` to a `PhiRef` if it is a phi.
    pub fn phi(&self, instr: InstrRef) -> Option<PhiRef> {
        self.dfg.phi(instr)
    }

    /// The block `instr` is currently placed in.
    pub fn block_of(&self, instr: InstrRef) -> Option<BlockRef> {
        self.layout.block_of(instr)
    }

    /// `block`'s control-order terminator, if it has one.
    pub fn control_tail(&self, block: BlockRef) -> Option<InstrRef> {
        self.layout.control_tail(block)
    }

    /// The first instruction in `block`'s control order.
    pub fn control_head(&self, block: BlockRef) -> Option<InstrRef> {
        self.layout.control_head(block)
    }

    /// The instruction following `instr` in control order.
    pub fn control_next(&self, instr: InstrRef) -> Option<InstrRef> {
        self.layout.control_next(instr)
    }

    /// The instruction preceding `instr` in control order.
    pub fn control_prev(&self, instr: InstrRef) -> Option<InstrRef> {
        self.layout.control_prev(instr)
    }

    /// Iterate `block`'s instructions in definition order (includes phis, at the head).
    pub fn def_order_iter(&self, block: BlockRef) -> DefOrderIter<'_> {
        self.layout.def_order_iter(block)
    }

    /// Iterate `block`'s instructions in control order.
    pub fn control_order_iter(&self, block: BlockRef) -> ControlOrderIter<'_> {
        self.layout.control_order_iter(block)
    }
}
