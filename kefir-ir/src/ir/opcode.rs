//! Instruction opcodes and the static properties the analyses in this crate need from them.
//!
//! The opcode list is a small subset of the optimizer IR's real instruction set: enough to express
//! the local-variable lifetime protocol, control flow, phis, and the handful of "always safe to
//! hoist no matter what it depends on" operations LICM special-cases. A front end lowering real C
//! expressions would need many more arithmetic and memory opcodes; they would all fall into the
//! existing `is_side_effect_free`/`is_control_flow` classification without needing new match arms
//! here; only the always-hoistable allowlist is opcode-specific by nature.
//!
//! Branch targets are carried as immediates on the branching opcode itself (`Jump(BlockRef)`,
//! `Branch { .. }`) rather than through an indirection via a separate "block label" operand
//! instruction: control-flow structure is this crate's own concern, so the target is data the
//! flowgraph builder can read directly off the terminator without chasing an operand. `BlockLabel`
//! still exists separately for the case of a block address used as an ordinary first-class value
//! (an indirect jump table entry, say), which is a different thing from a terminator's own target.

use crate::ir::BlockRef;

/// An opt-IR instruction opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Reserve storage for a local (stack-allocated) variable, producing a pointer to it.
    AllocLocal,
    /// Marks the beginning or end of a local variable's lifetime, keyed by an `ALLOC_LOCAL` and a
    /// linkage tag; see [`LifetimeMarkKind`].
    LocalLifetimeMark(LifetimeMarkKind),
    /// Load a scalar through a pointer operand. Has a side effect only in the sense that its
    /// result depends on the contents of memory; treated as side-effect-free for hoisting
    /// purposes only when paired with alias information this crate does not model, so loads are
    /// conservatively never hoisted by LICM.
    Load,
    /// Store a scalar through a pointer operand. Has a side effect and is never hoisted.
    Store,
    /// An integer constant.
    IntConst(i64),
    /// An unsigned integer constant.
    UintConst(u64),
    /// A 32-bit floating point constant.
    Float32Const(f32),
    /// A 64-bit floating point constant.
    Float64Const(f64),
    /// A reference to a string literal held in the function's static data.
    StringRef,
    /// A reference to a block, used as a first-class value (for indirect branches and similar),
    /// as distinct from a terminator's own embedded target.
    BlockLabel(BlockRef),
    /// A placeholder integer value, standing in for a value not yet known (used while building
    /// incomplete SSA before a later pass replaces it).
    IntPlaceholder,
    /// A placeholder 32-bit float value.
    Float32Placeholder,
    /// A placeholder 64-bit float value.
    Float64Placeholder,
    /// Sign-extend a 64-bit integer from its low N bits, for `n` in `{8, 16, 32}`.
    Int64SignExtend(u8),
    /// Zero-extend a 64-bit integer from its low N bits, for `n` in `{8, 16, 32}`.
    Int64ZeroExtend(u8),
    /// Integer addition.
    IntAdd,
    /// Integer subtraction.
    IntSub,
    /// Integer multiplication.
    IntMul,
    /// A phi node: selects one of several incoming values depending on which predecessor block
    /// control arrived from.
    Phi,
    /// An unconditional jump to a block.
    Jump(BlockRef),
    /// A conditional branch: `operands[0]` is the condition, and control transfers to
    /// `if_true` or `if_false`.
    Branch {
        /// Target taken when the condition is non-zero.
        if_true: BlockRef,
        /// Target taken when the condition is zero.
        if_false: BlockRef,
    },
    /// A function return.
    Return,
}

/// Which end of a local variable's lifetime a `LOCAL_LIFETIME_MARK` instruction denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifetimeMarkKind {
    /// The variable's storage becomes live at this point.
    Begin,
    /// The variable's storage is no longer live after this point.
    End,
}

impl Opcode {
    /// Does this instruction only compute a value from its operands, with no observable effect
    /// beyond producing that value?
    ///
    /// LICM only ever considers side-effect-free instructions as hoist candidates: moving a
    /// `Store` or a `LocalLifetimeMark` earlier could change what a later load observes or when a
    /// variable's storage is considered live.
    pub fn is_side_effect_free(self) -> bool {
        !matches!(
            self,
            Opcode::Load
                | Opcode::Store
                | Opcode::LocalLifetimeMark(_)
                | Opcode::AllocLocal
                | Opcode::Jump(_)
                | Opcode::Branch { .. }
                | Opcode::Return
        )
    }

    /// Is this a block terminator or otherwise a control-flow instruction?
    ///
    /// Control-flow instructions are never hoisted regardless of `is_side_effect_free`, since
    /// moving one out of its loop would change the loop's structure rather than just its
    /// schedule.
    pub fn is_control_flow(self) -> bool {
        matches!(self, Opcode::Jump(_) | Opcode::Branch { .. } | Opcode::Return)
    }

    /// Is this exactly a `PHI`?
    pub fn is_phi(self) -> bool {
        matches!(self, Opcode::Phi)
    }

    /// The blocks this instruction transfers control to directly, if it is a terminator.
    pub fn branch_targets(self) -> Vec<BlockRef> {
        match self {
            Opcode::Jump(target) => vec![target],
            Opcode::Branch { if_true, if_false } => vec![if_true, if_false],
            _ => Vec::new(),
        }
    }

    /// Is this one of the opcodes LICM treats as unconditionally hoistable regardless of where
    /// its (non-existent or already-ready, for these) operands live?
    ///
    /// These are all either literal constants or cheap, pure conversions of a single operand: once
    /// an instance of one is a hoist candidate at all, the legality check the loop-invariant code
    /// motion pass runs before actually moving it (see `licm::hoist::can_hoist`) is unconditional
    /// `true` rather than the general side-effect/control-flow test, since there is no failure mode
    /// for these that the general test would catch that isn't already ruled out by candidacy.
    pub fn is_always_hoistable(self) -> bool {
        matches!(
            self,
            Opcode::IntConst(_)
                | Opcode::UintConst(_)
                | Opcode::Float32Const(_)
                | Opcode::Float64Const(_)
                | Opcode::StringRef
                | Opcode::BlockLabel(_)
                | Opcode::IntPlaceholder
                | Opcode::Float32Placeholder
                | Opcode::Float64Placeholder
                | Opcode::Int64SignExtend(_)
                | Opcode::Int64ZeroExtend(_)
        )
    }
}
