//! The mid-end optimizer core: opt-IR container, control-flow/dominance/liveness analyses, loop
//! discovery, and loop-invariant code motion.
//!
//! This crate has no front end and no code generator of its own; it is handed an [`ir::IrFunction`]
//! already lowered from C source and hands back the same function with its `OptCodeContainer`
//! transformed in place. Callers run analyses and passes explicitly, in the order their pipeline
//! requires — nothing here is triggered implicitly by constructing a container.

pub mod diagnostics;
pub mod dominator_tree;
pub mod flowgraph;
pub mod ir;
pub mod licm;
pub mod liveness;
pub mod loop_analysis;
pub mod result;
pub mod settings;
pub mod var_conflict;
