//! Debug-info side tables: source location ranges per instruction, and the set of defining
//! instructions per local-variable identifier.
//!
//! Kept as its own type, the same separation of concerns the codegen core this crate is grounded
//! on draws between `ir::Function` and its `value_label`/`srcloc` side tables, but owned by
//! `OptCodeContainer` (see `container::OptCodeContainer::debug_info`) so that
//! `OptCodeContainer::replace_references` can call `on_replace_references` in the same mutation
//! that rewrites the DFG, rather than leaving the two tables to drift apart.

use crate::ir::InstrRef;
use kefir_collections::{Interval, IntervalTree};
use kefir_entity::SecondaryMap;
use std::collections::HashMap;

/// A half-open range of source positions (e.g. byte offsets into a translation unit).
pub type SourceRange = Interval;

/// An opaque identifier for a source-level local variable, stable across SSA renaming.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LocalVariableId(pub u32);

/// Debug-info side tables for one function.
#[derive(Default)]
pub struct DebugInfo {
    source_ranges: SecondaryMap<InstrRef, Option<SourceRange>>,
    range_index: IntervalTree<InstrRef>,
    variable_definitions: HashMap<LocalVariableId, Vec<InstrRef>>,
}

impl DebugInfo {
    /// Create an empty set of debug-info tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a source range to `instr`, indexing it for stabbing queries.
    pub fn set_source_range(&mut self, instr: InstrRef, range: SourceRange) {
        self.source_ranges[instr] = Some(range);
        self.range_index.insert(range, instr);
    }

    /// The source range attached to `instr`, if any.
    pub fn source_range(&self, instr: InstrRef) -> Option<SourceRange> {
        self.source_ranges[instr]
    }

    /// Every instruction whose source range contains `position`.
    pub fn instructions_at(&self, position: u32) -> Vec<InstrRef> {
        self.range_index
            .stab(position)
            .into_iter()
            .map(|(_, instr)| *instr)
            .collect()
    }

    /// Record that `instr` defines `variable`.
    pub fn add_variable_definition(&mut self, variable: LocalVariableId, instr: InstrRef) {
        self.variable_definitions.entry(variable).or_default().push(instr);
    }

    /// Every instruction on record as defining `variable`.
    pub fn variable_definitions(&self, variable: LocalVariableId) -> &[InstrRef] {
        self.variable_definitions
            .get(&variable)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// When an instruction is replaced (`old` -> `new`), carry over its debug metadata: the
    /// source range (if `new` doesn't already have a narrower one of its own) and every
    /// variable-definition entry naming `old`.
    pub fn on_replace_references(&mut self, old: InstrRef, new: InstrRef) {
        if self.source_ranges[new].is_none() {
            if let Some(range) = self.source_ranges[old] {
                self.set_source_range(new, range);
            }
        }
        for defs in self.variable_definitions.values_mut() {
            for def in defs.iter_mut() {
                if *def == old {
                    *def = new;
                }
            }
        }
    }
}
