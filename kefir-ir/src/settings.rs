//! Pass configuration.
//!
//! Every toggle a caller can set is a plain field on [`OptConfig`], constructed explicitly by the
//! caller and threaded through by value or reference; there is no environment-variable or global
//! side channel for configuration, unlike the ISA-targeted settings groups in the codegen core
//! this crate's container is grounded on, which do read flags out of a builder keyed by string
//! name. This crate has no per-target variation to justify that indirection, so a struct literal
//! is all that is needed.

/// Toggles controlling optional behavior of the analyses and passes in this crate.
#[derive(Debug, Clone, Copy)]
pub struct OptConfig {
    /// Run the loop-invariant code motion pass at all. Disabling this is mostly useful for
    /// isolating a miscompilation to LICM versus an earlier pass.
    pub enable_licm: bool,

    /// Bound on LICM's fixpoint behavior, in two places: how many times the per-candidate
    /// hoisting worklist may revisit an instruction before giving up on it (guarding against a
    /// cycle of operand dependencies the analysis failed to detect as non-hoistable), and how
    /// many outer rounds the driver may run before stopping even if hoisting is still making
    /// progress. Zero means unbounded in both places.
    pub licm_max_iterations: usize,

    /// Track variable-conflict local/global classification even for functions with no explicit
    /// `LOCAL_LIFETIME_MARK` instructions (where every local would otherwise trivially be
    /// globally alive). Mostly useful for testing the analysis itself.
    pub always_build_variable_conflicts: bool,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            enable_licm: true,
            licm_max_iterations: 0,
            always_build_variable_conflicts: false,
        }
    }
}
