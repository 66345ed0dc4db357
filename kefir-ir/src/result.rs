//! Error and result types shared by every pass in this crate.

use crate::ir::{BlockRef, InstrRef};
use failure_derive::Fail;

/// An error produced by the opt-IR container or one of the analyses/passes built on top of it.
///
/// Invariant violations that indicate a bug in this crate rather than caller misuse are reported
/// through `debug_assert!` at the point they would be maintained anyway; `OptError` covers the
/// conditions a caller can legitimately hit (a stale reference, a malformed request) or that an
/// analysis detects in otherwise-valid-looking but inconsistent IR. `IteratorEnd` from the
/// original design has no variant here: Rust's `Iterator` protocol already distinguishes "no more
/// elements" (`None`) from a genuine lookup failure (`OptError::NotFound`), so iteration
/// termination never needs to round-trip through this enum.
#[derive(Debug, Fail)]
pub enum OptError {
    /// A caller passed an out-of-range or otherwise invalid argument.
    #[fail(display = "invalid parameter: {}", _0)]
    InvalidParameter(String),

    /// An index exceeded a container's size.
    #[fail(display = "index out of bounds: {}", _0)]
    OutOfBounds(String),

    /// A key lookup did not resolve, e.g. an `InstrRef` or `BlockRef` that does not belong to (or
    /// has been retired from) this function.
    #[fail(display = "not found: {}", _0)]
    NotFound(String),

    /// A unique-key insertion collided with an existing entry, e.g. redeclaring an identifier
    /// with a different type or scope than its first declaration.
    #[fail(display = "already exists: {}", _0)]
    AlreadyExists(String),

    /// The operation is well-formed in isolation but violates an invariant given the container's
    /// current state, e.g. dropping an instruction that still has uses, or attaching a phi edge
    /// from a block that is not a predecessor.
    #[fail(display = "invalid state: {}", _0)]
    InvalidState(String),

    /// The allocator refused a request. Propagated from the handful of collection-growth paths
    /// that can plausibly observe allocation failure (`OrderedMap`, `HashSet`, and `BucketSet`
    /// growth); ordinary `Vec` pushes are not wrapped in this.
    #[fail(display = "allocation failed: {}", _0)]
    MemallocFailure(String),

    /// An analysis detected IR that violates an invariant this crate itself is responsible for
    /// maintaining, indicating a bug in the compiler rather than in the input. Analysis code that
    /// hits this does not attempt repair.
    #[fail(display = "internal error: {}", _0)]
    InternalError(String),
}

/// The result type returned by fallible operations in this crate.
pub type OptResult<T> = Result<T, OptError>;

pub(crate) fn not_found_instr(instr: InstrRef) -> OptError {
    OptError::NotFound(format!("{:?} is not valid for this function", instr))
}

pub(crate) fn not_found_block(block: BlockRef) -> OptError {
    OptError::NotFound(format!("{:?} is not valid for this function", block))
}
