//! Error types for patchbeam.

use thiserror::Error;

/// Result alias for patchbeam operations.
pub type PatchBeamResult<T> = std::result::Result<T, PatchBeamError>;

/// Errors that can occur while running the beam search.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatchBeamError {
    /// The scoring method name is not registered.
    #[error("invalid configuration: unknown state value method [{method}]")]
    InvalidConfiguration { method: String },
    /// A driver or scoring parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// Array dimensions disagree between state, proposals and data.
    #[error("shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// A particle would hold the same candidate index twice.
    #[error("duplicate selection of candidate {index} in batch {batch}, particle {particle}")]
    DuplicateSelection {
        batch: usize,
        particle: usize,
        index: usize,
    },
    /// A candidate index points outside the pool.
    #[error("{context} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
}
