//! Primary error type for gravel operations.
//!
//! Rejected swaps (loops, conflicts) are *not* errors; they are reported in
//! the swap-result stream. Errors here mean the run cannot continue and no
//! partial output is published.

use thiserror::Error;

/// Workspace-wide error enum.
#[derive(Error, Debug)]
pub enum GravelError {
    // === Caller mistakes ===
    /// Malformed input: empty edge stream, out-of-range ids, degenerate swap.
    #[error("invalid input: {detail}")]
    InvalidInput { detail: String },

    // === Resource limits ===
    /// A sorter or priority queue cannot operate within its byte budget.
    #[error("memory budget exhausted: need {needed} bytes, budget is {budget}")]
    ResourceExhausted { budget: usize, needed: usize },

    // === Internal failures ===
    /// An internal invariant failed. Fatal: the run aborts.
    #[error("invariant violated: {detail}")]
    Invariant { detail: String },

    // === I/O ===
    /// Spill-file or edge-file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixed-size record could not be read completely.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

impl GravelError {
    /// Construct an [`GravelError::InvalidInput`].
    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            detail: detail.into(),
        }
    }

    /// Construct an [`GravelError::Invariant`].
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant {
            detail: detail.into(),
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, GravelError>;
