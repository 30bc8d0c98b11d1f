/**
 * Error taxonomy shared by every stage of mask generation
 *
 * All failures surface synchronously from the call that detected them and
 * nothing is retried. A failed generation never returns a partially filled
 * rank array.
 */

use thiserror::Error;

/// Error types for void-and-cluster generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoidClusterError {
    /// A parameter is missing, non-finite, out of range or would divide by zero
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A kernel's declared shape is even, ragged, too large for the grid, or
    /// disagrees with the number of weights supplied
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The candidate generator was handed a pattern with no samples or with
    /// every cell set
    #[error("Degenerate pattern: {ones} of {area} cells are set")]
    DegeneratePattern {
        /// Number of active cells found
        ones: usize,
        /// Total number of cells in the grid
        area: usize,
    },

    /// The candidate loop hit its iteration cap before reaching a fixed point
    #[error("Candidate pattern did not converge after {iterations} iterations")]
    NonConvergence {
        /// Iterations performed before giving up
        iterations: usize,
    },

    /// Generation was cancelled through its cancel token
    #[error("Generation cancelled")]
    Cancelled,
}

impl VoidClusterError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}

/// Result type for void-and-cluster operations
pub type Result<T> = std::result::Result<T, VoidClusterError>;
