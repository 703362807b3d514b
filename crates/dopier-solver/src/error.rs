//! Error types for the relaxation solver.

use thiserror::Error;

/// Errors raised by the relaxation solver.
///
/// These are programming errors or genuine divergence; the solver never
/// retries. Callers that hit [`Error::NotConverged`] should rerun with a
/// different relaxation factor.
#[derive(Debug, Error)]
pub enum Error {
    /// The over-relaxation factor must lie strictly inside (0, 2).
    #[error("relaxation factor must lie in (0, 2), got {0}")]
    InvalidAlpha(f64),

    /// A Dirichlet fixed point was outside the array being relaxed.
    #[error("fixed point index {index} out of range for axis of {len} cells")]
    FixedPointOutOfRange { index: usize, len: usize },

    /// The sweep limit was reached before the tolerance was met.
    #[error("relaxation did not converge within {sweeps} sweeps")]
    NotConverged { sweeps: usize },
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;
