//! Error types for the Sinkhorn solver.

use thiserror::Error;

/// Errors raised before iteration starts.
///
/// Numerical non-convergence is deliberately not represented here: a solve
/// that exhausts its iteration budget still returns its best potentials,
/// reported as [`TerminationReason::MaxIterationsReached`] in the
/// diagnostics.
///
/// [`TerminationReason::MaxIterationsReached`]: crate::solver::TerminationReason::MaxIterationsReached
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkhornError {
    /// A point cloud or weight vector does not satisfy the input contract
    /// (empty cloud, mismatched weight length, non-positive weight sum).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A solver parameter is outside its domain.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SinkhornError>;
