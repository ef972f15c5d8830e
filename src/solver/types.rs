//! Type definitions for the Sinkhorn solver.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SinkhornError};

/// Hard lower bound on the regularization scale, guarding the divisions
/// by ε in the log-domain updates.
pub const MIN_EPSILON: f64 = 1e-10;

/// Hard lower bound on the convergence tolerance.
pub const MIN_TOLERANCE: f64 = 1e-12;

/// Configuration for a Sinkhorn solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkhornConfig {
    /// Entropic regularization scale ε (larger = smoother/blurrier
    /// coupling; smaller approaches rigid transport but needs the
    /// log-domain formulation to stay stable). Hard min [`MIN_EPSILON`].
    pub epsilon: f64,

    /// Minimum completed passes before any termination check fires.
    /// Prevents premature convergence on degenerate inputs such as
    /// identical clouds.
    pub min_iterations: usize,

    /// Maximum number of alternating update passes. Hard min 1.
    pub max_iterations: usize,

    /// Marginal-violation threshold for convergence. Hard min
    /// [`MIN_TOLERANCE`].
    pub tolerance: f64,

    /// Run the dense kernels on the GPU when the `cuda` feature is
    /// enabled and a device is available; falls back to CPU otherwise.
    pub use_gpu: bool,

    /// Attach [`SolveDiagnostics`] to the result.
    pub emit_diagnostics: bool,
}

impl Default for SinkhornConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.03,
            min_iterations: 3,
            max_iterations: 200,
            tolerance: 1e-8,
            use_gpu: false,
            emit_diagnostics: false,
        }
    }
}

impl SinkhornConfig {
    /// Create a configuration with a custom regularization scale.
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Default::default()
        }
    }

    /// Check every parameter against its domain.
    ///
    /// Called once before a solve starts; a violation aborts the whole
    /// solve with [`SinkhornError::InvalidConfiguration`].
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < MIN_EPSILON {
            return Err(SinkhornError::InvalidConfiguration(format!(
                "epsilon must be a finite value of at least {MIN_EPSILON}, got {}",
                self.epsilon
            )));
        }
        if self.max_iterations < 1 {
            return Err(SinkhornError::InvalidConfiguration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.min_iterations > self.max_iterations {
            return Err(SinkhornError::InvalidConfiguration(format!(
                "min_iterations ({}) exceeds max_iterations ({})",
                self.min_iterations, self.max_iterations
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < MIN_TOLERANCE {
            return Err(SinkhornError::InvalidConfiguration(format!(
                "tolerance must be a finite value of at least {MIN_TOLERANCE}, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Why the iteration stopped.
///
/// All variants are terminal; the first satisfied condition in the order
/// below determines the reported reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Marginal-violation error fell below the tolerance.
    ConvergedByError,

    /// The potentials stopped changing at f64 precision before the error
    /// reached the tolerance.
    Stagnated,

    /// The iteration budget ran out. The returned positions are still the
    /// best found; callers wanting stricter guarantees inspect this.
    MaxIterationsReached,
}

impl TerminationReason {
    /// Whether the solve met the error tolerance.
    pub fn is_converged(&self) -> bool {
        matches!(self, TerminationReason::ConvergedByError)
    }
}

/// Scalar diagnostics of a completed solve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    /// Completed alternating-update passes.
    pub iterations: usize,

    /// Why iteration stopped.
    pub termination_reason: TerminationReason,

    /// L1 marginal violation after the final pass.
    pub marginal_error: f64,
}

/// Output of a solve: one updated position per source point, in source
/// input order, plus diagnostics when requested.
#[derive(Debug, Clone)]
pub struct SinkhornResult {
    /// Resolved positions, indexed identically to the input source cloud.
    pub positions: Vec<[f64; 3]>,

    /// Present when `emit_diagnostics` was set.
    pub diagnostics: Option<SolveDiagnostics>,
}
