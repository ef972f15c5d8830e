//! High-level optimal-transport API.
//!
//! [`SinkhornTransport`] validates the configuration once, selects a
//! kernel backend, and then runs self-contained solves: every call builds
//! its own cost matrix, marginals, and potentials, and nothing persists
//! between calls.

use rayon::prelude::*;

use crate::backend::{self, SinkhornKernels};
use crate::error::{Result, SinkhornError};
use crate::marginals::Marginals;
use crate::solver::{self, SinkhornConfig, SinkhornResult, SolveDiagnostics};

/// Sinkhorn optimal-transport solver for 3-D point clouds.
///
/// Moves every source point to the soft barycenter of the targets under
/// the entropic-regularized coupling between the two clouds.
pub struct SinkhornTransport {
    config: SinkhornConfig,
    kernels: Box<dyn SinkhornKernels>,
}

impl SinkhornTransport {
    /// Create a solver with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(SinkhornConfig::default())
    }

    /// Create a solver with a custom configuration.
    ///
    /// Fails with [`SinkhornError::InvalidConfiguration`] if any parameter
    /// is outside its domain.
    pub fn with_config(config: SinkhornConfig) -> Result<Self> {
        config.validate()?;
        let kernels = backend::select(config.use_gpu);
        Ok(Self { config, kernels })
    }

    /// Create a builder for configuring the solver.
    pub fn builder() -> SinkhornTransportBuilder {
        SinkhornTransportBuilder::new()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &SinkhornConfig {
        &self.config
    }

    /// Solve with uniform marginal weights.
    ///
    /// Returns one updated position per source point, in source input
    /// order. Fails with [`SinkhornError::InvalidInput`] if either cloud
    /// is empty.
    pub fn transport(&self, source: &[[f64; 3]], target: &[[f64; 3]]) -> Result<SinkhornResult> {
        self.transport_with_weights(source, target, None, None)
    }

    /// Solve with optional explicit marginal weights.
    ///
    /// `None` on either side means uniform mass. Explicit weights must
    /// match their cloud's length and sum to a positive value; they are
    /// normalized to probability mass before the solve.
    pub fn transport_with_weights(
        &self,
        source: &[[f64; 3]],
        target: &[[f64; 3]],
        source_weights: Option<&[f64]>,
        target_weights: Option<&[f64]>,
    ) -> Result<SinkhornResult> {
        validate_clouds(source, target)?;
        let marginals = Marginals::new(source.len(), target.len(), source_weights, target_weights)?;

        let cost = self.kernels.cost_matrix(source, target);
        let outcome = solver::run(self.kernels.as_ref(), &cost, &marginals, &self.config);
        let positions = self.kernels.resolve_positions(
            &cost,
            &outcome.potentials.f,
            &outcome.potentials.g,
            &marginals.log_nu,
            self.config.epsilon,
            target,
        );

        let diagnostics = self.config.emit_diagnostics.then(|| SolveDiagnostics {
            iterations: outcome.iterations,
            termination_reason: outcome.reason,
            marginal_error: outcome.marginal_error,
        });

        Ok(SinkhornResult {
            positions,
            diagnostics,
        })
    }

    /// Solve several source clouds against the same target in parallel.
    ///
    /// Each solve owns its own cost matrix and potentials; nothing is
    /// shared between workers.
    pub fn transport_batch(
        &self,
        sources: &[Vec<[f64; 3]>],
        target: &[[f64; 3]],
    ) -> Result<Vec<SinkhornResult>> {
        sources
            .par_iter()
            .map(|source| self.transport(source, target))
            .collect()
    }
}

/// One-shot solve: validate the configuration, pick a backend, run.
pub fn transport_positions(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    config: &SinkhornConfig,
) -> Result<SinkhornResult> {
    SinkhornTransport::with_config(config.clone())?.transport(source, target)
}

fn validate_clouds(source: &[[f64; 3]], target: &[[f64; 3]]) -> Result<()> {
    if source.is_empty() {
        return Err(SinkhornError::InvalidInput(
            "source point cloud is empty".into(),
        ));
    }
    if target.is_empty() {
        return Err(SinkhornError::InvalidInput(
            "target point cloud is empty".into(),
        ));
    }
    Ok(())
}

/// Builder for [`SinkhornTransport`].
#[derive(Debug, Clone, Default)]
pub struct SinkhornTransportBuilder {
    config: SinkhornConfig,
}

impl SinkhornTransportBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: SinkhornConfig::default(),
        }
    }

    /// Set the entropic regularization scale ε.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Set the minimum number of passes before termination checks.
    pub fn min_iterations(mut self, min_iterations: usize) -> Self {
        self.config.min_iterations = min_iterations;
        self
    }

    /// Set the maximum number of passes.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the marginal-violation convergence tolerance.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    /// Prefer the CUDA backend when available.
    pub fn use_gpu(mut self, use_gpu: bool) -> Self {
        self.config.use_gpu = use_gpu;
        self
    }

    /// Attach iteration count and termination reason to each result.
    pub fn emit_diagnostics(mut self, emit_diagnostics: bool) -> Self {
        self.config.emit_diagnostics = emit_diagnostics;
        self
    }

    /// Build the solver, validating the configuration.
    pub fn build(self) -> Result<SinkhornTransport> {
        SinkhornTransport::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::TerminationReason;
    use crate::test_utils::{make_grid_cloud, translate_cloud};
    use approx::assert_relative_eq;

    fn diagnosing_solver() -> SinkhornTransport {
        SinkhornTransport::builder()
            .emit_diagnostics(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_single_point_moves_to_single_target() {
        let solver = diagnosing_solver();
        let result = solver
            .transport(&[[0.0, 0.0, 0.0]], &[[1.0, 0.0, 0.0]])
            .unwrap();

        assert_eq!(result.positions.len(), 1);
        assert_relative_eq!(result.positions[0][0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(result.positions[0][1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(result.positions[0][2], 0.0, epsilon = 1e-9);

        let diag = result.diagnostics.unwrap();
        assert!(diag.termination_reason.is_converged());
    }

    #[test]
    fn test_identical_two_point_layout_returns_inputs() {
        let cloud = vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]];
        let solver = diagnosing_solver();
        let result = solver.transport(&cloud, &cloud).unwrap();

        for (pos, src) in result.positions.iter().zip(&cloud) {
            for k in 0..3 {
                assert_relative_eq!(pos[k], src[k], epsilon = 1e-6);
            }
        }

        let diag = result.diagnostics.unwrap();
        assert_eq!(
            diag.termination_reason,
            TerminationReason::ConvergedByError
        );
        assert!(diag.iterations <= 6, "took {}", diag.iterations);
    }

    #[test]
    fn test_output_length_matches_source_for_unequal_clouds() {
        let source = make_grid_cloud(3, 3, 1, 1.0);
        let target = make_grid_cloud(2, 2, 2, 1.5);
        assert_ne!(source.len(), target.len());

        let solver = SinkhornTransport::new().unwrap();
        let result = solver.transport(&source, &target).unwrap();
        assert_eq!(result.positions.len(), source.len());
        assert!(result.diagnostics.is_none());
    }

    #[test]
    fn test_marginal_error_does_not_increase() {
        let source = make_grid_cloud(3, 2, 1, 1.0);
        let target = translate_cloud(&source, [0.6, 0.3, 0.0]);

        let run = |max_iterations| {
            SinkhornTransport::builder()
                .epsilon(0.05)
                .min_iterations(0)
                .max_iterations(max_iterations)
                .tolerance(crate::solver::MIN_TOLERANCE)
                .emit_diagnostics(true)
                .build()
                .unwrap()
                .transport(&source, &target)
                .unwrap()
                .diagnostics
                .unwrap()
                .marginal_error
        };

        let initial = run(1);
        let final_error = run(60);
        assert!(
            final_error <= initial + 1e-12,
            "error grew: {initial} -> {final_error}"
        );
    }

    #[test]
    fn test_skewed_target_weights_pull_all_mass() {
        // With essentially all target mass on the first point and targets
        // close together, every source point must resolve onto it.
        let solver = SinkhornTransport::new().unwrap();
        let target = [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]];
        let result = solver
            .transport_with_weights(
                &[[0.05, 0.0, 0.0]],
                &target,
                None,
                Some(&[1.0, 0.0]),
            )
            .unwrap();

        assert_relative_eq!(result.positions[0][0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_batch_matches_individual_solves() {
        let target = make_grid_cloud(2, 2, 1, 1.0);
        let sources = vec![
            translate_cloud(&target, [0.2, 0.0, 0.0]),
            translate_cloud(&target, [0.0, 0.4, 0.0]),
        ];

        let solver = SinkhornTransport::new().unwrap();
        let batch = solver.transport_batch(&sources, &target).unwrap();
        assert_eq!(batch.len(), 2);

        for (source, batched) in sources.iter().zip(&batch) {
            let single = solver.transport(source, &target).unwrap();
            for (a, b) in batched.positions.iter().zip(&single.positions) {
                for k in 0..3 {
                    assert_relative_eq!(a[k], b[k], epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_empty_source_is_invalid_input() {
        let solver = SinkhornTransport::new().unwrap();
        let err = solver.transport(&[], &[[0.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, SinkhornError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_target_is_invalid_input() {
        let solver = SinkhornTransport::new().unwrap();
        let err = solver.transport(&[[0.0, 0.0, 0.0]], &[]).unwrap_err();
        assert!(matches!(err, SinkhornError::InvalidInput(_)));
    }

    #[test]
    fn test_zero_max_iterations_is_invalid_configuration() {
        let result = SinkhornTransport::builder().max_iterations(0).build();
        assert!(matches!(
            result,
            Err(SinkhornError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_one_shot_helper() {
        let config = SinkhornConfig {
            emit_diagnostics: true,
            ..Default::default()
        };
        let result =
            transport_positions(&[[0.0, 0.0, 0.0]], &[[1.0, 0.0, 0.0]], &config).unwrap();
        assert_eq!(result.positions.len(), 1);
        assert!(result.diagnostics.is_some());
    }
}
