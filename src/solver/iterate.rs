//! The log-domain Sinkhorn iteration.
//!
//! Each pass performs one full alternating update of the dual potentials,
//! Gauss–Seidel style: the column update sees the row potential refreshed
//! in the same pass. Termination is evaluated after every completed pass,
//! in priority order, and never before `min_iterations` passes.

use tracing::{debug, trace};

use super::types::{SinkhornConfig, TerminationReason};
use crate::backend::SinkhornKernels;
use crate::cost::CostMatrix;
use crate::marginals::{Marginals, Potentials};

/// Largest (f, g) step still treated as no progress: below this the
/// potentials are pinned at f64 resolution and further passes cannot
/// improve the coupling.
const STAGNATION_FLOOR: f64 = 1e-14;

/// State handed to the resolver after the loop stops.
pub(crate) struct IterationOutcome {
    pub potentials: Potentials,
    pub iterations: usize,
    pub reason: TerminationReason,
    pub marginal_error: f64,
}

/// Run the alternating updates until one of the three termination
/// conditions fires. Infallible: parameter domains are validated before
/// this is called, and non-convergence is a normal terminal state.
pub(crate) fn run(
    kernels: &dyn SinkhornKernels,
    cost: &CostMatrix,
    marginals: &Marginals,
    config: &SinkhornConfig,
) -> IterationOutcome {
    let mut potentials = Potentials::zeros(cost.rows(), cost.cols());
    let mut prev_f = potentials.f.clone();
    let mut prev_g = potentials.g.clone();

    let mut marginal_error = f64::INFINITY;
    let mut reason = TerminationReason::MaxIterationsReached;
    let mut completed = 0;

    for pass in 1..=config.max_iterations {
        completed = pass;
        prev_f.copy_from_slice(&potentials.f);
        prev_g.copy_from_slice(&potentials.g);

        kernels.update_row_potential(
            cost,
            &potentials.g,
            &marginals.log_nu,
            config.epsilon,
            &mut potentials.f,
        );
        kernels.update_col_potential(
            cost,
            &potentials.f,
            &marginals.log_mu,
            config.epsilon,
            &mut potentials.g,
        );

        marginal_error = kernels.row_marginal_error(
            cost,
            &potentials.f,
            &potentials.g,
            &marginals.mu,
            &marginals.log_nu,
            config.epsilon,
        );
        trace!(pass, marginal_error, "sinkhorn pass");

        if pass < config.min_iterations {
            continue;
        }
        if marginal_error < config.tolerance {
            reason = TerminationReason::ConvergedByError;
            break;
        }
        let step = max_abs_delta(&potentials.f, &prev_f).max(max_abs_delta(&potentials.g, &prev_g));
        if step < STAGNATION_FLOOR {
            reason = TerminationReason::Stagnated;
            break;
        }
    }

    debug!(
        iterations = completed,
        ?reason,
        marginal_error,
        "sinkhorn iteration finished"
    );

    IterationOutcome {
        potentials,
        iterations: completed,
        reason,
        marginal_error,
    }
}

fn max_abs_delta(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cpu::CpuKernels;
    use crate::cost;

    /// Scripted backend: replays a fixed error sequence and moves the
    /// potentials by a fixed step each pass. Lets the termination logic be
    /// exercised without depending on a particular problem's convergence
    /// path.
    struct ScriptedKernels {
        errors: Vec<f64>,
        step: f64,
        pass: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedKernels {
        fn new(errors: Vec<f64>, step: f64) -> Self {
            Self {
                errors,
                step,
                pass: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl SinkhornKernels for ScriptedKernels {
        fn cost_matrix(&self, source: &[[f64; 3]], target: &[[f64; 3]]) -> CostMatrix {
            cost::pairwise_sq_dists(source, target)
        }

        fn update_row_potential(
            &self,
            _cost: &CostMatrix,
            _g: &[f64],
            _log_nu: &[f64],
            _epsilon: f64,
            f: &mut [f64],
        ) {
            for v in f.iter_mut() {
                *v += self.step;
            }
        }

        fn update_col_potential(
            &self,
            _cost: &CostMatrix,
            _f: &[f64],
            _log_mu: &[f64],
            _epsilon: f64,
            g: &mut [f64],
        ) {
            for v in g.iter_mut() {
                *v += self.step;
            }
        }

        fn row_marginal_error(
            &self,
            _cost: &CostMatrix,
            _f: &[f64],
            _g: &[f64],
            _mu: &[f64],
            _log_nu: &[f64],
            _epsilon: f64,
        ) -> f64 {
            let i = self
                .pass
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.errors[i.min(self.errors.len() - 1)]
        }

        fn resolve_positions(
            &self,
            cost: &CostMatrix,
            _f: &[f64],
            _g: &[f64],
            _log_nu: &[f64],
            _epsilon: f64,
            _target: &[[f64; 3]],
        ) -> Vec<[f64; 3]> {
            vec![[0.0; 3]; cost.rows()]
        }
    }

    fn tiny_problem() -> (CostMatrix, Marginals) {
        let source = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let target = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let cost = cost::pairwise_sq_dists(&source, &target);
        let marginals = Marginals::uniform(2, 2);
        (cost, marginals)
    }

    fn config(min: usize, max: usize, tolerance: f64) -> SinkhornConfig {
        SinkhornConfig {
            min_iterations: min,
            max_iterations: max,
            tolerance,
            ..Default::default()
        }
    }

    #[test]
    fn test_converges_by_error_when_tolerance_met() {
        let (cost, marginals) = tiny_problem();
        let kernels = ScriptedKernels::new(vec![1.0, 0.5, 1e-10], 0.1);

        let outcome = run(&kernels, &cost, &marginals, &config(0, 50, 1e-8));
        assert_eq!(outcome.reason, TerminationReason::ConvergedByError);
        assert_eq!(outcome.iterations, 3);
        assert!(outcome.marginal_error < 1e-8);
    }

    #[test]
    fn test_min_iterations_defers_convergence() {
        // Error is below tolerance from the first pass, but the floor
        // forbids stopping before pass 5.
        let (cost, marginals) = tiny_problem();
        let kernels = ScriptedKernels::new(vec![1e-12], 0.1);

        let outcome = run(&kernels, &cost, &marginals, &config(5, 50, 1e-8));
        assert_eq!(outcome.reason, TerminationReason::ConvergedByError);
        assert_eq!(outcome.iterations, 5);
    }

    #[test]
    fn test_stagnation_when_potentials_freeze() {
        // Error never reaches the tolerance but the potentials stop moving.
        let (cost, marginals) = tiny_problem();
        let kernels = ScriptedKernels::new(vec![1e-3], 0.0);

        let outcome = run(&kernels, &cost, &marginals, &config(0, 50, 1e-8));
        assert_eq!(outcome.reason, TerminationReason::Stagnated);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_error_has_priority_over_stagnation() {
        // Both conditions hold on the first eligible pass; the reported
        // reason must be the error-based one.
        let (cost, marginals) = tiny_problem();
        let kernels = ScriptedKernels::new(vec![1e-12], 0.0);

        let outcome = run(&kernels, &cost, &marginals, &config(0, 50, 1e-8));
        assert_eq!(outcome.reason, TerminationReason::ConvergedByError);
    }

    #[test]
    fn test_max_iterations_reached() {
        let (cost, marginals) = tiny_problem();
        let kernels = ScriptedKernels::new(vec![1.0], 0.1);

        let outcome = run(&kernels, &cost, &marginals, &config(0, 7, 1e-8));
        assert_eq!(outcome.reason, TerminationReason::MaxIterationsReached);
        assert_eq!(outcome.iterations, 7);
    }

    #[test]
    fn test_identical_clouds_converge_fast_on_cpu() {
        let (cost, marginals) = tiny_problem();
        let kernels = CpuKernels::new();

        let outcome = run(&kernels, &cost, &marginals, &SinkhornConfig::default());
        assert_eq!(outcome.reason, TerminationReason::ConvergedByError);
        // min_iterations is the floor; identical clouds should stop right
        // at or barely above it.
        assert!(outcome.iterations <= 6, "took {}", outcome.iterations);
    }
}
