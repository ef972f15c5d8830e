//! Dense-array kernel backends.
//!
//! Every per-element operation of the solver (cost matrix entries, the
//! log-sum-exp reductions, the barycentric weighted sums) is data-parallel,
//! so the iterator and resolver are written once against the
//! [`SinkhornKernels`] trait and the backends only differ in where the
//! dense work runs:
//!
//! - [`cpu::CpuKernels`] — host memory, `nalgebra` dense ops and `rayon`
//!   parallel reductions.
//! - `gpu::GpuKernels` (feature `cuda`) — device memory, CubeCL CUDA
//!   kernels with one thread per row/column.

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod gpu;

use tracing::debug;

use crate::cost::CostMatrix;

/// The dense operations a Sinkhorn solve is composed of.
///
/// Callers guarantee non-empty clouds and consistent lengths: `f`/`mu`/
/// `log_mu` have `cost.rows()` entries, `g`/`nu`/`log_nu` have
/// `cost.cols()` entries. Implementations never mutate the cost matrix or
/// the marginals.
pub trait SinkhornKernels: Send + Sync {
    /// Dense pairwise squared Euclidean distances, N×M row-major.
    fn cost_matrix(&self, source: &[[f64; 3]], target: &[[f64; 3]]) -> CostMatrix;

    /// Row-potential update: for every source row `i`,
    /// `f[i] ← −ε·lse_j((g[j] − C[i][j])/ε + ln ν[j])`.
    fn update_row_potential(
        &self,
        cost: &CostMatrix,
        g: &[f64],
        log_nu: &[f64],
        epsilon: f64,
        f: &mut [f64],
    );

    /// Column-potential update: for every target column `j`,
    /// `g[j] ← −ε·lse_i((f[i] − C[i][j])/ε + ln μ[i])`.
    fn update_col_potential(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        log_mu: &[f64],
        epsilon: f64,
        g: &mut [f64],
    );

    /// L1 violation of the row marginal: `Σ_i |rowsum[i] − μ[i]|` where
    /// `rowsum[i]` is the row sum of the implicit coupling
    /// `P[i][j] = exp((f[i] + g[j] − C[i][j])/ε)·μ[i]·ν[j]`.
    ///
    /// The column update runs last in each pass and satisfies the column
    /// marginal exactly, so the row side is the one carrying the residual.
    fn row_marginal_error(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        g: &[f64],
        mu: &[f64],
        log_nu: &[f64],
        epsilon: f64,
    ) -> f64;

    /// Stabilized barycentric positions: for every source row, the
    /// normalized soft assignment over targets applied to the target
    /// coordinates. Returns `cost.rows()` positions in row order.
    fn resolve_positions(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        g: &[f64],
        log_nu: &[f64],
        epsilon: f64,
        target: &[[f64; 3]],
    ) -> Vec<[f64; 3]>;
}

/// Pick the backend for a solve. GPU is used only when requested, compiled
/// in, and a device answers; everything else falls back to the CPU path.
pub(crate) fn select(use_gpu: bool) -> Box<dyn SinkhornKernels> {
    #[cfg(feature = "cuda")]
    if use_gpu {
        if gpu::is_cuda_available() {
            debug!("using CUDA kernel backend");
            return Box::new(gpu::GpuKernels::new());
        }
        debug!("CUDA requested but no device available, falling back to CPU");
    }

    #[cfg(not(feature = "cuda"))]
    if use_gpu {
        debug!("CUDA requested but the `cuda` feature is disabled, using CPU");
    }

    Box::new(cpu::CpuKernels::new())
}
