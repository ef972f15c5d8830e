//! Host-memory kernel backend.
//!
//! Dense work runs on the CPU: the cost matrix through `nalgebra`'s dense
//! matrix product, the per-row/per-column reductions through `rayon`.

use rayon::prelude::*;

use super::SinkhornKernels;
use crate::cost::{self, CostMatrix};
use crate::numerics::log_sum_exp_by;
use crate::resolve::softmax_barycenter;

/// CPU backend. Stateless; one instance serves any number of solves.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernels;

impl CpuKernels {
    pub fn new() -> Self {
        Self
    }
}

impl SinkhornKernels for CpuKernels {
    fn cost_matrix(&self, source: &[[f64; 3]], target: &[[f64; 3]]) -> CostMatrix {
        cost::pairwise_sq_dists(source, target)
    }

    fn update_row_potential(
        &self,
        cost: &CostMatrix,
        g: &[f64],
        log_nu: &[f64],
        epsilon: f64,
        f: &mut [f64],
    ) {
        f.par_iter_mut().enumerate().for_each(|(i, f_i)| {
            let row = cost.row(i);
            let lse = log_sum_exp_by(g.len(), |j| (g[j] - row[j]) / epsilon + log_nu[j]);
            *f_i = -epsilon * lse;
        });
    }

    fn update_col_potential(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        log_mu: &[f64],
        epsilon: f64,
        g: &mut [f64],
    ) {
        g.par_iter_mut().enumerate().for_each(|(j, g_j)| {
            let lse = log_sum_exp_by(f.len(), |i| (f[i] - cost.get(i, j)) / epsilon + log_mu[i]);
            *g_j = -epsilon * lse;
        });
    }

    fn row_marginal_error(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        g: &[f64],
        mu: &[f64],
        log_nu: &[f64],
        epsilon: f64,
    ) -> f64 {
        (0..cost.rows())
            .into_par_iter()
            .map(|i| {
                let row = cost.row(i);
                let lse = log_sum_exp_by(g.len(), |j| (g[j] - row[j]) / epsilon + log_nu[j]);
                let row_sum = mu[i] * (f[i] / epsilon + lse).exp();
                (row_sum - mu[i]).abs()
            })
            .sum()
    }

    fn resolve_positions(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        g: &[f64],
        log_nu: &[f64],
        epsilon: f64,
        target: &[[f64; 3]],
    ) -> Vec<[f64; 3]> {
        (0..cost.rows())
            .into_par_iter()
            .map(|i| softmax_barycenter(cost.row(i), f[i], g, log_nu, epsilon, target))
            .collect()
    }
}
