//! CubeCL kernels for the dense Sinkhorn operations.
//!
//! One thread per cost-matrix entry for construction, one thread per row
//! or column for the log-sum-exp reductions and the barycenter. Each
//! reduction makes two passes over its row/column: max first, then the
//! shifted exponential sum, the same stabilization the CPU path uses.
//!
//! Callers guarantee at least one row and one column, so the max passes
//! can seed from element 0 instead of a negative-infinity literal.

use cubecl::prelude::*;

/// Dense pairwise squared Euclidean distances.
///
/// Each thread computes one `cost[i * num_targets + j]` entry from the
/// flattened `[x, y, z, ...]` point buffers.
#[cube(launch_unchecked)]
pub fn pairwise_sq_dist_kernel<F: Float>(
    source: &Array<F>,
    target: &Array<F>,
    num_sources: u32,
    num_targets: u32,
    cost: &mut Array<F>,
) {
    let idx = ABSOLUTE_POS;

    if idx >= num_sources * num_targets {
        terminate!();
    }

    let i = idx / num_targets;
    let j = idx % num_targets;
    let sbase = i * 3;
    let tbase = j * 3;

    let dx = source[sbase] - target[tbase];
    let dy = source[sbase + 1] - target[tbase + 1];
    let dz = source[sbase + 2] - target[tbase + 2];

    cost[idx] = dx * dx + dy * dy + dz * dz;
}

/// Row-potential update: `f[i] = -eps * lse_j((g[j] - C[ij])/eps + log_nu[j])`.
#[cube(launch_unchecked)]
pub fn row_potential_kernel<F: Float>(
    cost: &Array<F>,
    g: &Array<F>,
    log_nu: &Array<F>,
    epsilon: F,
    num_rows: u32,
    num_cols: u32,
    f_out: &mut Array<F>,
) {
    let row = ABSOLUTE_POS;

    if row >= num_rows {
        terminate!();
    }

    let base = row * num_cols;

    let mut max_term = (g[0] - cost[base]) / epsilon + log_nu[0];
    for j in 1..num_cols {
        let term = (g[j] - cost[base + j]) / epsilon + log_nu[j];
        if term > max_term {
            max_term = term;
        }
    }

    let mut sum = F::new(0.0);
    for j in 0..num_cols {
        let term = (g[j] - cost[base + j]) / epsilon + log_nu[j];
        sum += F::exp(term - max_term);
    }

    f_out[row] = F::new(-1.0) * epsilon * (max_term + F::ln(sum));
}

/// Column-potential update: `g[j] = -eps * lse_i((f[i] - C[ij])/eps + log_mu[i])`.
///
/// Column access is strided by `num_cols`.
#[cube(launch_unchecked)]
pub fn col_potential_kernel<F: Float>(
    cost: &Array<F>,
    f: &Array<F>,
    log_mu: &Array<F>,
    epsilon: F,
    num_rows: u32,
    num_cols: u32,
    g_out: &mut Array<F>,
) {
    let col = ABSOLUTE_POS;

    if col >= num_cols {
        terminate!();
    }

    let mut max_term = (f[0] - cost[col]) / epsilon + log_mu[0];
    for i in 1..num_rows {
        let term = (f[i] - cost[i * num_cols + col]) / epsilon + log_mu[i];
        if term > max_term {
            max_term = term;
        }
    }

    let mut sum = F::new(0.0);
    for i in 0..num_rows {
        let term = (f[i] - cost[i * num_cols + col]) / epsilon + log_mu[i];
        sum += F::exp(term - max_term);
    }

    g_out[col] = F::new(-1.0) * epsilon * (max_term + F::ln(sum));
}

/// Per-row marginal violation: `|mu[i] * exp(f[i]/eps + lse_i) - mu[i]|`
/// where `lse_i` is the same reduction as the row-potential update. The
/// host sums the per-row values.
#[cube(launch_unchecked)]
pub fn row_marginal_error_kernel<F: Float>(
    cost: &Array<F>,
    f: &Array<F>,
    g: &Array<F>,
    log_nu: &Array<F>,
    mu: &Array<F>,
    epsilon: F,
    num_rows: u32,
    num_cols: u32,
    errors: &mut Array<F>,
) {
    let row = ABSOLUTE_POS;

    if row >= num_rows {
        terminate!();
    }

    let base = row * num_cols;

    let mut max_term = (g[0] - cost[base]) / epsilon + log_nu[0];
    for j in 1..num_cols {
        let term = (g[j] - cost[base + j]) / epsilon + log_nu[j];
        if term > max_term {
            max_term = term;
        }
    }

    let mut sum = F::new(0.0);
    for j in 0..num_cols {
        let term = (g[j] - cost[base + j]) / epsilon + log_nu[j];
        sum += F::exp(term - max_term);
    }

    let lse = max_term + F::ln(sum);
    let row_sum = mu[row] * F::exp(f[row] / epsilon + lse);

    let diff = row_sum - mu[row];
    if diff < F::new(0.0) {
        errors[row] = F::new(-1.0) * diff;
    } else {
        errors[row] = diff;
    }
}

/// Stabilized barycenter of one coupling row, written as three floats per
/// source point into the flattened output buffer.
#[cube(launch_unchecked)]
pub fn resolve_positions_kernel<F: Float>(
    cost: &Array<F>,
    f: &Array<F>,
    g: &Array<F>,
    log_nu: &Array<F>,
    target: &Array<F>,
    epsilon: F,
    num_rows: u32,
    num_cols: u32,
    positions: &mut Array<F>,
) {
    let row = ABSOLUTE_POS;

    if row >= num_rows {
        terminate!();
    }

    let base = row * num_cols;
    let f_row = f[row];

    let mut max_term = (f_row + g[0] - cost[base]) / epsilon + log_nu[0];
    for j in 1..num_cols {
        let term = (f_row + g[j] - cost[base + j]) / epsilon + log_nu[j];
        if term > max_term {
            max_term = term;
        }
    }

    let mut weight_sum = F::new(0.0);
    let mut px = F::new(0.0);
    let mut py = F::new(0.0);
    let mut pz = F::new(0.0);

    for j in 0..num_cols {
        let term = (f_row + g[j] - cost[base + j]) / epsilon + log_nu[j];
        let w = F::exp(term - max_term);
        let tbase = j * 3;
        weight_sum += w;
        px += w * target[tbase];
        py += w * target[tbase + 1];
        pz += w * target[tbase + 2];
    }

    let out = row * 3;
    positions[out] = px / weight_sum;
    positions[out + 1] = py / weight_sum;
    positions[out + 2] = pz / weight_sum;
}
