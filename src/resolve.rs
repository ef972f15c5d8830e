//! Position resolution: converged dual potentials to output coordinates.
//!
//! Each source point lands on the ν-weighted barycenter of the targets
//! under its (implicit) coupling row. The exponents are the same
//! `(f[i] + g[j] − C[i][j])/ε + ln ν[j]` terms the iterator reduces over;
//! the μ[i] division from the coupling definition cancels in the row
//! normalization and is never applied.

/// Normalized soft-assignment weights of one coupling row.
///
/// Stabilized by subtracting the row's own maximum exponent before
/// exponentiating; the result sums to 1 by construction (up to round-off).
pub fn row_weights(
    cost_row: &[f64],
    f_i: f64,
    g: &[f64],
    log_nu: &[f64],
    epsilon: f64,
) -> Vec<f64> {
    let mut max = f64::NEG_INFINITY;
    for j in 0..g.len() {
        let a = (f_i + g[j] - cost_row[j]) / epsilon + log_nu[j];
        if a > max {
            max = a;
        }
    }
    let mut weights: Vec<f64> = (0..g.len())
        .map(|j| ((f_i + g[j] - cost_row[j]) / epsilon + log_nu[j] - max).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Resolved position of one source point: its row's soft assignment
/// applied to the target coordinates.
///
/// Same stabilization as [`row_weights`], fused with the weighted sum so
/// no per-row weight vector is allocated.
pub fn softmax_barycenter(
    cost_row: &[f64],
    f_i: f64,
    g: &[f64],
    log_nu: &[f64],
    epsilon: f64,
    target: &[[f64; 3]],
) -> [f64; 3] {
    let mut max = f64::NEG_INFINITY;
    for j in 0..g.len() {
        let a = (f_i + g[j] - cost_row[j]) / epsilon + log_nu[j];
        if a > max {
            max = a;
        }
    }

    let mut weight_sum = 0.0;
    let mut pos = [0.0f64; 3];
    for j in 0..g.len() {
        let w = ((f_i + g[j] - cost_row[j]) / epsilon + log_nu[j] - max).exp();
        weight_sum += w;
        pos[0] += w * target[j][0];
        pos[1] += w * target[j][1];
        pos[2] += w * target[j][2];
    }

    // The max exponent contributes exp(0) = 1, so weight_sum >= 1 and the
    // division is always safe.
    [
        pos[0] / weight_sum,
        pos[1] / weight_sum,
        pos[2] / weight_sum,
    ]
}
