//! Shared numerics helpers for log-domain computations.

/// Guard added to weights before taking logs so that a zero weight maps to
/// a very negative but finite log instead of -inf. Small enough not to
/// perturb the solve at f64 precision.
pub(crate) const LOG_GUARD: f64 = 1e-256;

/// Stabilized log-sum-exp of a slice.
///
/// Computed as `max(x) + ln(Σ exp(x - max(x)))` so that neither the
/// exponentials nor the sum can overflow. Returns `-inf` for an empty
/// slice (the log of an empty sum).
pub fn log_sum_exp(values: &[f64]) -> f64 {
    log_sum_exp_by(values.len(), |i| values[i])
}

/// Log-sum-exp over `term(0..len)` without materializing the terms.
///
/// The terms are evaluated twice (max pass, then sum pass); callers keep
/// them cheap. This is the reduction both potential updates and the
/// marginal-error check are built on.
pub(crate) fn log_sum_exp_by(len: usize, term: impl Fn(usize) -> f64) -> f64 {
    let mut max = f64::NEG_INFINITY;
    for i in 0..len {
        let v = term(i);
        if v > max {
            max = v;
        }
    }
    if !max.is_finite() {
        // Empty input or all terms -inf (or a +inf term): the shifted sum
        // is meaningless, the max already is the answer.
        return max;
    }
    let mut sum = 0.0;
    for i in 0..len {
        sum += (term(i) - max).exp();
    }
    max + sum.ln()
}
