//! Marginal weights and dual-potential initialization.

use crate::error::{Result, SinkhornError};
use crate::numerics::LOG_GUARD;

/// Prescribed marginal mass for both sides of the coupling.
///
/// μ (length N) and ν (length M) each sum to 1 after ingest; the element
/// logs are precomputed once since every iteration reads them. Never
/// mutated during iteration.
#[derive(Debug, Clone)]
pub struct Marginals {
    /// Source weights μ, summing to 1.
    pub mu: Vec<f64>,
    /// Target weights ν, summing to 1.
    pub nu: Vec<f64>,
    /// Element-wise `ln(μ + guard)`.
    pub log_mu: Vec<f64>,
    /// Element-wise `ln(ν + guard)`.
    pub log_nu: Vec<f64>,
}

impl Marginals {
    /// Uniform marginals: `μ[i] = 1/N`, `ν[j] = 1/M`.
    pub fn uniform(num_sources: usize, num_targets: usize) -> Self {
        let mu = vec![1.0 / num_sources as f64; num_sources];
        let nu = vec![1.0 / num_targets as f64; num_targets];
        Self::from_normalized(mu, nu)
    }

    /// Marginals from optional explicit weights; `None` means uniform.
    ///
    /// Explicit weights are validated (matching length, positive finite
    /// sum) and then normalized to sum to 1, as the coupling definition
    /// assumes probability mass on both sides.
    pub fn new(
        num_sources: usize,
        num_targets: usize,
        source_weights: Option<&[f64]>,
        target_weights: Option<&[f64]>,
    ) -> Result<Self> {
        let mu = match source_weights {
            Some(w) => normalized_weights(w, num_sources, "source")?,
            None => vec![1.0 / num_sources as f64; num_sources],
        };
        let nu = match target_weights {
            Some(w) => normalized_weights(w, num_targets, "target")?,
            None => vec![1.0 / num_targets as f64; num_targets],
        };
        Ok(Self::from_normalized(mu, nu))
    }

    fn from_normalized(mu: Vec<f64>, nu: Vec<f64>) -> Self {
        let log_mu = mu.iter().map(|w| (w + LOG_GUARD).ln()).collect();
        let log_nu = nu.iter().map(|w| (w + LOG_GUARD).ln()).collect();
        Self {
            mu,
            nu,
            log_mu,
            log_nu,
        }
    }
}

fn normalized_weights(weights: &[f64], expected_len: usize, side: &str) -> Result<Vec<f64>> {
    if weights.len() != expected_len {
        return Err(SinkhornError::InvalidInput(format!(
            "{side} weight vector has length {} but the cloud has {} points",
            weights.len(),
            expected_len
        )));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(SinkhornError::InvalidInput(format!(
            "{side} weights must be finite and non-negative"
        )));
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(SinkhornError::InvalidInput(format!(
            "{side} weights must sum to a positive value, got {sum}"
        )));
    }
    Ok(weights.iter().map(|w| w / sum).collect())
}

/// The two dual potential vectors, the only state the iterator advances.
#[derive(Debug, Clone)]
pub struct Potentials {
    /// Row potential f, length N.
    pub f: Vec<f64>,
    /// Column potential g, length M.
    pub g: Vec<f64>,
}

impl Potentials {
    /// Zero-initialized potentials for an N×M solve.
    pub fn zeros(num_sources: usize, num_targets: usize) -> Self {
        Self {
            f: vec![0.0; num_sources],
            g: vec![0.0; num_targets],
        }
    }
}
