//! Cost matrix construction (pairwise squared Euclidean distances).
//!
//! The cost matrix is the only quantity derived from the raw point
//! coordinates; everything downstream (potential updates, marginal error,
//! position resolution) reads it immutably.

use nalgebra::DMatrix;

use crate::error::{Result, SinkhornError};

/// Dense N×M cost matrix, row-major.
///
/// `C[i][j]` is the squared Euclidean distance between source point `i`
/// and target point `j`. Immutable once built.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl CostMatrix {
    pub(crate) fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { data, rows, cols }
    }

    /// Number of source points (rows).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of target points (columns).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Entry `C[i][j]`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Row `i` as a contiguous slice of length `cols`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Flat row-major view of all entries.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Build the cost matrix for a source/target cloud pair.
///
/// Fails with [`SinkhornError::InvalidInput`] if either cloud is empty;
/// the solver cannot proceed without at least one point on each side.
pub fn build_cost_matrix(source: &[[f64; 3]], target: &[[f64; 3]]) -> Result<CostMatrix> {
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
    Ok(pairwise_sq_dists(source, target))
}

/// Dense pairwise squared distances via the expanded form
/// `‖s‖² + ‖t‖² − 2·s·tᵀ`, with the cross terms as one N×M matrix product.
pub(crate) fn pairwise_sq_dists(source: &[[f64; 3]], target: &[[f64; 3]]) -> CostMatrix {
    let n = source.len();
    let m = target.len();

    let src = DMatrix::from_fn(n, 3, |i, k| source[i][k]);
    let tgt = DMatrix::from_fn(m, 3, |j, k| target[j][k]);
    let cross = &src * tgt.transpose();

    let src_sq: Vec<f64> = source
        .iter()
        .map(|p| p[0] * p[0] + p[1] * p[1] + p[2] * p[2])
        .collect();
    let tgt_sq: Vec<f64> = target
        .iter()
        .map(|p| p[0] * p[0] + p[1] * p[1] + p[2] * p[2])
        .collect();

    let mut data = Vec::with_capacity(n * m);
    for i in 0..n {
        for j in 0..m {
            // Round-off in the expanded form can dip slightly below zero
            // for near-coincident points; clamp to keep C non-negative.
            data.push((src_sq[i] + tgt_sq[j] - 2.0 * cross[(i, j)]).max(0.0));
        }
    }

    CostMatrix::from_vec(data, n, m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sq_dist(a: [f64; 3], b: [f64; 3]) -> f64 {
        (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
    }

    #[test]
    fn test_entries_match_direct_distances() {
        let source = vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-4.0, 0.5, 2.0]];
        let target = vec![[1.0, 0.0, 0.0], [0.0, -2.0, 5.0]];

        let cost = build_cost_matrix(&source, &target).unwrap();
        assert_eq!(cost.rows(), 3);
        assert_eq!(cost.cols(), 2);

        for (i, s) in source.iter().enumerate() {
            for (j, t) in target.iter().enumerate() {
                assert_relative_eq!(cost.get(i, j), sq_dist(*s, *t), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_coincident_points_clamp_to_zero() {
        // Coordinates chosen so the expanded form accumulates round-off.
        let p = [1e8 + 0.1, -1e8 + 0.2, 0.3];
        let cost = build_cost_matrix(&[p], &[p]).unwrap();
        assert!(cost.get(0, 0) >= 0.0);
    }

    #[test]
    fn test_empty_source_is_invalid_input() {
        let err = build_cost_matrix(&[], &[[0.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, SinkhornError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_target_is_invalid_input() {
        let err = build_cost_matrix(&[[0.0, 0.0, 0.0]], &[]).unwrap_err();
        assert!(matches!(err, SinkhornError::InvalidInput(_)));
    }

    #[test]
    fn test_row_view_matches_entries() {
        let source = vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let target = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 3.0]];
        let cost = build_cost_matrix(&source, &target).unwrap();

        let row = cost.row(1);
        assert_eq!(row.len(), 3);
        for j in 0..3 {
            assert_eq!(row[j], cost.get(1, j));
        }
    }
}
