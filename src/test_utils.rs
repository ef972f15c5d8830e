//! Synthetic point-cloud generators for testing.
//!
//! Deterministic clouds with known structure, so transport results can be
//! checked against geometric expectations.

/// Regular axis-aligned grid of `nx × ny × nz` points with the given
/// spacing, anchored at the origin.
pub fn make_grid_cloud(nx: usize, ny: usize, nz: usize, spacing: f64) -> Vec<[f64; 3]> {
    let mut points = Vec::with_capacity(nx * ny * nz);
    for iz in 0..nz {
        for iy in 0..ny {
            for ix in 0..nx {
                points.push([
                    spacing * ix as f64,
                    spacing * iy as f64,
                    spacing * iz as f64,
                ]);
            }
        }
    }
    points
}

/// Copy of a cloud with every point shifted by `offset`.
pub fn translate_cloud(points: &[[f64; 3]], offset: [f64; 3]) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| [p[0] + offset[0], p[1] + offset[1], p[2] + offset[2]])
        .collect()
}

/// Evenly spaced points along the x axis, starting at the origin.
pub fn make_line_cloud(count: usize, spacing: f64) -> Vec<[f64; 3]> {
    (0..count)
        .map(|i| [spacing * i as f64, 0.0, 0.0])
        .collect()
}
