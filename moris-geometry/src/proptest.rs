use ::proptest::prelude::*;
use nalgebra::DVector;

/// Pairs of level-set values with opposite signs relative to `threshold`, bounded away from it.
pub fn straddling_values(threshold: f64) -> impl Strategy<Value = (f64, f64)> {
    (0.01..10.0, 0.01..10.0, any::<bool>()).prop_map(move |(below, above, flip): (f64, f64, bool)| {
        let (below, above) = (threshold - below, threshold + above);
        if flip {
            (above, below)
        } else {
            (below, above)
        }
    })
}

pub fn point(space_dim: usize, bound: f64) -> impl Strategy<Value = DVector<f64>> {
    prop::collection::vec(-bound..bound, space_dim).prop_map(DVector::from_vec)
}

/// Edge endpoints with a minimum length.
pub fn edge(space_dim: usize) -> impl Strategy<Value = (DVector<f64>, DVector<f64>)> {
    (point(space_dim, 5.0), point(space_dim, 5.0))
        .prop_filter("Edge must not be degenerate", |(a, b)| (a - b).norm() > 1e-2)
}
