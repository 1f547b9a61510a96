//! Closed-form zero crossings of linearly interpolated fields along edges.
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};

/// Local coordinate `t ∈ [0, 1]` of the threshold crossing on the edge from `A` (`t = 0`) to `B`
/// (`t = 1`), `t = (φ_A - c) / (φ_A - φ_B)`.
///
/// # Panics
///
/// Panics if both endpoint values are equal.
pub fn intersection_local_coordinate<T: Real>(phi_a: T, phi_b: T, threshold: T) -> T {
    assert!(
        phi_a != phi_b,
        "Cannot intersect an edge with equal endpoint values {}.",
        phi_a
    );
    (phi_a - threshold) / (phi_a - phi_b)
}

/// Global coordinates `x_A + t (x_B - x_A)` of the crossing.
pub fn intersection_global_coordinate<T: Real>(x_a: &DVector<T>, x_b: &DVector<T>, local_coordinate: T) -> DVector<T> {
    assert_eq!(x_a.len(), x_b.len(), "Edge endpoints must have the same dimension.");
    x_a + (x_b - x_a) * local_coordinate
}

/// Sensitivity of the crossing location with respect to the ADVs of both endpoints.
///
/// `dphi_a_dp` and `dphi_b_dp` are `1 x n_A` and `1 x n_B` rows. The result is the
/// `space_dim x (n_A + n_B)` matrix `[∂x/∂φ_A dφ_A/dp, ∂x/∂φ_B dφ_B/dp]` where
/// `∂x/∂φ_A = (c - φ_B) / (φ_A - φ_B)² (x_B - x_A)` and
/// `∂x/∂φ_B = (φ_A - c) / (φ_A - φ_B)² (x_B - x_A)`. Columns of ADVs shared by both endpoints
/// are not merged.
///
/// # Panics
///
/// Panics if the endpoint values are equal or the sensitivities are not rows.
pub fn compute_dx_dp_with_linear_basis<T: Real>(
    phi: [T; 2],
    coordinates: [&DVector<T>; 2],
    dphi_dp: [&DMatrix<T>; 2],
    threshold: T,
) -> DMatrix<T> {
    let [phi_a, phi_b] = phi;
    let [x_a, x_b] = coordinates;
    let [dphi_a_dp, dphi_b_dp] = dphi_dp;
    assert!(phi_a != phi_b, "Cannot differentiate a crossing of equal endpoint values.");
    assert_eq!(dphi_a_dp.nrows(), 1);
    assert_eq!(dphi_b_dp.nrows(), 1);

    let delta = phi_a - phi_b;
    let edge = x_b - x_a;
    let dx_dphi_a = &edge * ((threshold - phi_b) / (delta * delta));
    let dx_dphi_b = &edge * ((phi_a - threshold) / (delta * delta));

    let (n_a, n_b) = (dphi_a_dp.ncols(), dphi_b_dp.ncols());
    let mut dx_dp = DMatrix::zeros(edge.len(), n_a + n_b);
    dx_dp
        .columns_mut(0, n_a)
        .copy_from(&(&dx_dphi_a * dphi_a_dp));
    dx_dp
        .columns_mut(n_a, n_b)
        .copy_from(&(&dx_dphi_b * dphi_b_dp));
    dx_dp
}

/// Adds the columns of `dx_dp` into a dense `space_dim x num_advs` matrix at their ADV ids.
///
/// # Panics
///
/// Panics if the number of ids does not match the number of columns or an id is out of range.
pub fn scatter_adv_columns<T: Real>(dx_dp: &DMatrix<T>, adv_ids: &[usize], num_advs: usize) -> DMatrix<T> {
    assert_eq!(dx_dp.ncols(), adv_ids.len(), "One ADV id per sensitivity column is required.");
    let mut dense = DMatrix::zeros(dx_dp.nrows(), num_advs);
    for (column, &id) in dx_dp.column_iter().zip(adv_ids) {
        assert!(id < num_advs, "ADV id {} out of range ({} ADVs).", id, num_advs);
        let mut target = dense.column_mut(id);
        target += column;
    }
    dense
}
