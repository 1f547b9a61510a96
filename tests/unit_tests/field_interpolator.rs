use crate::{interpolator, tetrahedron_basis, triangle_basis};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use moris::dof::DofType;
use moris::field_interpolator::{
    linear_simplex_basis, num_derivative_components, FieldInterpolator, FieldInterpolatorManager,
};
use moris::proptest::{interior_barycentric, reference_simplex};
use nalgebra::{dmatrix, dvector, DMatrix, DVector};
use proptest::prelude::*;
use util::assert_panics;

#[test]
fn triangle_basis_gradients() {
    let basis = triangle_basis();
    let expected = dmatrix![-0.5, 0.5, 0.0;
                            -1.0, 0.0, 1.0];
    assert_matrix_eq!(basis.dndx, expected, comp = abs, tol = 1e-14);
    assert_eq!(basis.d2ndx2.shape(), (3, 3));
    assert_eq!(basis.d3ndx3.shape(), (4, 3));
}

#[test]
fn degenerate_or_unsupported_simplices_are_errors() {
    let collinear = dmatrix![0.0, 0.0;
                             1.0, 1.0;
                             2.0, 2.0];
    assert!(linear_simplex_basis(&collinear, &dvector![0.3, 0.3, 0.4]).is_err());

    let quad = dmatrix![0.0, 0.0; 1.0, 0.0; 1.0, 1.0; 0.0, 1.0];
    assert!(linear_simplex_basis(&quad, &dvector![0.25, 0.25, 0.25, 0.25]).is_err());

    let triangle = reference_simplex(2);
    assert!(linear_simplex_basis(&triangle, &dvector![0.5, 0.5]).is_err());
}

#[test]
fn derivative_component_counts() {
    assert_eq!(num_derivative_components(2, 2), 3);
    assert_eq!(num_derivative_components(3, 2), 6);
    assert_eq!(num_derivative_components(3, 3), 10);
    assert_panics!(num_derivative_components(2, 4));
}

#[test]
fn vector_field_uses_field_major_coefficients() {
    let basis = triangle_basis();
    // u_x = [1, 2, 3], u_y = [4, 5, 6] at the vertices
    let fi = interpolator(&basis, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    assert_eq!(fi.number_of_fields(), 2);
    assert_eq!(fi.number_of_space_time_bases(), 3);
    assert_eq!(fi.number_of_space_time_coefficients(), 6);
    assert_matrix_eq!(fi.coefficient_vector(), dvector![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], comp = float);

    let n = fi.n();
    let expected_n = dmatrix![0.2, 0.5, 0.3, 0.0, 0.0, 0.0;
                              0.0, 0.0, 0.0, 0.2, 0.5, 0.3];
    assert_matrix_eq!(n, expected_n, comp = abs, tol = 1e-14);

    let coefficients = fi.coefficient_vector();
    assert_matrix_eq!(fi.val(), &n * &coefficients, comp = abs, tol = 1e-14);
    assert_matrix_eq!(fi.val(), dvector![2.1, 5.1], comp = abs, tol = 1e-14);

    // gradx(1)[(i, j)] = ∂u_j/∂x_i
    let expected_gradient = dmatrix![0.5, 0.5;
                                     2.0, 2.0];
    assert_matrix_eq!(fi.gradx(1), expected_gradient, comp = abs, tol = 1e-14);
}

#[test]
fn time_derivatives_follow_basis() {
    let basis = triangle_basis();
    let fi = interpolator(&basis, 1, &[1.0, 2.0, 3.0]);
    assert_matrix_eq!(fi.gradt(1), dmatrix![0.8], comp = abs, tol = 1e-14);
    assert_matrix_eq!(fi.dnndtn(1), dmatrix![0.4, -0.1, 0.2], comp = float);
    assert_panics!(fi.gradt(3));
}

#[test]
fn time_basis_derivatives_are_row_matrices() {
    let basis = triangle_basis();
    let fi = interpolator(&basis, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let dndt = fi.dnndtn(1);
    assert_eq!(dndt.shape(), (1, 3));
    assert_matrix_eq!(dndt, DMatrix::from_row_slice(1, 3, basis.dndt.as_slice()), comp = float);
    let d2ndt2 = fi.dnndtn(2);
    assert_eq!(d2ndt2.shape(), (1, 3));
    assert_matrix_eq!(d2ndt2, dmatrix![0.0, 0.1, -0.1], comp = float);

    // One column per field
    assert_matrix_eq!(fi.gradt(1), dmatrix![0.8, 2.3], comp = abs, tol = 1e-14);
    assert_matrix_eq!(fi.gradt(2), dmatrix![-0.1, -0.1], comp = abs, tol = 1e-14);
}

#[test]
fn set_coefficient_vector_updates_values() {
    let basis = tetrahedron_basis();
    let mut fi = interpolator(&basis, 1, &[0.0; 4]);
    fi.set_coefficient_vector(&[1.0, 1.0, 1.0, 1.0]);
    assert_scalar_eq!(fi.val()[0], 1.0, comp = abs, tol = 1e-14);
    assert_matrix_eq!(fi.gradx(1), DMatrix::<f64>::zeros(3, 1), comp = abs, tol = 1e-13);
}

#[test]
fn manager_lookup() {
    let basis = triangle_basis();
    let temperature = interpolator(&basis, 1, &[1.0, 2.0, 3.0]);
    let fis = FieldInterpolatorManager::new().with(DofType::TEMP, &temperature);
    assert!(fis.contains(DofType::TEMP));
    assert!(fis.get(DofType::P).is_none());
    assert_eq!(fis.num_coefficients(DofType::TEMP), 3);
}

#[test]
#[should_panic(expected = "No field interpolator supplied for dof type P")]
fn manager_panics_for_missing_group() {
    let fis = FieldInterpolatorManager::<f64>::new();
    fis.field_interpolator(DofType::P);
}

proptest! {
    #[test]
    fn linear_basis_reproduces_affine_fields(
        barycentric in interior_barycentric(3),
        gradient in prop::collection::vec(-2.0f64..2.0, 3),
        offset in -1.0f64..1.0,
    ) {
        let vertices = reference_simplex(3);
        let basis = linear_simplex_basis(&vertices, &barycentric).unwrap();
        let gradient = DVector::from_vec(gradient);
        let nodal: Vec<f64> = vertices
            .row_iter()
            .map(|x| x.transpose().dot(&gradient) + offset)
            .collect();
        let fi = interpolator(&basis, 1, &nodal);

        let x = vertices.tr_mul(&barycentric);
        prop_assert!((fi.val()[0] - (x.dot(&gradient) + offset)).abs() < 1e-12);
        prop_assert!((fi.gradx(1).column(0) - &gradient).norm() < 1e-12);
        prop_assert!((basis.n.sum() - 1.0).abs() < 1e-12);
    }
}
