use crate::constitutive::ModelType;
use crate::field_interpolator::{linear_simplex_basis, NodalFieldInterpolator};
use ::proptest::prelude::*;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// Unit normals in 2D or 3D.
pub fn unit_normal(space_dim: usize) -> BoxedStrategy<DVector<f64>> {
    match space_dim {
        2 => (0.0..2.0 * PI)
            .prop_map(|angle: f64| DVector::from_vec(vec![angle.cos(), angle.sin()]))
            .boxed(),
        3 => (0.0..2.0 * PI, -1.0..=1.0)
            .prop_map(|(angle, z): (f64, f64)| {
                let radius = (1.0 - z * z).max(0.0).sqrt();
                DVector::from_vec(vec![radius * angle.cos(), radius * angle.sin(), z])
            })
            .boxed(),
        _ => panic!("Unit normals are only available in 2D and 3D."),
    }
}

pub fn youngs_modulus() -> impl Strategy<Value = f64> {
    1.0..1.0e3
}

/// Poisson ratios bounded away from the incompressible limit.
pub fn poisson_ratio() -> impl Strategy<Value = f64> {
    -0.9..0.45
}

pub fn model_type_2d() -> impl Strategy<Value = ModelType> {
    prop_oneof![
        Just(ModelType::PlaneStress),
        Just(ModelType::PlaneStrain),
        Just(ModelType::Axisymmetric)
    ]
}

/// The reference triangle (2D) or tetrahedron (3D), one vertex per row.
pub fn reference_simplex(space_dim: usize) -> DMatrix<f64> {
    let mut vertices = DMatrix::zeros(space_dim + 1, space_dim);
    for i in 0..space_dim {
        vertices[(i + 1, i)] = 1.0;
    }
    vertices
}

/// Barycentric coordinates of a point strictly inside a simplex.
pub fn interior_barycentric(space_dim: usize) -> impl Strategy<Value = DVector<f64>> {
    prop::collection::vec(0.05..1.0, space_dim + 1).prop_map(|weights: Vec<f64>| {
        let sum: f64 = weights.iter().sum();
        DVector::from_iterator(weights.len(), weights.iter().map(|w| w / sum))
    })
}

/// Linear interpolators on the reference simplex with random coefficients and a random interior
/// evaluation point.
pub fn nodal_field_interpolator(
    space_dim: usize,
    num_fields: usize,
) -> impl Strategy<Value = NodalFieldInterpolator<f64>> {
    let coefficients = prop::collection::vec(-1.0..1.0, (space_dim + 1) * num_fields);
    (coefficients, interior_barycentric(space_dim)).prop_map(move |(coefficients, barycentric)| {
        let basis = linear_simplex_basis(&reference_simplex(space_dim), &barycentric)
            .expect("Reference simplex is not degenerate");
        NodalFieldInterpolator::new(
            DMatrix::from_column_slice(space_dim + 1, num_fields, &coefficients),
            basis,
        )
    })
}
