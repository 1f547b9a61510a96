use crate::{interpolator, jacobian_fd, triangle_basis};
use matrixcompare::assert_matrix_eq;
use moris::constitutive::{
    bond_stress_matrix, condense_to_plane_stress, eshelby_tensor, eshelby_tensor_continuous_fiber,
    eshelby_tensor_spheroid, isotropic_stiffness, isotropic_stiffness_3d, mori_tanaka_stiffness,
    plane_stress_bond_matrix, plane_stress_bond_matrix_derivative, rotation_matrix, ConstitutiveModel,
    ModelType, MoriTanaka, TensorType, CONTINUOUS_FIBER_ASPECT_RATIO,
};
use moris::dof::DofType;
use moris::field_interpolator::{FieldInterpolator, FieldInterpolatorManager};
use moris::property::{ConstantProperty, FunctionProperty, Property};
use moris::voigt::VoigtLayout;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use std::sync::Arc;

const DISPLACEMENT: [f64; 6] = [0.1, -0.2, 0.3, 0.05, 0.4, -0.1];
const TEMPERATURE: [f64; 3] = [0.1, 0.4, -0.2];

fn constant(value: f64) -> Arc<dyn Property<f64>> {
    Arc::new(ConstantProperty::scalar(value))
}

/// `θ(T) = 0.3 + 0.5 T`
fn temperature_dependent_orientation() -> Arc<dyn Property<f64>> {
    let property = FunctionProperty::<f64>::new(|fis| {
        fis.field_interpolator(DofType::TEMP).val() * 0.5 + DVector::from_element(1, 0.3)
    })
    .with_dof_derivative(DofType::TEMP, |fis| fis.field_interpolator(DofType::TEMP).n() * 0.5);
    Arc::new(property)
}

fn composite_properties(orientation: Arc<dyn Property<f64>>) -> Vec<(&'static str, Arc<dyn Property<f64>>)> {
    vec![
        ("YoungsModulusMatrix", constant(3.0)),
        ("PoissonRatioMatrix", constant(0.35)),
        ("YoungsModulusFiber", constant(70.0)),
        ("PoissonRatioFiber", constant(0.2)),
        ("VolumeFraction", constant(0.3)),
        ("AspectRatio", constant(10.0)),
        ("OrientationInPlane", orientation),
    ]
}

fn mori_tanaka_model(
    space_dim: usize,
    model_type: ModelType,
    properties: Vec<(&'static str, Arc<dyn Property<f64>>)>,
) -> MoriTanaka<f64> {
    let mut model = MoriTanaka::default();
    model
        .set_dof_type_list(&[DofType::UX], &["Displacement"])
        .unwrap();
    for (name, property) in properties {
        model.set_property(property, name).unwrap();
    }
    model
        .select_model_variant(space_dim, model_type, TensorType::Full)
        .unwrap();
    model.set_local_properties().unwrap();
    model
}

/// Assembles the Voigt Eshelby matrix from `[S1111, S2222, S2233, S2211, S1122, S2323, S1212]`.
fn eshelby_matrix(s: [f64; 7]) -> DMatrix<f64> {
    let [s1111, s2222, s2233, s2211, s1122, s2323, s1212] = s;
    let mut m = DMatrix::zeros(6, 6);
    m[(0, 0)] = s1111;
    m[(1, 1)] = s2222;
    m[(2, 2)] = s2222;
    m[(1, 2)] = s2233;
    m[(2, 1)] = s2233;
    m[(1, 0)] = s2211;
    m[(2, 0)] = s2211;
    m[(0, 1)] = s1122;
    m[(0, 2)] = s1122;
    m[(3, 3)] = 2.0 * s2323;
    m[(4, 4)] = 2.0 * s1212;
    m[(5, 5)] = 2.0 * s1212;
    m
}

#[test]
fn eshelby_tensor_of_prolate_and_oblate_spheroids() {
    let oblate = eshelby_matrix([
        0.7264379741398511,
        0.39554251403116536,
        0.04179041564135413,
        0.0016953793765229486,
        0.12632413245246044,
        0.17687604919490563,
        0.2821812248520018,
    ]);
    assert_matrix_eq!(eshelby_tensor_spheroid(0.3, 0.5), oblate, comp = abs, tol = 1e-10);

    let prolate = eshelby_matrix([
        0.11078732277641969,
        0.6613052957135708,
        0.0405914737716579,
        0.17484090141249164,
        -0.0035599037145015444,
        0.31035691097095647,
        0.23647206596363154,
    ]);
    assert_matrix_eq!(eshelby_tensor_spheroid(0.3, 5.0), prolate, comp = abs, tol = 1e-10);
}

#[test]
fn eshelby_tensor_of_sphere() {
    let nu = 0.3;
    let denominator = 15.0 * (1.0 - nu);
    let s1111 = (7.0 - 5.0 * nu) / denominator;
    let s1122 = (5.0 * nu - 1.0) / denominator;
    let s1212 = (4.0 - 5.0 * nu) / denominator;
    let sphere = eshelby_matrix([s1111, s1111, s1122, s1122, s1122, s1212, s1212]);
    assert_matrix_eq!(eshelby_tensor_spheroid(nu, 1.0), sphere, comp = abs, tol = 1e-14);

    // Both spheroid branches approach the sphere
    assert_matrix_eq!(eshelby_tensor_spheroid(nu, 1.001), sphere, comp = abs, tol = 1e-3);
    assert_matrix_eq!(eshelby_tensor_spheroid(nu, 0.999), sphere, comp = abs, tol = 1e-3);
}

#[test]
fn long_spheroids_approach_continuous_fibers() {
    let nu = 0.3;
    let fiber = eshelby_tensor_continuous_fiber(nu);
    assert_matrix_eq!(eshelby_tensor_spheroid(nu, 1e5), fiber, comp = abs, tol = 1e-8);

    let threshold = CONTINUOUS_FIBER_ASPECT_RATIO;
    assert_matrix_eq!(eshelby_tensor(nu, threshold), eshelby_tensor_spheroid(nu, threshold), comp = float);
    assert_matrix_eq!(eshelby_tensor(nu, 2.0 * threshold), fiber, comp = float);
    assert_matrix_eq!(eshelby_tensor(nu, threshold), fiber, comp = abs, tol = 2e-5);
}

#[test]
fn zero_volume_fraction_recovers_matrix() {
    let cm = isotropic_stiffness_3d(3.0, 0.35);
    let cf = isotropic_stiffness_3d(70.0, 0.2);
    let eshelby = eshelby_tensor(0.35, 10.0);
    assert_matrix_eq!(mori_tanaka_stiffness(&cm, &cf, &eshelby, 0.0), cm, comp = abs, tol = 1e-12);
    assert_matrix_eq!(mori_tanaka_stiffness(&cm, &cf, &eshelby, 1.0), cf, comp = abs, tol = 1e-9);

    let mut properties = composite_properties(constant(0.7));
    properties[4] = ("VolumeFraction", constant(0.0));
    let mut model = mori_tanaka_model(2, ModelType::PlaneStress, properties);
    let c = model
        .constitutive_matrix(&FieldInterpolatorManager::new())
        .clone();
    let expected = isotropic_stiffness(VoigtLayout::PlaneStress, TensorType::Full, 3.0, 0.35);
    assert_matrix_eq!(c, expected, comp = abs, tol = 1e-12);
}

#[test]
fn plane_stress_bond_matrix_is_restriction_of_3d_bond_matrix() {
    let theta: f64 = 0.7;
    let full = bond_stress_matrix(&rotation_matrix(theta, 0.0));
    let keep = [0, 1, 5];
    let restricted = DMatrix::from_fn(3, 3, |i, j| full[(keep[i], keep[j])]);
    assert_matrix_eq!(plane_stress_bond_matrix(theta), restricted, comp = abs, tol = 1e-14);

    let h = 1e-6;
    let derivative_fd = (plane_stress_bond_matrix(theta + h) - plane_stress_bond_matrix(theta - h)) / (2.0 * h);
    assert_matrix_eq!(plane_stress_bond_matrix_derivative(theta), derivative_fd, comp = abs, tol = 1e-8);
}

#[test]
fn condensation_commutes_with_in_plane_rotation() {
    let cm = isotropic_stiffness_3d(3.0, 0.35);
    let cf = isotropic_stiffness_3d(70.0, 0.2);
    let local = mori_tanaka_stiffness(&cm, &cf, &eshelby_tensor(0.35, 10.0), 0.3);
    let theta = 0.4;

    let m = bond_stress_matrix(&rotation_matrix(theta, 0.0));
    let rotated_then_condensed = condense_to_plane_stress(&(&m * &local * m.transpose()));
    let m2 = plane_stress_bond_matrix(theta);
    let condensed_then_rotated = &m2 * condense_to_plane_stress(&local) * m2.transpose();
    assert_matrix_eq!(rotated_then_condensed, condensed_then_rotated, comp = abs, tol = 1e-10);
}

#[test]
fn orientation_derivative_matches_finite_differences() {
    let basis = triangle_basis();
    let u = interpolator(&basis, 2, &DISPLACEMENT);
    let mut model = mori_tanaka_model(
        2,
        ModelType::PlaneStress,
        composite_properties(temperature_dependent_orientation()),
    );
    assert_eq!(model.global_dof_types(), vec![DofType::UX, DofType::TEMP]);

    let temperature = interpolator(&basis, 1, &TEMPERATURE);
    let fis = FieldInterpolatorManager::new()
        .with(DofType::UX, &u)
        .with(DofType::TEMP, &temperature);
    let d_flux = model.d_flux_d_dof(DofType::TEMP, &fis).clone();

    let d_flux_fd = jacobian_fd(&TEMPERATURE, |t| {
        let temperature = interpolator(&basis, 1, t);
        let fis = FieldInterpolatorManager::new()
            .with(DofType::UX, &u)
            .with(DofType::TEMP, &temperature);
        model.reset_eval_flags();
        model.flux(&fis).clone()
    });
    assert_matrix_eq!(d_flux, d_flux_fd, comp = abs, tol = 1e-6);
}

#[test]
fn displacement_derivative_is_stiffness_times_strain_operator() {
    let basis = triangle_basis();
    let u = interpolator(&basis, 2, &DISPLACEMENT);
    let fis = FieldInterpolatorManager::new().with(DofType::UX, &u);
    let mut model = mori_tanaka_model(3, ModelType::Full, composite_properties(constant(0.5)));
    let mut plane = mori_tanaka_model(2, ModelType::PlaneStress, composite_properties(constant(0.5)));

    let c = plane.constitutive_matrix(&fis).clone();
    let b = plane.d_strain_d_dof(DofType::UX, &fis).clone();
    assert_matrix_eq!(plane.d_flux_d_dof(DofType::UX, &fis).clone(), &c * &b, comp = abs, tol = 1e-12);

    let c_3d = model.constitutive_matrix(&fis).clone();
    assert_eq!(c_3d.shape(), (6, 6));
    assert_matrix_eq!(condense_to_plane_stress(&c_3d), c, comp = abs, tol = 1e-10);
}

#[test]
#[should_panic(expected = "only implemented for plane stress")]
fn orientation_derivative_in_3d_is_not_implemented() {
    let basis = crate::tetrahedron_basis();
    let u = interpolator(&basis, 3, &[0.0; 12]);
    let temperature = interpolator(&basis, 1, &[0.1, 0.2, 0.3, 0.4]);
    let fis = FieldInterpolatorManager::new()
        .with(DofType::UX, &u)
        .with(DofType::TEMP, &temperature);
    let mut model = mori_tanaka_model(
        3,
        ModelType::Full,
        composite_properties(temperature_dependent_orientation()),
    );
    model.d_flux_d_dof(DofType::TEMP, &fis);
}

#[test]
#[should_panic(expected = "not implemented")]
fn volume_fraction_dependency_is_not_implemented() {
    let basis = triangle_basis();
    let u = interpolator(&basis, 2, &DISPLACEMENT);
    let temperature = interpolator(&basis, 1, &TEMPERATURE);
    let fis = FieldInterpolatorManager::new()
        .with(DofType::UX, &u)
        .with(DofType::TEMP, &temperature);
    let volume_fraction = FunctionProperty::<f64>::new(|_| DVector::from_element(1, 0.3))
        .with_dof_derivative(DofType::TEMP, |fis| fis.field_interpolator(DofType::TEMP).n() * 0.0);
    let mut properties = composite_properties(constant(0.5));
    properties[4] = ("VolumeFraction", Arc::new(volume_fraction));
    let mut model = mori_tanaka_model(2, ModelType::PlaneStress, properties);
    model.d_flux_d_dof(DofType::TEMP, &fis);
}

#[test]
fn unsupported_variants_and_missing_properties_are_errors() {
    let mut model = MoriTanaka::<f64>::default();
    assert!(model
        .select_model_variant(2, ModelType::PlaneStrain, TensorType::Full)
        .is_err());
    assert!(model
        .select_model_variant(2, ModelType::Axisymmetric, TensorType::Full)
        .is_err());
    assert!(model
        .select_model_variant(3, ModelType::Full, TensorType::Deviatoric)
        .is_err());

    model
        .set_dof_type_list(&[DofType::UX], &["Displacement"])
        .unwrap();
    for (name, property) in composite_properties(constant(0.0)) {
        if name != "AspectRatio" {
            model.set_property(property, name).unwrap();
        }
    }
    model
        .select_model_variant(2, ModelType::PlaneStress, TensorType::Full)
        .unwrap();
    let err = model.set_local_properties().unwrap_err();
    assert!(err.to_string().contains("\"AspectRatio\""));

    model.set_property(constant(4.0), "AspectRatio").unwrap();
    model.set_local_properties().unwrap();
}

proptest! {
    #[test]
    fn rotated_stiffness_is_symmetric(
        theta in -3.2..3.2,
        volume_fraction in 0.0..0.6,
        aspect_ratio in 1.5..50.0,
    ) {
        let mut properties = composite_properties(constant(theta));
        properties[4] = ("VolumeFraction", constant(volume_fraction));
        properties[5] = ("AspectRatio", constant(aspect_ratio));
        let mut model = mori_tanaka_model(2, ModelType::PlaneStress, properties);
        let c = model.constitutive_matrix(&FieldInterpolatorManager::new()).clone();
        prop_assert!((&c - c.transpose()).amax() <= 1e-10 * c.amax());
        prop_assert!(c.symmetric_eigenvalues().min() > 0.0);
    }
}
