use crate::{interpolator, jacobian_fd, triangle_basis};
use matrixcompare::assert_matrix_eq;
use moris::constitutive::{ConstitutiveModel, LinearIsotropic, ModelType, TensorType};
use moris::dof::DofType;
use moris::field_interpolator::{FieldInterpolator, FieldInterpolatorManager};
use moris::iwg::{DofAssemblyMap, ElementSet, IntegrationPoint, Iwg, Side, StrucLinearBulkIwg};
use moris::property::{ConstantProperty, FunctionProperty, Property};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

const DISPLACEMENT: [f64; 6] = [0.01, -0.02, 0.03, 0.02, 0.0, -0.01];
const TEMPERATURE: [f64; 3] = [1.0, 2.0, 4.0];
const WEIGHT: f64 = 0.25;

fn isotropic_model(youngs_modulus: Arc<dyn Property<f64>>) -> Box<dyn ConstitutiveModel<f64>> {
    let mut model = LinearIsotropic::<f64>::default();
    model
        .set_dof_type_list(&[DofType::UX], &["Displacement"])
        .unwrap();
    model.set_property(youngs_modulus, "YoungsModulus").unwrap();
    model
        .set_property(Arc::new(ConstantProperty::scalar(0.3)), "PoissonRatio")
        .unwrap();
    model
        .select_model_variant(2, ModelType::PlaneStrain, TensorType::Full)
        .unwrap();
    model.set_local_properties().unwrap();
    Box::new(model)
}

/// `E(T) = 100 + 10 T`
fn temperature_dependent_youngs_modulus() -> Arc<dyn Property<f64>> {
    let property = FunctionProperty::<f64>::new(|fis| {
        fis.field_interpolator(DofType::TEMP).val() * 10.0 + DVector::from_element(1, 100.0)
    })
    .with_dof_derivative(DofType::TEMP, |fis| fis.field_interpolator(DofType::TEMP).n() * 10.0);
    Arc::new(property)
}

/// Body load `f(T) = (T, 0)`.
fn temperature_dependent_load() -> Arc<dyn Property<f64>> {
    let property = FunctionProperty::<f64>::new(|fis| {
        let t = fis.field_interpolator(DofType::TEMP).val()[0];
        DVector::from_vec(vec![t, 0.0])
    })
    .with_dof_derivative(DofType::TEMP, |fis| {
        let n = fis.field_interpolator(DofType::TEMP).n();
        let mut d = DMatrix::zeros(2, n.ncols());
        d.row_mut(0).copy_from(&n.row(0));
        d
    });
    Arc::new(property)
}

fn displacement_map() -> DofAssemblyMap {
    let mut map = DofAssemblyMap::new();
    map.add_block(Side::Leader, DofType::UX, 2, 3).unwrap();
    map
}

fn thermoelastic_map() -> DofAssemblyMap {
    let mut map = displacement_map();
    map.add_block(Side::Leader, DofType::TEMP, 1, 3).unwrap();
    map
}

/// Residual and Jacobian at a single point for the given displacement and temperature.
fn evaluate(iwg: &mut StrucLinearBulkIwg<f64>, map: DofAssemblyMap, u: &[f64], t: &[f64]) -> ElementSet<f64> {
    let basis = triangle_basis();
    let displacement = interpolator(&basis, 2, u);
    let temperature = interpolator(&basis, 1, t);
    let fis = FieldInterpolatorManager::new()
        .with(DofType::UX, &displacement)
        .with(DofType::TEMP, &temperature);
    let point = IntegrationPoint::bulk(&fis, WEIGHT);
    let mut set = ElementSet::new(map);
    iwg.reset_eval_flags();
    iwg.compute_residual(&point, &mut set);
    iwg.compute_jacobian(&point, &mut set);
    set
}

#[test]
fn linear_elastic_residual_is_stiffness_times_displacement() {
    let mut iwg = StrucLinearBulkIwg::new(DofType::UX, isotropic_model(Arc::new(ConstantProperty::scalar(200.0))));
    assert_eq!(iwg.residual_dof_types(), vec![DofType::UX]);
    assert_eq!(iwg.requested_dof_types(), vec![DofType::UX]);

    let set = evaluate(&mut iwg, displacement_map(), &DISPLACEMENT, &TEMPERATURE);
    let stiffness = set.jacobian().clone();
    let u = DVector::from_column_slice(&DISPLACEMENT);
    assert_matrix_eq!(set.residual().clone(), &stiffness * u, comp = abs, tol = 1e-12);
    assert_matrix_eq!(stiffness, stiffness.transpose(), comp = abs, tol = 1e-12);

    // Rigid translations are in the null space
    let translation = DVector::from_column_slice(&[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert!((&stiffness * translation).amax() < 1e-12);
}

#[test]
fn load_enters_with_negative_sign() {
    let model = isotropic_model(Arc::new(ConstantProperty::scalar(200.0)));
    let mut unloaded = StrucLinearBulkIwg::new(DofType::UX, model.clone());
    let mut loaded = StrucLinearBulkIwg::new(DofType::UX, model);
    loaded
        .set_property(Arc::new(ConstantProperty::from_slice(&[1.0, -2.0])), "Load")
        .unwrap();
    assert!(loaded
        .set_property(Arc::new(ConstantProperty::scalar(1.0)), "BodyLoad")
        .is_err());

    let without = evaluate(&mut unloaded, displacement_map(), &DISPLACEMENT, &TEMPERATURE);
    let with = evaluate(&mut loaded, displacement_map(), &DISPLACEMENT, &TEMPERATURE);

    // N = [0.2, 0.5, 0.3] for each component
    let expected = -DVector::from_column_slice(&[0.2, 0.5, 0.3, -0.4, -1.0, -0.6]) * WEIGHT;
    assert_matrix_eq!(with.residual() - without.residual(), expected, comp = abs, tol = 1e-14);
    assert_matrix_eq!(with.jacobian().clone(), without.jacobian().clone(), comp = float);
}

#[test]
fn jacobian_matches_finite_differences_of_residual() {
    let mut iwg = StrucLinearBulkIwg::new(DofType::UX, isotropic_model(temperature_dependent_youngs_modulus()));
    iwg.set_property(temperature_dependent_load(), "Load").unwrap();
    assert_eq!(iwg.requested_dof_types(), vec![DofType::UX, DofType::TEMP]);
    assert_eq!(iwg.model().name(), "StrucLinearIsotropic");

    let set = evaluate(&mut iwg, thermoelastic_map(), &DISPLACEMENT, &TEMPERATURE);
    let x0: Vec<f64> = DISPLACEMENT.iter().chain(TEMPERATURE.iter()).copied().collect();
    let fd = jacobian_fd(&x0, |x| {
        evaluate(&mut iwg, thermoelastic_map(), &x[..6], &x[6..])
            .residual()
            .clone()
    });
    assert_matrix_eq!(set.jacobian().clone(), fd, comp = abs, tol = 1e-6);
    assert_eq!(set.jacobian().rows(6, 3).amax(), 0.0);
}
