use crate::{interpolator, jacobian_fd, triangle_basis};
use matrixcompare::assert_matrix_eq;
use moris::dof::DofType;
use moris::field_interpolator::{FieldInterpolator, FieldInterpolatorManager};
use moris::iwg::{CompressibleNsBulkIwg, DofAssemblyMap, ElementSet, IntegrationPoint, Iwg, Side};
use moris::property::{ConstantProperty, FunctionProperty, Property};
use nalgebra::{dmatrix, DMatrix, DVector};
use std::sync::Arc;

const GAS_CONSTANT: f64 = 1.0;
const HEAT_CAPACITY: f64 = 2.5;
const VISCOSITY: f64 = 0.1;
const CONDUCTIVITY: f64 = 0.2;

/// Pressure, velocity and temperature coefficients, in dof order.
const COEFFICIENTS: [f64; 12] = [
    1.0, 1.1, 0.9, // p
    0.1, 0.2, -0.1, 0.05, -0.1, 0.15, // v
    1.0, 1.2, 1.1, // T
];

fn constant(value: f64) -> Arc<dyn Property<f64>> {
    Arc::new(ConstantProperty::scalar(value))
}

fn gas_iwg() -> CompressibleNsBulkIwg<f64> {
    let mut iwg = CompressibleNsBulkIwg::new(2).unwrap();
    iwg.set_property(constant(VISCOSITY), "DynamicViscosity").unwrap();
    iwg.set_property(constant(CONDUCTIVITY), "ThermalConductivity")
        .unwrap();
    iwg.set_property(constant(HEAT_CAPACITY), "IsochoricHeatCapacity")
        .unwrap();
    iwg.set_property(constant(GAS_CONSTANT), "SpecificGasConstant")
        .unwrap();
    iwg.check_properties().unwrap();
    iwg
}

fn loaded_gas_iwg() -> CompressibleNsBulkIwg<f64> {
    let mut iwg = gas_iwg();
    iwg.set_property(Arc::new(ConstantProperty::from_slice(&[0.1, -0.3])), "BodyForce")
        .unwrap();
    iwg.set_property(constant(0.5), "BodyHeatLoad").unwrap();
    iwg
}

/// Evaluates `f` with the state interpolated from field-major coefficients in dof order.
fn with_state<R>(coefficients: &[f64], f: impl FnOnce(&FieldInterpolatorManager<f64>) -> R) -> R {
    let basis = triangle_basis();
    let pressure = interpolator(&basis, 1, &coefficients[0..3]);
    let velocity = interpolator(&basis, 2, &coefficients[3..9]);
    let temperature = interpolator(&basis, 1, &coefficients[9..12]);
    let fis = FieldInterpolatorManager::new()
        .with(DofType::P, &pressure)
        .with(DofType::VX, &velocity)
        .with(DofType::TEMP, &temperature);
    f(&fis)
}

/// Evaluates `f` with the spatially uniform state `y = [p, v, T]`.
fn with_uniform_state<R>(y: &[f64], f: impl FnOnce(&FieldInterpolatorManager<f64>) -> R) -> R {
    let coefficients: Vec<f64> = [y[0], y[0], y[0], y[1], y[1], y[1], y[2], y[2], y[2], y[3], y[3], y[3]].to_vec();
    with_state(&coefficients, f)
}

fn conservative_variables(y: &[f64]) -> DVector<f64> {
    let (p, v, t) = (y[0], [y[1], y[2]], y[3]);
    let rho = p / (GAS_CONSTANT * t);
    let total_energy = HEAT_CAPACITY * t + 0.5 * (v[0] * v[0] + v[1] * v[1]);
    DVector::from_vec(vec![rho, rho * v[0], rho * v[1], rho * total_energy])
}

fn convective_flux(y: &[f64], j: usize) -> DVector<f64> {
    let (p, v, t) = (y[0], [y[1], y[2]], y[3]);
    let rho = p / (GAS_CONSTANT * t);
    let total_energy = HEAT_CAPACITY * t + 0.5 * (v[0] * v[0] + v[1] * v[1]);
    let delta = |i: usize| if i == j { 1.0 } else { 0.0 };
    DVector::from_vec(vec![
        rho * v[j],
        rho * v[0] * v[j] + p * delta(0),
        rho * v[1] * v[j] + p * delta(1),
        (rho * total_energy + p) * v[j],
    ])
}

const UNIFORM_STATE: [f64; 4] = [1.2, 0.3, -0.4, 0.9];

#[test]
fn construction_and_configuration_errors() {
    assert!(CompressibleNsBulkIwg::<f64>::new(1).is_err());
    assert!(CompressibleNsBulkIwg::<f64>::new(4).is_err());

    let mut iwg = CompressibleNsBulkIwg::<f64>::new(3).unwrap();
    assert_eq!(iwg.num_state_variables(), 5);
    assert_eq!(iwg.residual_dof_types(), vec![DofType::P, DofType::VX, DofType::TEMP]);
    assert!(iwg
        .set_dof_type_list(&[DofType::RHO], &["Density"])
        .is_err());

    let err = iwg.check_properties().unwrap_err();
    assert!(err.to_string().contains("\"DynamicViscosity\""));
    assert!(iwg.set_property(constant(1.0), "Viscosity").is_err());
}

#[test]
fn flux_jacobians_are_derivatives_of_conservative_fluxes() {
    let mut iwg = gas_iwg();
    let a0 = with_uniform_state(&UNIFORM_STATE, |fis| iwg.a(0, fis).clone());
    let du_dy = jacobian_fd(&UNIFORM_STATE, conservative_variables);
    assert_matrix_eq!(a0, du_dy, comp = abs, tol = 1e-7);

    for j in 0..2 {
        iwg.reset_spec_eval_flags();
        let a = with_uniform_state(&UNIFORM_STATE, |fis| iwg.a(j + 1, fis).clone());
        let df_dy = jacobian_fd(&UNIFORM_STATE, |y| convective_flux(y, j));
        assert_matrix_eq!(a, df_dy, comp = abs, tol = 1e-7);
    }
}

#[test]
fn diffusion_matrices_follow_stokes_hypothesis() {
    let mut iwg = gas_iwg();
    let (k00, k01) = with_uniform_state(&UNIFORM_STATE, |fis| (iwg.k(0, 0, fis).clone(), iwg.k(0, 1, fis).clone()));
    let (mu, lambda) = (VISCOSITY, -2.0 / 3.0 * VISCOSITY);
    let (vx, vy) = (UNIFORM_STATE[1], UNIFORM_STATE[2]);

    let expected_k00 = dmatrix![0.0, 0.0, 0.0, 0.0;
                                0.0, 2.0 * mu + lambda, 0.0, 0.0;
                                0.0, 0.0, mu, 0.0;
                                0.0, vx * (2.0 * mu + lambda), vy * mu, CONDUCTIVITY];
    assert_matrix_eq!(k00, expected_k00, comp = abs, tol = 1e-14);

    let expected_k01 = dmatrix![0.0, 0.0, 0.0, 0.0;
                                0.0, 0.0, lambda, 0.0;
                                0.0, mu, 0.0, 0.0;
                                0.0, vy * mu, vx * lambda, 0.0];
    assert_matrix_eq!(k01, expected_k01, comp = abs, tol = 1e-14);
}

#[test]
fn flux_jacobian_derivatives_match_finite_differences() {
    let mut iwg = gas_iwg();
    let vr = DVector::from_vec(vec![0.3, -0.7, 0.2, 1.1]);
    for k in 0..3 {
        iwg.reset_spec_eval_flags();
        let analytic = with_uniform_state(&UNIFORM_STATE, |fis| iwg.eval_da_dy_vr(k, &vr, fis));
        let fd = jacobian_fd(&UNIFORM_STATE, |y| {
            with_uniform_state(y, |fis| {
                iwg.reset_spec_eval_flags();
                iwg.a(k, fis) * &vr
            })
        });
        assert_matrix_eq!(analytic, fd, comp = abs, tol = 1e-7);
    }

    iwg.reset_spec_eval_flags();
    let analytic = with_uniform_state(&UNIFORM_STATE, |fis| iwg.eval_dk_dy_vr(1, 0, &vr, fis));
    let fd = jacobian_fd(&UNIFORM_STATE, |y| {
        with_uniform_state(y, |fis| {
            iwg.reset_spec_eval_flags();
            iwg.k(1, 0, fis) * &vr
        })
    });
    assert_matrix_eq!(analytic, fd, comp = abs, tol = 1e-7);
}

#[test]
fn strong_form_derivative_matches_finite_differences() {
    let mut iwg = loaded_gas_iwg();
    let analytic = with_state(&COEFFICIENTS, |fis| iwg.d_residual_strong_form(fis).clone());
    assert_eq!(analytic.shape(), (4, 12));

    let fd = jacobian_fd(&COEFFICIENTS, |c| {
        with_state(c, |fis| {
            iwg.reset_spec_eval_flags();
            iwg.residual_strong_form(fis).clone()
        })
    });
    assert_matrix_eq!(analytic, fd, comp = abs, tol = 1e-6);
}

#[test]
fn galerkin_jacobian_matches_finite_differences() {
    let mut iwg = loaded_gas_iwg();
    let analytic = with_state(&COEFFICIENTS, |fis| iwg.galerkin_jacobian(fis));
    assert_eq!(analytic.shape(), (12, 12));

    let fd = jacobian_fd(&COEFFICIENTS, |c| {
        with_state(c, |fis| {
            iwg.reset_spec_eval_flags();
            iwg.galerkin_residual(fis)
        })
    });
    assert_matrix_eq!(analytic, fd, comp = abs, tol = 1e-6);
}

#[test]
fn element_contributions_follow_the_assembly_map() {
    let mut iwg = loaded_gas_iwg();
    let weight = 0.3;
    let (set, residual, jacobian) = with_state(&COEFFICIENTS, |fis| {
        let map = DofAssemblyMap::from_interpolators(Side::Leader, &iwg.residual_dof_types(), fis).unwrap();
        let point = IntegrationPoint::bulk(fis, weight);
        let mut set = ElementSet::new(map);
        iwg.reset_eval_flags();
        iwg.compute_residual(&point, &mut set);
        iwg.compute_jacobian(&point, &mut set);
        iwg.reset_eval_flags();
        (set, iwg.galerkin_residual(fis), iwg.galerkin_jacobian(fis))
    });

    assert_eq!(set.map().range(Side::Leader, DofType::VX), 3..9);
    assert_matrix_eq!(set.residual().clone(), residual * weight, comp = abs, tol = 1e-14);
    assert_matrix_eq!(set.jacobian().clone(), jacobian * weight, comp = abs, tol = 1e-14);
}

#[test]
#[should_panic(expected = "dof-dependent properties are not implemented")]
fn temperature_dependent_viscosity_is_not_differentiated() {
    let mut iwg = gas_iwg();
    let viscosity = FunctionProperty::<f64>::new(|fis| fis.field_interpolator(DofType::TEMP).val() * 0.1)
        .with_dof_derivative(DofType::TEMP, |fis| fis.field_interpolator(DofType::TEMP).n() * 0.1);
    iwg.set_property(Arc::new(viscosity), "DynamicViscosity")
        .unwrap();
    with_state(&COEFFICIENTS, |fis| iwg.galerkin_jacobian(fis));
}

#[test]
fn state_variables_follow_dof_order() {
    let mut iwg = gas_iwg();
    let (y, dydt, dydx) = with_state(&COEFFICIENTS, |fis| {
        let variables = iwg.variables();
        (variables.y(fis).clone(), variables.dydt(fis).clone(), variables.dydx(fis).clone())
    });
    // N = [0.2, 0.5, 0.3], dN/dt = [0.4, -0.1, 0.2]
    assert_matrix_eq!(y, DVector::from_vec(vec![1.02, 0.09, 0.005, 1.13]), comp = abs, tol = 1e-14);
    assert_matrix_eq!(dydt, DVector::from_vec(vec![0.47, 0.0, 0.06, 0.5]), comp = abs, tol = 1e-14);
    assert_eq!(dydx.shape(), (2, 4));
    let w: DMatrix<f64> = with_state(&COEFFICIENTS, |fis| iwg.test_functions().w(fis).clone());
    assert_eq!(w.shape(), (4, 12));
}
