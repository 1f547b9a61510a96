use crate::{interpolator, triangle_basis};
use matrixcompare::assert_matrix_eq;
use moris::dof::DofType;
use moris::field_interpolator::{FieldInterpolator, FieldInterpolatorManager};
use moris::property::{ConstantProperty, FunctionProperty, Property, PropertyRegistry};
use nalgebra::{dvector, DVector};
use std::sync::Arc;

const NAMES: &[&str] = &["YoungsModulus", "PoissonRatio"];

#[test]
fn registry_binds_by_exact_name() {
    let mut registry = PropertyRegistry::<f64>::new("Test", NAMES);
    registry
        .set(Arc::new(ConstantProperty::scalar(0.3)), "PoissonRatio")
        .unwrap();
    let fis = FieldInterpolatorManager::new();

    assert!(registry.is_set(1));
    assert!(!registry.is_set(0));
    assert_eq!(registry.scalar(1, &fis), 0.3);
    assert_eq!(registry.slot_of("YoungsModulus").unwrap(), 0);
}

#[test]
fn registry_rejects_unknown_names() {
    let mut registry = PropertyRegistry::<f64>::new("Test", NAMES);
    let err = registry
        .set(Arc::new(ConstantProperty::scalar(1.0)), "Youngs")
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("\"Youngs\""));
    assert!(message.contains("Test"));
}

#[test]
#[should_panic(expected = "\"YoungsModulus\"")]
fn registry_require_names_missing_property() {
    let registry = PropertyRegistry::<f64>::new("Test", NAMES);
    registry.require(0);
}

#[test]
fn function_property_reports_dependencies() {
    let basis = triangle_basis();
    let temperature = interpolator(&basis, 1, &[1.0, 2.0, 4.0]);
    let fis = FieldInterpolatorManager::new().with(DofType::TEMP, &temperature);

    // E(T) = 2 T
    let property = FunctionProperty::<f64>::new(|fis| {
        fis.field_interpolator(DofType::TEMP).val() * 2.0
    })
    .with_dof_derivative(DofType::TEMP, |fis| {
        fis.field_interpolator(DofType::TEMP).n() * 2.0
    });

    assert!(property.check_dof_dependency(DofType::TEMP));
    assert!(!property.check_dof_dependency(DofType::UX));
    // T = 0.2 * 1 + 0.5 * 2 + 0.3 * 4
    assert_matrix_eq!(property.val(&fis), dvector![4.8], comp = abs, tol = 1e-14);
    assert_matrix_eq!(
        property.d_prop_d_dof(DofType::TEMP, &fis),
        temperature.n() * 2.0,
        comp = float
    );

    let mut registry = PropertyRegistry::new("Test", NAMES);
    registry.set(Arc::new(property), "YoungsModulus").unwrap();
    registry
        .set(Arc::new(ConstantProperty::scalar(0.3)), "PoissonRatio")
        .unwrap();
    assert!(registry.depends_on(0, DofType::TEMP));
    assert!(!registry.depends_on(1, DofType::TEMP));
    assert_eq!(registry.dof_dependencies(), vec![DofType::TEMP]);
}

#[test]
#[should_panic(expected = "does not depend")]
fn constant_property_has_no_derivative() {
    let property = ConstantProperty::new(DVector::from_element(2, 1.0));
    property.d_prop_d_dof(DofType::UX, &FieldInterpolatorManager::new());
}
