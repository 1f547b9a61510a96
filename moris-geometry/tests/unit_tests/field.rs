use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use moris_geometry::{
    build_field, Circle, FieldParameter, FieldParameters, LevelSetField, NodalField, ParameterSet, Plane, Sphere,
    VoxelField,
};
use moris_optimize::calculus::approximate_gradient_fd;
use nalgebra::{dmatrix, dvector, DMatrix, DVector, DVectorViewMut};
use util::assert_panics;

fn all_advs<const N: usize>() -> [FieldParameter<f64>; N] {
    let mut parameters = [FieldParameter::Adv(0); N];
    for (i, parameter) in parameters.iter_mut().enumerate() {
        *parameter = FieldParameter::Adv(i);
    }
    parameters
}

#[test]
fn parameter_set_imports_advs() {
    let mut parameters = ParameterSet::new(vec![
        FieldParameter::Constant(3.0),
        FieldParameter::Adv(2),
        FieldParameter::Adv(0),
    ]);
    assert_eq!(parameters.values(), &[3.0, 0.0, 0.0]);
    assert_eq!(parameters.adv_ids(), vec![2, 0]);

    parameters.import_advs(&dvector![7.0, 8.0, 9.0]).unwrap();
    assert_eq!(parameters.values(), &[3.0, 9.0, 7.0]);

    let selected = parameters.select_adv_derivatives(&[1.0, 2.0, 3.0]);
    assert_matrix_eq!(selected, dmatrix![2.0, 3.0], comp = float);

    assert!(parameters.import_advs(&dvector![1.0]).is_err());
}

#[test]
fn circle_value_and_sensitivities() {
    let [cx, cy, r] = all_advs::<3>();
    let mut circle = Circle::new([cx, cy], r);
    circle.import_advs(&dvector![1.0, 2.0, 0.5]).unwrap();
    let x = dvector![4.0, 6.0];

    assert_scalar_eq!(circle.value(0, &x), 4.5, comp = float);
    let sensitivities = circle.sensitivities(0, &x).unwrap();
    assert_matrix_eq!(sensitivities, dmatrix![-0.6, -0.8, -1.0], comp = abs, tol = 1e-14);
    assert_eq!(circle.determining_adv_ids(0, &x), vec![0, 1, 2]);
}

#[test]
fn circle_sensitivities_are_restricted_to_advs() {
    let mut circle = Circle::new(
        [FieldParameter::Constant(1.0), FieldParameter::Constant(2.0)],
        FieldParameter::Adv(4),
    );
    circle
        .import_advs(&dvector![0.0, 0.0, 0.0, 0.0, 0.5])
        .unwrap();
    let x = dvector![4.0, 6.0];
    assert_matrix_eq!(circle.sensitivities(0, &x).unwrap(), dmatrix![-1.0], comp = float);
    assert_eq!(circle.determining_adv_ids(0, &x), vec![4]);
}

#[test]
fn circle_sensitivities_fail_at_center() {
    let circle = Circle::from_constants([1.0, 2.0], 0.5);
    assert!(circle.sensitivities(0, &dvector![1.0, 2.0]).is_err());
}

#[test]
fn circle_rejects_wrong_dimension() {
    let circle = Circle::from_constants([1.0, 2.0], 0.5);
    assert_panics!(circle.value(0, &dvector![1.0, 2.0, 3.0]));
}

#[test]
fn sphere_sensitivities_match_finite_differences() {
    let [cx, cy, cz, r] = all_advs::<4>();
    let x = dvector![0.3, -1.2, 2.0];
    let sphere_value = |p: &DVector<f64>| {
        let mut sphere = Sphere::new([cx, cy, cz], r);
        sphere.import_advs(p).unwrap();
        sphere.value(0, &x)
    };

    let p0 = dvector![0.1, 0.2, -0.4, 1.5];
    let mut sphere = Sphere::new([cx, cy, cz], r);
    sphere.import_advs(&p0).unwrap();
    let sensitivities = sphere.sensitivities(0, &x).unwrap();

    let mut p = p0.clone();
    let gradient_fd = approximate_gradient_fd(|p| sphere_value(&p.clone_owned()), DVectorViewMut::from(&mut p), 1e-6);
    assert_matrix_eq!(sensitivities, gradient_fd.transpose(), comp = abs, tol = 1e-8);
}

#[test]
fn plane_value_and_sensitivities() {
    let [px, py, nx, ny] = all_advs::<4>();
    let mut plane = Plane::new(vec![px, py], vec![nx, ny]);
    plane.import_advs(&dvector![0.0, 1.0, 0.0, 2.0]).unwrap();
    let x = dvector![3.0, 4.0];

    assert_scalar_eq!(plane.value(0, &x), 6.0, comp = float);
    let sensitivities = plane.sensitivities(0, &x).unwrap();
    assert_matrix_eq!(sensitivities, dmatrix![-0.0, -2.0, 3.0, 3.0], comp = abs, tol = 1e-14);
    assert_eq!(plane.determining_adv_ids(0, &x), vec![0, 1, 2, 3]);
}

#[test]
fn plane_of_constants_has_no_sensitivities() {
    let plane = Plane::from_constants(&[0.0, 0.0, 0.0], &[0.0, 0.0, 1.0]);
    let x = dvector![1.0, 2.0, -3.0];
    assert_scalar_eq!(plane.value(0, &x), -3.0, comp = float);
    assert_eq!(plane.sensitivities(0, &x).unwrap().shape(), (1, 0));
    assert!(plane.determining_adv_ids(0, &x).is_empty());
}

#[test]
fn plane_rejects_mismatched_dimensions() {
    assert_panics!(Plane::from_constants(&[0.0, 0.0], &[0.0, 0.0, 1.0]));
}

#[test]
fn nodal_field_maps_nodes_to_advs() {
    let mut field = NodalField::with_consecutive_advs(3, 2);
    field
        .import_advs(&dvector![0.0, 0.0, 5.0, 6.0, 7.0])
        .unwrap();
    let x = DVector::zeros(2);

    assert_eq!(field.num_nodes(), 3);
    assert_scalar_eq!(field.value(1, &x), 6.0, comp = float);
    assert_matrix_eq!(field.sensitivities(1, &x).unwrap(), dmatrix![1.0], comp = float);
    assert_eq!(field.determining_adv_ids(1, &x), vec![3]);
    assert!(field.interpolate_child_nodes());
    assert_panics!(field.value(3, &x));
}

#[test]
fn nodal_field_with_constant_node() {
    let field = NodalField::new(vec![FieldParameter::Constant(-2.0), FieldParameter::Adv(0)]);
    let x = DVector::zeros(2);
    assert_scalar_eq!(field.value(0, &x), -2.0, comp = float);
    assert_eq!(field.sensitivities(0, &x).unwrap(), DMatrix::<f64>::zeros(1, 0));
    assert!(field.determining_adv_ids(0, &x).is_empty());
}

#[test]
fn voxel_field_values() {
    let field = VoxelField::new(dvector![0.0, 0.0], 1.0, vec![2, 2], vec![true, false, false, true]).unwrap();
    assert_scalar_eq!(field.value(0, &dvector![0.5, 0.5]), -1.0, comp = float);
    assert_scalar_eq!(field.value(0, &dvector![1.5, 0.5]), 1.0, comp = float);
    assert_scalar_eq!(field.value(0, &dvector![1.5, 1.5]), -1.0, comp = float);
    assert_scalar_eq!(field.value(0, &dvector![-0.5, 0.5]), 1.0, comp = float);
    assert_scalar_eq!(field.value(0, &dvector![0.5, 2.5]), 1.0, comp = float);
    assert!(field.determining_adv_ids(0, &dvector![0.5, 0.5]).is_empty());
}

#[test]
fn voxel_field_sensitivities_are_not_implemented() {
    let field = VoxelField::new(dvector![0.0, 0.0], 1.0, vec![1, 1], vec![true]).unwrap();
    let err = field
        .sensitivities(0, &dvector![0.5, 0.5])
        .unwrap_err();
    assert!(err.to_string().contains("not implemented"));
}

#[test]
fn voxel_field_validates_layout() {
    assert!(VoxelField::new(dvector![0.0, 0.0], 1.0, vec![2, 2], vec![true]).is_err());
    assert!(VoxelField::new(dvector![0.0, 0.0], 1.0, vec![2], vec![true, true]).is_err());
    assert!(VoxelField::new(dvector![0.0, 0.0], 0.0, vec![1, 1], vec![true]).is_err());
}

#[test]
fn field_parameter_serde() {
    let parameters = vec![FieldParameter::Constant(1.5), FieldParameter::Adv(3)];
    let json = serde_json::to_string(&parameters).unwrap();
    let deserialized: Vec<FieldParameter<f64>> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, parameters);
}

#[test]
fn build_field_from_json() {
    let json = r#"{
        "kind": "circle",
        "center": [{ "Constant": 1.0 }, { "Adv": 0 }],
        "radius": { "Constant": 0.5 }
    }"#;
    let parameters: FieldParameters<f64> = serde_json::from_str(json).unwrap();
    let mut field = build_field(&parameters).unwrap();
    field.import_advs(&dvector![2.0]).unwrap();

    let x = dvector![4.0, 6.0];
    assert_scalar_eq!(field.value(0, &x), 4.5, comp = float);
    assert_eq!(field.determining_adv_ids(0, &x), vec![0]);
    assert_matrix_eq!(field.sensitivities(0, &x).unwrap(), dmatrix![-0.8], comp = abs, tol = 1e-14);
}

#[test]
fn build_field_round_trips_through_serde() {
    let parameters = FieldParameters::Voxel {
        origin: vec![0.0, 0.0],
        voxel_size: 1.0,
        shape: vec![2, 1],
        filled: vec![false, true],
    };
    let json = serde_json::to_string(&parameters).unwrap();
    let deserialized: FieldParameters<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, parameters);

    let field = build_field(&deserialized).unwrap();
    assert_scalar_eq!(field.value(0, &dvector![1.5, 0.5]), -1.0, comp = float);
}

#[test]
fn build_field_rejects_invalid_descriptions() {
    let plane = FieldParameters::Plane {
        point: vec![FieldParameter::Constant(0.0); 2],
        normal: vec![FieldParameter::Constant(1.0); 3],
    };
    assert!(build_field(&plane).is_err());

    let voxel = FieldParameters::Voxel {
        origin: vec![0.0, 0.0],
        voxel_size: 1.0,
        shape: vec![2, 2],
        filled: vec![true],
    };
    assert!(build_field(&voxel).is_err());

    let unknown = r#"{ "kind": "torus", "radius": { "Constant": 1.0 } }"#;
    assert!(serde_json::from_str::<FieldParameters<f64>>(unknown).is_err());
}
