use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use moris_geometry::{parent_basis, ChildNode};
use nalgebra::{dmatrix, dvector, DVector};
use util::assert_panics;

#[test]
fn parent_bases_are_partitions_of_unity() {
    let cases = [
        (2, dvector![0.3]),
        (3, dvector![0.2, 0.5]),
        (4, dvector![-0.4, 0.7]),
        (4, dvector![0.1, 0.2, 0.3]),
        (8, dvector![0.1, -0.6, 0.9]),
    ];
    for (num_vertices, xi) in cases {
        let basis = parent_basis(num_vertices, &xi).unwrap();
        assert_eq!(basis.len(), num_vertices);
        assert_scalar_eq!(basis.sum(), 1.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn hexahedron_basis_at_center_and_vertex() {
    let center = parent_basis(8, &DVector::zeros(3)).unwrap();
    assert_matrix_eq!(center, DVector::from_element(8, 0.125), comp = float);

    let vertex = parent_basis(8, &dvector![1.0, 1.0, -1.0]).unwrap();
    assert_matrix_eq!(vertex, dvector![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0], comp = float);
}

#[test]
fn unsupported_parent_is_an_error() {
    assert!(parent_basis(5, &dvector![0.0, 0.0]).is_err());
    assert!(parent_basis(4, &dvector![0.0]).is_err());
    assert!(ChildNode::new(vec![0, 1, 2], dvector![0.0]).is_err());
}

#[test]
fn edge_child_interpolates_ancestors() {
    let child = ChildNode::on_edge(3, 7, 0.25);
    assert_eq!(child.ancestors(), &[3, 7]);
    assert_matrix_eq!(child.local_coordinates().clone(), dvector![-0.5], comp = float);
    assert_matrix_eq!(child.basis().clone(), dvector![0.75, 0.25], comp = float);
    assert_scalar_eq!(child.interpolate_field_value(&[-1.0, 3.0]), 0.0, comp = abs, tol = 1e-15);

    // The general constructor agrees with the edge shortcut
    let general = ChildNode::new(vec![3, 7], dvector![-0.5]).unwrap();
    assert_matrix_eq!(general.basis().clone(), child.basis().clone(), comp = float);
}

#[test]
fn joined_sensitivities_are_concatenated() {
    let child = ChildNode::on_edge(0, 1, 0.25);
    let joined = child.join_field_sensitivities(&[dmatrix![1.0], dmatrix![2.0, 3.0]]);
    assert_matrix_eq!(joined, dmatrix![0.75, 0.5, 0.75], comp = float);

    let ids = child.join_determining_adv_ids(&[vec![4], vec![4, 9]]);
    assert_eq!(ids, vec![4, 4, 9]);
}

#[test]
fn join_requires_one_entry_per_ancestor() {
    let child = ChildNode::on_edge(0, 1, 0.5);
    assert_panics!(child.interpolate_field_value(&[1.0]));
    assert_panics!(child.join_determining_adv_ids(&[vec![0], vec![1], vec![2]]));
}
