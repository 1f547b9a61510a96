use matrixcompare::assert_matrix_eq;
use moris_optimize::calculus::*;
use nalgebra::{dmatrix, DVector, DVectorView};

#[test]
fn approximate_jacobian_simple_function() {
    let mut x = DVector::from_column_slice(&[3.0, 4.0]);
    let j = approximate_jacobian_fd(
        3,
        |x, mut f| {
            let (x1, x2): (f64, f64) = (x[0], x[1]);
            f[0] = x1 * x2 + 3.0;
            f[1] = x1 * x1 + x2 * x2 + x1 + 5.0;
            f[2] = x2.sin();
        },
        &mut x,
        1e-6,
    );

    // J = [   x2           x1  ]
    //     [ 2*x1 + 1     2*x2  ]
    //     [   0        cos(x2) ]
    let expected = dmatrix![4.0, 3.0;
                            7.0, 8.0;
                            0.0, 4.0f64.cos()];
    assert_matrix_eq!(j, expected, comp = abs, tol = 1e-6);
    // The input is restored
    assert_eq!(x, DVector::from_column_slice(&[3.0, 4.0]));
}

#[test]
fn test_approximate_gradient_fd() {
    let f = |x: DVectorView<f64>| {
        let (x, y, z) = (x[0], x[1], x[2]);
        3.0 * x * x * x + 3.0 * x * y - 5.0 * z * z + 2.0
    };
    let f_grad = |x: &DVector<f64>| {
        let (x, y, z) = (x[0], x[1], x[2]);
        DVector::from_column_slice(&[9.0 * x * x + 3.0 * y, 3.0 * x, -10.0 * z])
    };

    let mut x = DVector::from_column_slice(&[3.0, 4.0, 5.0]);
    let f_grad_fd = approximate_gradient_fd(f, &mut x, 1e-6);

    assert_matrix_eq!(f_grad_fd, f_grad(&x), comp = abs, tol = 1e-6);
}
