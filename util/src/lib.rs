use nalgebra::DMatrix;

/// Poor man's approx assertion for matrices with a combined absolute/relative tolerance.
///
/// Entries are compared with `|x - y| <= abstol + reltol * max(|x|, |y|)`.
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $atol:expr, reltol = $rtol:expr) => {{
        let (x, y) = (&$x, &$y);
        assert_eq!(x.shape(), y.shape(), "Matrices must have the same shape.");
        if let Some((i, j)) = $crate::first_mismatch(x, y, $atol, $rtol) {
            println!("abstol: {:e}, reltol: {:e}", $atol, $rtol);
            println!("left: {}", x);
            println!("right: {}", y);
            panic!(
                "Matrices differ at ({}, {}): {:e} vs {:e}",
                i,
                j,
                x[(i, j)],
                y[(i, j)]
            );
        }
    }};
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        $crate::assert_approx_matrix_eq!($x, $y, abstol = $tol, reltol = 0.0)
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Returns the first index at which two equally shaped matrices differ by more than the given
/// tolerances.
pub fn first_mismatch<R, C, S1, S2>(
    x: &nalgebra::Matrix<f64, R, C, S1>,
    y: &nalgebra::Matrix<f64, R, C, S2>,
    abstol: f64,
    reltol: f64,
) -> Option<(usize, usize)>
where
    R: nalgebra::Dim,
    C: nalgebra::Dim,
    S1: nalgebra::storage::Storage<f64, R, C>,
    S2: nalgebra::storage::Storage<f64, R, C>,
{
    for j in 0..x.ncols() {
        for i in 0..x.nrows() {
            let (a, b) = (x[(i, j)], y[(i, j)]);
            let scale = a.abs().max(b.abs());
            if (a - b).abs() > abstol + reltol * scale {
                return Some((i, j));
            }
        }
    }
    None
}

/// Stacks the given matrices vertically. All matrices must have the same number of columns.
pub fn stack_vertically(matrices: &[DMatrix<f64>]) -> DMatrix<f64> {
    let ncols = matrices.first().map(|m| m.ncols()).unwrap_or(0);
    let nrows = matrices.iter().map(|m| m.nrows()).sum();
    let mut output = DMatrix::zeros(nrows, ncols);
    let mut offset = 0;
    for matrix in matrices {
        assert_eq!(matrix.ncols(), ncols, "All matrices must have same number of columns.");
        output.view_mut((offset, 0), matrix.shape()).copy_from(matrix);
        offset += matrix.nrows();
    }
    output
}
