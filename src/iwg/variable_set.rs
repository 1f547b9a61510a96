//! Flattened state and test-function sets of coupled systems.
//!
//! For residual dof groups `[P, VX, TEMP]` the state vector is `Y = [p, v_1, .., v_d, T]`, so a
//! 2D problem has 4 state variables and a 3D problem 5. Test functions follow the coefficient
//! layout of the same groups, which matches [`DofAssemblyMap`](crate::iwg::DofAssemblyMap) built
//! from the same list.
use crate::cache::Cached;
use crate::dof::DofType;
use crate::field_interpolator::{FieldInterpolator, FieldInterpolatorManager};
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};

/// Index of `∂²/∂x_i∂x_j` in the Voigt ordering of second derivatives.
pub fn second_derivative_index(space_dim: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    match (space_dim, i, j) {
        (2, 0, 0) => 0,
        (2, 1, 1) => 1,
        (2, 0, 1) => 2,
        (3, 0, 0) => 0,
        (3, 1, 1) => 1,
        (3, 2, 2) => 2,
        (3, 1, 2) => 3,
        (3, 0, 2) => 4,
        (3, 0, 1) => 5,
        _ => panic!("Invalid second derivative ({}, {}) in {} dimensions.", i, j, space_dim),
    }
}

fn num_state_variables<T: Real>(dof_types: &[DofType], fis: &FieldInterpolatorManager<T>) -> usize {
    dof_types
        .iter()
        .map(|&dof| fis.field_interpolator(dof).number_of_fields())
        .sum()
}

fn num_coefficients<T: Real>(dof_types: &[DofType], fis: &FieldInterpolatorManager<T>) -> usize {
    dof_types
        .iter()
        .map(|&dof| fis.num_coefficients(dof))
        .sum()
}

/// Concatenates per-group matrices column-wise (one column per field).
fn concat_fields<T: Real>(
    dof_types: &[DofType],
    fis: &FieldInterpolatorManager<T>,
    num_rows: usize,
    f: impl Fn(&dyn FieldInterpolator<T>) -> DMatrix<T>,
) -> DMatrix<T> {
    let mut result = DMatrix::zeros(num_rows, num_state_variables(dof_types, fis));
    let mut offset = 0;
    for &dof in dof_types {
        let block = f(fis.field_interpolator(dof));
        assert_eq!(block.nrows(), num_rows);
        result.columns_mut(offset, block.ncols()).copy_from(&block);
        offset += block.ncols();
    }
    result
}

/// State variables `Y` and their derivatives.
#[derive(Debug, Clone, Default)]
pub struct VariableSet<T: Real> {
    dof_types: Vec<DofType>,
    y: Cached<DVector<T>>,
    dydt: Cached<DVector<T>>,
    dydx: Cached<DMatrix<T>>,
    d2ydx2: Cached<DMatrix<T>>,
}

impl<T: Real> VariableSet<T> {
    pub fn new(dof_types: Vec<DofType>) -> Self {
        Self {
            dof_types,
            y: Cached::default(),
            dydt: Cached::default(),
            dydx: Cached::default(),
            d2ydx2: Cached::default(),
        }
    }

    pub fn dof_types(&self) -> &[DofType] {
        &self.dof_types
    }

    pub fn reset_spec_eval_flags(&mut self) {
        self.y.invalidate();
        self.dydt.invalidate();
        self.dydx.invalidate();
        self.d2ydx2.invalidate();
    }

    pub fn num_state_variables(&self, fis: &FieldInterpolatorManager<T>) -> usize {
        num_state_variables(&self.dof_types, fis)
    }

    pub fn y(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        if self.y.is_stale() {
            let y = concat_fields(&self.dof_types, fis, 1, |fi| {
                let val = fi.val();
                DMatrix::from_row_slice(1, val.len(), val.as_slice())
            })
            .row(0)
            .transpose();
            self.y.set(y);
        }
        self.y.value()
    }

    pub fn dydt(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        if self.dydt.is_stale() {
            let dydt = concat_fields(&self.dof_types, fis, 1, |fi| fi.gradt(1))
                .row(0)
                .transpose();
            self.dydt.set(dydt);
        }
        self.dydt.value()
    }

    /// Spatial gradient of the state, `space_dim x num_state_variables`.
    pub fn dydx(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        if self.dydx.is_stale() {
            let rows = fis.field_interpolator(self.dof_types[0]).space_dim();
            let dydx = concat_fields(&self.dof_types, fis, rows, |fi| fi.gradx(1));
            self.dydx.set(dydx);
        }
        self.dydx.value()
    }

    /// Second spatial derivatives of the state in Voigt order, one row per derivative.
    pub fn d2ydx2(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        if self.d2ydx2.is_stale() {
            let space_dim = fis.field_interpolator(self.dof_types[0]).space_dim();
            let rows = if space_dim == 2 { 3 } else { 6 };
            let d2ydx2 = concat_fields(&self.dof_types, fis, rows, |fi| fi.gradx(2));
            self.d2ydx2.set(d2ydx2);
        }
        self.d2ydx2.value()
    }
}

/// Test functions `W` of a coupled system and their derivatives.
///
/// `W` has one row per state variable and one column per coefficient. Each state variable's row
/// holds the basis functions in the coefficient block of its own field.
#[derive(Debug, Clone, Default)]
pub struct TestFunctionSet<T: Real> {
    dof_types: Vec<DofType>,
    w: Cached<DMatrix<T>>,
    dwdt: Cached<DMatrix<T>>,
    dwdx: Cached<Vec<DMatrix<T>>>,
    d2wdx2: Cached<Vec<DMatrix<T>>>,
}

impl<T: Real> TestFunctionSet<T> {
    pub fn new(dof_types: Vec<DofType>) -> Self {
        Self {
            dof_types,
            w: Cached::default(),
            dwdt: Cached::default(),
            dwdx: Cached::default(),
            d2wdx2: Cached::default(),
        }
    }

    pub fn dof_types(&self) -> &[DofType] {
        &self.dof_types
    }

    pub fn reset_spec_eval_flags(&mut self) {
        self.w.invalidate();
        self.dwdt.invalidate();
        self.dwdx.invalidate();
        self.d2wdx2.invalidate();
    }

    pub fn num_coefficients(&self, fis: &FieldInterpolatorManager<T>) -> usize {
        num_coefficients(&self.dof_types, fis)
    }

    /// Places `row_of(fi)` (a `1 x num_bases` row) on the diagonal block of every field.
    fn block_diagonal(&self, fis: &FieldInterpolatorManager<T>, row_of: impl Fn(&dyn FieldInterpolator<T>) -> DMatrix<T>) -> DMatrix<T> {
        let mut w = DMatrix::zeros(
            num_state_variables(&self.dof_types, fis),
            num_coefficients(&self.dof_types, fis),
        );
        let mut row = 0;
        let mut col = 0;
        for &dof in &self.dof_types {
            let fi = fis.field_interpolator(dof);
            let basis_row = row_of(fi);
            let nb = fi.number_of_space_time_bases();
            assert_eq!(basis_row.shape(), (1, nb));
            for _ in 0..fi.number_of_fields() {
                w.view_mut((row, col), (1, nb)).copy_from(&basis_row);
                row += 1;
                col += nb;
            }
        }
        w
    }

    pub fn w(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        if self.w.is_stale() {
            let w = self.block_diagonal(fis, |fi| {
                let nb = fi.number_of_space_time_bases();
                fi.n().view((0, 0), (1, nb)).clone_owned()
            });
            self.w.set(w);
        }
        self.w.value()
    }

    pub fn dwdt(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        if self.dwdt.is_stale() {
            let dwdt = self.block_diagonal(fis, |fi| fi.dnndtn(1));
            self.dwdt.set(dwdt);
        }
        self.dwdt.value()
    }

    /// `dwdx()[i]` is the derivative of `W` with respect to `x_i`.
    pub fn dwdx(&mut self, fis: &FieldInterpolatorManager<T>) -> &[DMatrix<T>] {
        if self.dwdx.is_stale() {
            let space_dim = fis.field_interpolator(self.dof_types[0]).space_dim();
            let dwdx = (0..space_dim)
                .map(|i| self.block_diagonal(fis, |fi| fi.dnndxn(1).rows(i, 1).into_owned()))
                .collect();
            self.dwdx.set(dwdx);
        }
        self.dwdx.value()
    }

    /// `d2wdx2()[k]` is the `k`-th Voigt second derivative of `W`.
    pub fn d2wdx2(&mut self, fis: &FieldInterpolatorManager<T>) -> &[DMatrix<T>] {
        if self.d2wdx2.is_stale() {
            let space_dim = fis.field_interpolator(self.dof_types[0]).space_dim();
            let num_derivatives = if space_dim == 2 { 3 } else { 6 };
            let d2wdx2 = (0..num_derivatives)
                .map(|k| self.block_diagonal(fis, |fi| fi.dnndxn(2).rows(k, 1).into_owned()))
                .collect();
            self.d2wdx2.set(d2wdx2);
        }
        self.d2wdx2.value()
    }
}
