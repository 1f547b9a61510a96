//! The field-interpolator contract and a nodal implementation of it.
//!
//! A field interpolator represents one dof group (e.g. displacement) at the current integration
//! point. It is never constructed by constitutive models or IWGs, which only query it.
//!
//! Conventions used by every interpolator:
//!
//! - Spatial derivatives of order 2 are stored in Voigt order `[xx, yy, xy]` (2D) or
//!   `[xx, yy, zz, yz, xz, xy]` (3D).
//! - Spatial derivatives of order 3 are stored as `[xxx, yyy, xxy, xyy]` (2D) or
//!   `[xxx, yyy, zzz, xxy, xxz, xyy, yyz, xzz, yzz, xyz]` (3D).
//! - Coefficients of a group with several fields are field-major: all bases of the first field,
//!   then all bases of the second field, and so on.
use crate::dof::DofType;
use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;
use std::fmt;

/// Number of distinct spatial derivatives of the given order in the given dimension.
///
/// # Panics
///
/// Panics if the order is not in `1..=3` or the dimension is not 1, 2 or 3.
pub fn num_derivative_components(space_dim: usize, order: usize) -> usize {
    match (space_dim, order) {
        (1, 1..=3) => 1,
        (2, 1) => 2,
        (2, 2) => 3,
        (2, 3) => 4,
        (3, 1) => 3,
        (3, 2) => 6,
        (3, 3) => 10,
        _ => panic!(
            "Derivatives of order {} in {} dimensions are not supported.",
            order, space_dim
        ),
    }
}

pub trait FieldInterpolator<T: Real> {
    fn space_dim(&self) -> usize;

    fn number_of_fields(&self) -> usize;

    fn number_of_space_time_bases(&self) -> usize;

    fn number_of_space_time_coefficients(&self) -> usize {
        self.number_of_fields() * self.number_of_space_time_bases()
    }

    /// The interpolation matrix of size `num_fields x num_coefficients`.
    ///
    /// Each field row contains the basis function values in the block belonging to that field.
    fn n(&self) -> DMatrix<T>;

    /// Field values at the current point.
    fn val(&self) -> DVector<T>;

    /// Spatial derivatives of the given order, with one row per derivative component and one column
    /// per field.
    fn gradx(&self, order: usize) -> DMatrix<T>;

    /// Time derivatives of the given order as a `1 x num_fields` matrix.
    fn gradt(&self, order: usize) -> DMatrix<T>;

    /// Spatial derivatives of the basis functions of the given order, with one row per derivative
    /// component and one column per basis function.
    fn dnndxn(&self, order: usize) -> DMatrix<T>;

    /// Time derivatives of the basis functions as a `1 x num_bases` matrix.
    fn dnndtn(&self, order: usize) -> DMatrix<T>;
}

/// Non-owning collection of the field interpolators available at the current integration point.
pub struct FieldInterpolatorManager<'a, T> {
    interpolators: FxHashMap<DofType, &'a dyn FieldInterpolator<T>>,
}

impl<'a, T> Default for FieldInterpolatorManager<'a, T> {
    fn default() -> Self {
        Self {
            interpolators: FxHashMap::default(),
        }
    }
}

impl<'a, T> fmt::Debug for FieldInterpolatorManager<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dofs: Vec<_> = self.interpolators.keys().collect();
        dofs.sort();
        f.debug_struct("FieldInterpolatorManager")
            .field("dof_types", &dofs)
            .finish()
    }
}

impl<'a, T: Real> FieldInterpolatorManager<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dof_type: DofType, interpolator: &'a dyn FieldInterpolator<T>) -> Self {
        self.insert(dof_type, interpolator);
        self
    }

    pub fn insert(&mut self, dof_type: DofType, interpolator: &'a dyn FieldInterpolator<T>) {
        self.interpolators.insert(dof_type, interpolator);
    }

    pub fn contains(&self, dof_type: DofType) -> bool {
        self.interpolators.contains_key(&dof_type)
    }

    pub fn get(&self, dof_type: DofType) -> Option<&'a dyn FieldInterpolator<T>> {
        self.interpolators.get(&dof_type).copied()
    }

    /// Returns the interpolator for the given dof group.
    ///
    /// # Panics
    ///
    /// Panics if no interpolator has been supplied for the dof group.
    pub fn field_interpolator(&self, dof_type: DofType) -> &'a dyn FieldInterpolator<T> {
        self.get(dof_type).unwrap_or_else(|| {
            panic!(
                "No field interpolator supplied for dof type {} at the current point.",
                dof_type
            )
        })
    }

    /// Number of coefficients of the dof group, used to size derivative matrices.
    pub fn num_coefficients(&self, dof_type: DofType) -> usize {
        self.field_interpolator(dof_type)
            .number_of_space_time_coefficients()
    }
}

/// Basis function values and derivatives at a single point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBasis<T: Real> {
    pub n: DVector<T>,
    pub dndx: DMatrix<T>,
    pub d2ndx2: DMatrix<T>,
    pub d3ndx3: DMatrix<T>,
    pub dndt: DVector<T>,
    pub d2ndt2: DVector<T>,
}

impl<T: Real> PointBasis<T> {
    /// Creates a basis from values and first derivatives. Higher and time derivatives are zero.
    ///
    /// # Panics
    ///
    /// Panics if `dndx` does not have one column per basis function.
    pub fn new(n: DVector<T>, dndx: DMatrix<T>) -> Self {
        let num_bases = n.len();
        let space_dim = dndx.nrows();
        assert_eq!(dndx.ncols(), num_bases, "Basis gradient must have one column per basis.");
        Self {
            d2ndx2: DMatrix::zeros(num_derivative_components(space_dim, 2), num_bases),
            d3ndx3: DMatrix::zeros(num_derivative_components(space_dim, 3), num_bases),
            dndt: DVector::zeros(num_bases),
            d2ndt2: DVector::zeros(num_bases),
            n,
            dndx,
        }
    }

    pub fn with_second_derivatives(mut self, d2ndx2: DMatrix<T>) -> Self {
        assert_eq!(d2ndx2.shape(), self.d2ndx2.shape());
        self.d2ndx2 = d2ndx2;
        self
    }

    pub fn with_third_derivatives(mut self, d3ndx3: DMatrix<T>) -> Self {
        assert_eq!(d3ndx3.shape(), self.d3ndx3.shape());
        self.d3ndx3 = d3ndx3;
        self
    }

    pub fn with_time_derivatives(mut self, dndt: DVector<T>, d2ndt2: DVector<T>) -> Self {
        assert_eq!(dndt.len(), self.n.len());
        assert_eq!(d2ndt2.len(), self.n.len());
        self.dndt = dndt;
        self.d2ndt2 = d2ndt2;
        self
    }

    pub fn num_bases(&self) -> usize {
        self.n.len()
    }

    pub fn space_dim(&self) -> usize {
        self.dndx.nrows()
    }
}

/// Computes the linear basis of a triangle (3 vertices in 2D) or tetrahedron (4 vertices in 3D)
/// at the point with the given barycentric coordinates.
///
/// The vertices are the rows of `vertices`.
pub fn linear_simplex_basis<T: Real>(vertices: &DMatrix<T>, barycentric: &DVector<T>) -> eyre::Result<PointBasis<T>> {
    let num_vertices = vertices.nrows();
    let space_dim = vertices.ncols();
    if num_vertices != space_dim + 1 || !(2..=3).contains(&space_dim) {
        return Err(eyre!(
            "Linear simplex basis requires d + 1 vertices in 2 or 3 dimensions, got {} vertices in {} dimensions.",
            num_vertices,
            space_dim
        ));
    }
    if barycentric.len() != num_vertices {
        return Err(eyre!("Expected {} barycentric coordinates.", num_vertices));
    }

    // Barycentric coordinates satisfy M * lambda = [1, x]^T with M = [1 ... 1; x_0 ... x_d],
    // so the gradients of lambda are the trailing columns of inv(M).
    let mut m = DMatrix::from_element(num_vertices, num_vertices, T::one());
    m.view_mut((1, 0), (space_dim, num_vertices))
        .copy_from(&vertices.transpose());
    let m_inv = m
        .try_inverse()
        .ok_or_else(|| eyre!("Degenerate simplex: vertices are affinely dependent."))?;
    let dndx = m_inv
        .view((0, 1), (num_vertices, space_dim))
        .transpose();

    Ok(PointBasis::new(barycentric.clone(), dndx))
}

/// A field interpolator for a group of fields sharing one nodal basis.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalFieldInterpolator<T: Real> {
    /// `num_bases x num_fields`
    coefficients: DMatrix<T>,
    basis: PointBasis<T>,
}

impl<T: Real> NodalFieldInterpolator<T> {
    /// Creates an interpolator from nodal coefficients (one row per basis, one column per field).
    ///
    /// # Panics
    ///
    /// Panics if the number of coefficient rows does not match the number of bases.
    pub fn new(coefficients: DMatrix<T>, basis: PointBasis<T>) -> Self {
        assert_eq!(
            coefficients.nrows(),
            basis.num_bases(),
            "Coefficient matrix must have one row per basis function."
        );
        Self { coefficients, basis }
    }

    pub fn coefficients(&self) -> &DMatrix<T> {
        &self.coefficients
    }

    /// Coefficients flattened in field-major order.
    pub fn coefficient_vector(&self) -> DVector<T> {
        DVector::from_column_slice(self.coefficients.as_slice())
    }

    pub fn set_coefficients(&mut self, coefficients: DMatrix<T>) {
        assert_eq!(coefficients.shape(), self.coefficients.shape());
        self.coefficients = coefficients;
    }

    /// Sets the coefficients from a field-major vector.
    pub fn set_coefficient_vector(&mut self, coefficients: &[T]) {
        let (num_bases, num_fields) = self.coefficients.shape();
        self.coefficients = DMatrix::from_column_slice(num_bases, num_fields, coefficients);
    }

    pub fn basis(&self) -> &PointBasis<T> {
        &self.basis
    }

    /// Moves the interpolator to a new point.
    pub fn set_basis(&mut self, basis: PointBasis<T>) {
        assert_eq!(basis.num_bases(), self.basis.num_bases());
        self.basis = basis;
    }
}

impl<T: Real> FieldInterpolator<T> for NodalFieldInterpolator<T> {
    fn space_dim(&self) -> usize {
        self.basis.space_dim()
    }

    fn number_of_fields(&self) -> usize {
        self.coefficients.ncols()
    }

    fn number_of_space_time_bases(&self) -> usize {
        self.basis.num_bases()
    }

    fn n(&self) -> DMatrix<T> {
        let num_fields = self.number_of_fields();
        let num_bases = self.number_of_space_time_bases();
        let mut n = DMatrix::zeros(num_fields, num_fields * num_bases);
        for field in 0..num_fields {
            n.view_mut((field, field * num_bases), (1, num_bases))
                .copy_from(&self.basis.n.transpose());
        }
        n
    }

    fn val(&self) -> DVector<T> {
        self.coefficients.tr_mul(&self.basis.n)
    }

    fn gradx(&self, order: usize) -> DMatrix<T> {
        self.dnndxn(order) * &self.coefficients
    }

    fn gradt(&self, order: usize) -> DMatrix<T> {
        self.dnndtn(order) * &self.coefficients
    }

    fn dnndxn(&self, order: usize) -> DMatrix<T> {
        match order {
            1 => self.basis.dndx.clone(),
            2 => self.basis.d2ndx2.clone(),
            3 => self.basis.d3ndx3.clone(),
            _ => panic!("Spatial basis derivatives of order {} are not supported.", order),
        }
    }

    fn dnndtn(&self, order: usize) -> DMatrix<T> {
        match order {
            1 => DMatrix::from_row_slice(1, self.basis.dndt.len(), self.basis.dndt.as_slice()),
            2 => DMatrix::from_row_slice(1, self.basis.d2ndt2.len(), self.basis.d2ndt2.as_slice()),
            _ => panic!("Time basis derivatives of order {} are not supported.", order),
        }
    }
}
