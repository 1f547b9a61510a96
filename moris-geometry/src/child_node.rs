use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;

/// Linear Lagrange basis on `[-1, 1]` with its node at `alpha ∈ {-1, 1}`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn phi_linear_1d<T: Real>(alpha: T, xi: T) -> T {
    (1.0 + alpha * xi) / 2.0
}

/// Evaluates the linear basis of the parent cell identified by its number of vertices and the
/// dimension of the local coordinates.
///
/// Supported parents:
///
/// - 2 vertices, 1 coordinate: edge with `ξ ∈ [-1, 1]`.
/// - 3 vertices, 2 coordinates: triangle in area coordinates, `[1 - ξ - η, ξ, η]`.
/// - 4 vertices, 2 coordinates: bilinear quadrilateral on `[-1, 1]²`.
/// - 4 vertices, 3 coordinates: tetrahedron in volume coordinates.
/// - 8 vertices, 3 coordinates: trilinear hexahedron on `[-1, 1]³`.
#[rustfmt::skip]
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn parent_basis<T: Real>(num_vertices: usize, xi: &DVector<T>) -> eyre::Result<DVector<T>> {
    let phi = phi_linear_1d::<T>;
    let basis = match (num_vertices, xi.len()) {
        (2, 1) => vec![phi(-1.0, xi[0]), phi(1.0, xi[0])],
        (3, 2) => vec![1.0 - xi[0] - xi[1], xi[0], xi[1]],
        (4, 2) => vec![
            phi(-1.0, xi[0]) * phi(-1.0, xi[1]),
            phi( 1.0, xi[0]) * phi(-1.0, xi[1]),
            phi( 1.0, xi[0]) * phi( 1.0, xi[1]),
            phi(-1.0, xi[0]) * phi( 1.0, xi[1]),
        ],
        (4, 3) => vec![1.0 - xi[0] - xi[1] - xi[2], xi[0], xi[1], xi[2]],
        (8, 3) => {
            let phi3 = |alpha, beta, gamma| phi(alpha, xi[0]) * phi(beta, xi[1]) * phi(gamma, xi[2]);
            vec![
                phi3(-1.0, -1.0, -1.0),
                phi3( 1.0, -1.0, -1.0),
                phi3( 1.0,  1.0, -1.0),
                phi3(-1.0,  1.0, -1.0),
                phi3(-1.0, -1.0,  1.0),
                phi3( 1.0, -1.0,  1.0),
                phi3( 1.0,  1.0,  1.0),
                phi3(-1.0,  1.0,  1.0),
            ]
        }
        (n, d) => {
            return Err(eyre!(
                "Unsupported parent cell with {} vertices and {}-dimensional local coordinates.",
                n,
                d
            ))
        }
    };
    Ok(DVector::from_vec(basis))
}

/// A node created inside a parent cell of the background mesh.
///
/// Quantities at the child are basis-weighted combinations of the corresponding quantities of its
/// ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildNode<T: Real> {
    ancestors: Vec<usize>,
    local_coordinates: DVector<T>,
    basis: DVector<T>,
}

impl<T: Real> ChildNode<T> {
    /// Creates a child from the ancestor node indices and its local coordinates in the parent.
    ///
    /// # Errors
    ///
    /// Fails if the parent cell type is not supported, see [`parent_basis`].
    pub fn new(ancestors: Vec<usize>, local_coordinates: DVector<T>) -> eyre::Result<Self> {
        let basis = parent_basis(ancestors.len(), &local_coordinates)?;
        Ok(Self {
            ancestors,
            local_coordinates,
            basis,
        })
    }

    /// Creates a child on the edge `a -> b` at `t ∈ [0, 1]`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn on_edge(a: usize, b: usize, t: T) -> Self {
        let xi = DVector::from_element(1, 2.0 * t - 1.0);
        Self {
            ancestors: vec![a, b],
            basis: DVector::from_vec(vec![1.0 - t, t]),
            local_coordinates: xi,
        }
    }

    pub fn ancestors(&self) -> &[usize] {
        &self.ancestors
    }

    pub fn local_coordinates(&self) -> &DVector<T> {
        &self.local_coordinates
    }

    pub fn basis(&self) -> &DVector<T> {
        &self.basis
    }

    fn check_ancestor_count(&self, count: usize) {
        assert_eq!(
            count,
            self.ancestors.len(),
            "Expected one entry per ancestor ({}), got {}.",
            self.ancestors.len(),
            count
        );
    }

    /// `Σ N_i φ_i` over the ancestors.
    ///
    /// # Panics
    ///
    /// Panics if the number of values does not match the number of ancestors.
    pub fn interpolate_field_value(&self, ancestor_values: &[T]) -> T {
        self.check_ancestor_count(ancestor_values.len());
        ancestor_values
            .iter()
            .zip(self.basis.iter())
            .fold(T::zero(), |acc, (&value, &n)| acc + n * value)
    }

    /// Concatenates the ancestors' sensitivity rows, each scaled by its basis weight.
    ///
    /// Columns are not merged when ancestors share ADVs, so that the result stays aligned with
    /// [`join_determining_adv_ids`](Self::join_determining_adv_ids).
    pub fn join_field_sensitivities(&self, ancestor_sensitivities: &[DMatrix<T>]) -> DMatrix<T> {
        self.check_ancestor_count(ancestor_sensitivities.len());
        let num_columns = ancestor_sensitivities.iter().map(|s| s.ncols()).sum();
        let mut joined = DMatrix::zeros(1, num_columns);
        let mut offset = 0;
        for (sensitivities, &n) in ancestor_sensitivities.iter().zip(self.basis.iter()) {
            assert_eq!(sensitivities.nrows(), 1, "Field sensitivities must be rows.");
            joined
                .columns_mut(offset, sensitivities.ncols())
                .copy_from(&(sensitivities * n));
            offset += sensitivities.ncols();
        }
        joined
    }

    pub fn join_determining_adv_ids(&self, ancestor_ids: &[Vec<usize>]) -> Vec<usize> {
        self.check_ancestor_count(ancestor_ids.len());
        ancestor_ids.concat()
    }
}
