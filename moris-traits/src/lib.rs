//! Core traits shared by the `moris` crates.
use nalgebra::{DVector, RealField, Scalar};

pub use nalgebra;

/// Scalar type used throughout `moris`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Narrow read-only view of a background mesh.
///
/// Mesh generation and topology bookkeeping live outside of `moris`. The geometry engine only ever
/// needs vertex coordinates, the vertex pairs that make up edges and the vertices of a cell,
/// which is what this trait exposes.
pub trait BackgroundMesh<T: Scalar> {
    fn space_dim(&self) -> usize;

    fn num_vertices(&self) -> usize;

    fn vertex_coordinates(&self, vertex_index: usize) -> DVector<T>;

    fn num_edges(&self) -> usize;

    fn edge_vertices(&self, edge_index: usize) -> [usize; 2];

    fn num_cells(&self) -> usize;

    fn cell_vertices(&self, cell_index: usize) -> &[usize];
}
