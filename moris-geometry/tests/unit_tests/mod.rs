use moris_geometry::BackgroundMesh;
use nalgebra::DVector;

mod child_node;
mod field;

/// A structured grid of `n x n` vertices on `[-1, 1]²` with axis-aligned edges.
///
/// Vertex `(i, j)` has index `j * n + i`.
pub struct GridMesh {
    n: usize,
    vertices: Vec<DVector<f64>>,
    edges: Vec<[usize; 2]>,
    cells: Vec<Vec<usize>>,
}

impl GridMesh {
    pub fn new(n: usize) -> Self {
        let h = 2.0 / (n - 1) as f64;
        let index = |i: usize, j: usize| j * n + i;
        let mut vertices = Vec::new();
        for j in 0..n {
            for i in 0..n {
                vertices.push(DVector::from_vec(vec![-1.0 + i as f64 * h, -1.0 + j as f64 * h]));
            }
        }
        let mut edges = Vec::new();
        for j in 0..n {
            for i in 0..n - 1 {
                edges.push([index(i, j), index(i + 1, j)]);
                edges.push([index(j, i), index(j, i + 1)]);
            }
        }
        let mut cells = Vec::new();
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                cells.push(vec![index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1)]);
            }
        }
        Self {
            n,
            vertices,
            edges,
            cells,
        }
    }

    pub fn vertices(&self) -> &[DVector<f64>] {
        &self.vertices
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    pub fn vertex_index(&self, i: usize, j: usize) -> usize {
        j * self.n + i
    }
}

impl BackgroundMesh<f64> for GridMesh {
    fn space_dim(&self) -> usize {
        2
    }

    fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn vertex_coordinates(&self, vertex_index: usize) -> DVector<f64> {
        self.vertices[vertex_index].clone()
    }

    fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn edge_vertices(&self, edge_index: usize) -> [usize; 2] {
        self.edges[edge_index]
    }

    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_vertices(&self, cell_index: usize) -> &[usize] {
        &self.cells[cell_index]
    }
}
