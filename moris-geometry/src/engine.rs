use crate::child_node::ChildNode;
use crate::field::LevelSetField;
use crate::intersection::{compute_dx_dp_with_linear_basis, intersection_global_coordinate, intersection_local_coordinate};
use eyre::eyre;
use log::debug;
use moris_traits::{BackgroundMesh, Real};
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum NodeState {
    #[default]
    Unvisited,
    PhaseEvaluated,
    Interface,
    Interior,
}

/// Per-node record with one phase value per geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord<T> {
    pub state: NodeState,
    pub phase_values: Vec<T>,
}

impl<T> Default for NodeRecord<T> {
    fn default() -> Self {
        Self {
            state: NodeState::Unvisited,
            phase_values: Vec::new(),
        }
    }
}

/// How much information [`GeometryEngine::is_intersected`] computes for intersected edges.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntersectionCheck {
    /// Only detect sign changes.
    SignOnly,
    /// Also compute local and global crossing coordinates.
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeIntersection<T> {
    pub edge_index: usize,
    pub vertices: [usize; 2],
    /// `t ∈ [0, 1]` along the edge, present for [`IntersectionCheck::Full`].
    pub local_coordinate: Option<T>,
    pub global_coordinates: Option<DVector<T>>,
}

/// A node on the zero level set of the active geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceNode<T> {
    pub node_index: usize,
    pub geometry_index: usize,
    pub parents: [usize; 2],
    pub local_coordinate: T,
    pub global_coordinates: DVector<T>,
    /// `space_dim x adv_ids.len()`, available after [`GeometryEngine::compute_interface_sensitivity`].
    pub dx_dp: Option<DMatrix<T>>,
    pub adv_ids: Vec<usize>,
}

/// Evaluates level-set geometries on background-mesh nodes, finds intersected edges and tracks
/// child and interface nodes together with their design sensitivities.
///
/// Node states follow `Unvisited -> PhaseEvaluated -> (Interface | Interior)`. States refer to the
/// active geometry and are reset when advancing to the next one.
#[derive(Debug)]
pub struct GeometryEngine<T: Real> {
    threshold: T,
    fields: Vec<Box<dyn LevelSetField<T>>>,
    active_geometry: usize,
    nodes: Vec<NodeRecord<T>>,
    coordinates: Vec<DVector<T>>,
    child_nodes: FxHashMap<usize, ChildNode<T>>,
    interface_nodes: Vec<InterfaceNode<T>>,
}

impl<T: Real> GeometryEngine<T> {
    /// # Errors
    ///
    /// Fails if no field is given.
    pub fn new(fields: Vec<Box<dyn LevelSetField<T>>>, threshold: T) -> eyre::Result<Self> {
        if fields.is_empty() {
            return Err(eyre!("Geometry engine requires at least one field."));
        }
        Ok(Self {
            threshold,
            fields,
            active_geometry: 0,
            nodes: Vec::new(),
            coordinates: Vec::new(),
            child_nodes: FxHashMap::default(),
            interface_nodes: Vec::new(),
        })
    }

    pub fn threshold(&self) -> T {
        self.threshold
    }

    pub fn num_geometries(&self) -> usize {
        self.fields.len()
    }

    pub fn active_geometry_index(&self) -> usize {
        self.active_geometry
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, node_index: usize) -> &NodeRecord<T> {
        &self.nodes[node_index]
    }

    pub fn node_state(&self, node_index: usize) -> NodeState {
        self.nodes[node_index].state
    }

    pub fn child_node(&self, node_index: usize) -> Option<&ChildNode<T>> {
        self.child_nodes.get(&node_index)
    }

    pub fn interface_nodes(&self) -> &[InterfaceNode<T>] {
        &self.interface_nodes
    }

    /// Moves on to the next geometry. Returns `false` if the active geometry is the last one.
    pub fn advance_geometry_index(&mut self) -> bool {
        if self.active_geometry + 1 >= self.fields.len() {
            return false;
        }
        self.active_geometry += 1;
        for node in &mut self.nodes {
            if matches!(node.state, NodeState::Interface | NodeState::Interior) {
                node.state = NodeState::PhaseEvaluated;
            }
        }
        debug!("Geometry engine: active geometry is now {}", self.active_geometry);
        true
    }

    /// Imports new ADVs into all fields. Phase values, child nodes and interface nodes are
    /// discarded and must be recomputed.
    pub fn import_advs(&mut self, advs: &DVector<T>) -> eyre::Result<()> {
        for field in &mut self.fields {
            field.import_advs(advs)?;
        }
        let num_background_nodes = self.nodes.len() - self.child_nodes.len();
        self.nodes.truncate(num_background_nodes);
        self.coordinates.truncate(num_background_nodes.min(self.coordinates.len()));
        for node in &mut self.nodes {
            *node = NodeRecord::default();
        }
        self.child_nodes.clear();
        self.interface_nodes.clear();
        self.active_geometry = 0;
        Ok(())
    }

    /// Allocates one unvisited record per background node.
    pub fn initialize_geometry_objects_for_background_mesh_nodes(&mut self, num_nodes: usize) {
        self.nodes = vec![NodeRecord::default(); num_nodes];
        self.coordinates.clear();
        self.child_nodes.clear();
        self.interface_nodes.clear();
        self.active_geometry = 0;
    }

    /// Evaluates every geometry at every background node.
    ///
    /// # Errors
    ///
    /// Fails if the number of coordinates does not match the number of allocated records.
    pub fn initialize_geometry_object_phase_values(&mut self, node_coordinates: &[DVector<T>]) -> eyre::Result<()> {
        if node_coordinates.len() != self.nodes.len() {
            return Err(eyre!(
                "Expected coordinates for {} background nodes, got {}.",
                self.nodes.len(),
                node_coordinates.len()
            ));
        }
        for (node_index, (node, x)) in self.nodes.iter_mut().zip(node_coordinates).enumerate() {
            node.phase_values = self
                .fields
                .iter()
                .map(|field| field.value(node_index, x))
                .collect();
            node.state = NodeState::PhaseEvaluated;
        }
        self.coordinates = node_coordinates.to_vec();
        debug!(
            "Geometry engine: evaluated {} geometries at {} nodes",
            self.fields.len(),
            self.nodes.len()
        );
        Ok(())
    }

    /// Convenience wrapper that allocates and evaluates all vertices of a background mesh.
    pub fn initialize_from_mesh(&mut self, mesh: &impl BackgroundMesh<T>) -> eyre::Result<()> {
        let coordinates: Vec<_> = (0..mesh.num_vertices())
            .map(|i| mesh.vertex_coordinates(i))
            .collect();
        self.initialize_geometry_objects_for_background_mesh_nodes(coordinates.len());
        self.initialize_geometry_object_phase_values(&coordinates)
    }

    fn active_phase_value(&self, node_index: usize) -> eyre::Result<T> {
        let node = self
            .nodes
            .get(node_index)
            .ok_or_else(|| eyre!("Node {} does not exist.", node_index))?;
        if node.state == NodeState::Unvisited {
            return Err(eyre!("Phase values of node {} have not been evaluated.", node_index));
        }
        Ok(node.phase_values[self.active_geometry])
    }

    /// Finds the edges whose endpoint values lie on different sides of the threshold for the
    /// active geometry.
    ///
    /// Endpoints of intersected edges become interface nodes, all other evaluated nodes become
    /// interior nodes.
    pub fn is_intersected(
        &mut self,
        node_coordinates: &[DVector<T>],
        edges: &[[usize; 2]],
        check: IntersectionCheck,
    ) -> eyre::Result<Vec<EdgeIntersection<T>>> {
        let mut intersections = Vec::new();
        for (edge_index, &[a, b]) in edges.iter().enumerate() {
            let (phi_a, phi_b) = (self.active_phase_value(a)?, self.active_phase_value(b)?);
            let below_a = phi_a < self.threshold;
            let below_b = phi_b < self.threshold;
            if below_a == below_b {
                continue;
            }

            let (local_coordinate, global_coordinates) = match check {
                IntersectionCheck::SignOnly => (None, None),
                IntersectionCheck::Full => {
                    let (x_a, x_b) = (
                        node_coordinates
                            .get(a)
                            .ok_or_else(|| eyre!("No coordinates for node {}.", a))?,
                        node_coordinates
                            .get(b)
                            .ok_or_else(|| eyre!("No coordinates for node {}.", b))?,
                    );
                    let t = intersection_local_coordinate(phi_a, phi_b, self.threshold);
                    (Some(t), Some(intersection_global_coordinate(x_a, x_b, t)))
                }
            };
            intersections.push(EdgeIntersection {
                edge_index,
                vertices: [a, b],
                local_coordinate,
                global_coordinates,
            });
        }

        for node in &mut self.nodes {
            if node.state != NodeState::Unvisited {
                node.state = NodeState::Interior;
            }
        }
        for intersection in &intersections {
            for &vertex in &intersection.vertices {
                self.nodes[vertex].state = NodeState::Interface;
            }
        }
        debug!(
            "Geometry engine: geometry {} intersects {} of {} edges",
            self.active_geometry,
            intersections.len(),
            edges.len()
        );
        Ok(intersections)
    }

    /// Registers new child nodes and evaluates all geometries at them.
    ///
    /// Fields that interpolate child nodes take their values from the ancestors, all other
    /// fields are evaluated at the global coordinates.
    ///
    /// # Errors
    ///
    /// Fails if the argument lists differ in length, a node index is already taken or not the
    /// next free index, an ancestor has no phase values, or a parent cell type is unsupported.
    pub fn create_new_child_nodes(
        &mut self,
        new_node_indices: &[usize],
        parent_cells: &[Vec<usize>],
        local_coordinates: &[DVector<T>],
        global_coordinates: &[DVector<T>],
    ) -> eyre::Result<()> {
        let n = new_node_indices.len();
        if parent_cells.len() != n || local_coordinates.len() != n || global_coordinates.len() != n {
            return Err(eyre!("Child node arguments must all have {} entries.", n));
        }
        for i in 0..n {
            let child = ChildNode::new(parent_cells[i].clone(), local_coordinates[i].clone())?;
            self.insert_child_node(new_node_indices[i], child, global_coordinates[i].clone(), None)?;
        }
        Ok(())
    }

    fn insert_child_node(
        &mut self,
        node_index: usize,
        child: ChildNode<T>,
        x: DVector<T>,
        interface_geometry: Option<usize>,
    ) -> eyre::Result<()> {
        if node_index != self.nodes.len() {
            return Err(eyre!(
                "Child node index {} must be the next free node index {}.",
                node_index,
                self.nodes.len()
            ));
        }
        for &ancestor in child.ancestors() {
            if self.nodes.get(ancestor).map(|node| node.state).unwrap_or_default() == NodeState::Unvisited {
                return Err(eyre!("Ancestor {} of child node {} has no phase values.", ancestor, node_index));
            }
        }

        let phase_values = (0..self.fields.len())
            .map(|g| {
                if interface_geometry == Some(g) {
                    self.threshold
                } else if self.fields[g].interpolate_child_nodes() {
                    let ancestor_values: Vec<T> = child
                        .ancestors()
                        .iter()
                        .map(|&a| self.nodes[a].phase_values[g])
                        .collect();
                    child.interpolate_field_value(&ancestor_values)
                } else {
                    self.fields[g].value(node_index, &x)
                }
            })
            .collect();
        self.nodes.push(NodeRecord {
            state: NodeState::PhaseEvaluated,
            phase_values,
        });
        if self.coordinates.len() < node_index {
            self.coordinates.resize(node_index, DVector::zeros(x.len()));
        }
        self.coordinates.push(x);
        self.child_nodes.insert(node_index, child);
        Ok(())
    }

    /// Creates one interface node per intersection computed with [`IntersectionCheck::Full`],
    /// numbered consecutively from the next free node index. Returns the new node indices.
    pub fn create_interface_nodes(&mut self, intersections: &[EdgeIntersection<T>]) -> eyre::Result<Vec<usize>> {
        let mut new_indices = Vec::with_capacity(intersections.len());
        for intersection in intersections {
            let (t, x) = match (&intersection.local_coordinate, &intersection.global_coordinates) {
                (Some(t), Some(x)) => (*t, x.clone()),
                _ => {
                    return Err(eyre!(
                        "Intersection of edge {} lacks coordinates. Use a full intersection check.",
                        intersection.edge_index
                    ))
                }
            };
            let [a, b] = intersection.vertices;
            let node_index = self.nodes.len();
            self.insert_child_node(node_index, ChildNode::on_edge(a, b, t), x.clone(), Some(self.active_geometry))?;
            self.nodes[node_index].state = NodeState::Interface;
            self.interface_nodes.push(InterfaceNode {
                node_index,
                geometry_index: self.active_geometry,
                parents: [a, b],
                local_coordinate: t,
                global_coordinates: x,
                dx_dp: None,
                adv_ids: Vec::new(),
            });
            new_indices.push(node_index);
        }
        debug!("Geometry engine: created {} interface nodes", new_indices.len());
        Ok(new_indices)
    }

    /// Value of the given geometry at a node. Child nodes of interpolating fields use their
    /// ancestors.
    pub fn field_value(&self, geometry_index: usize, node_index: usize, coordinates: &DVector<T>) -> T {
        let field = &self.fields[geometry_index];
        match self.child_nodes.get(&node_index) {
            Some(child) if field.interpolate_child_nodes() => {
                let values: Vec<T> = child
                    .ancestors()
                    .iter()
                    .map(|&a| self.field_value(geometry_index, a, &self.coordinates[a]))
                    .collect();
                child.interpolate_field_value(&values)
            }
            _ => field.value(node_index, coordinates),
        }
    }

    /// Value of the active geometry at a node.
    pub fn get_field_value(&self, node_index: usize, coordinates: &DVector<T>) -> T {
        self.field_value(self.active_geometry, node_index, coordinates)
    }

    fn field_sensitivities(&self, geometry_index: usize, node_index: usize, coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>> {
        let field = &self.fields[geometry_index];
        match self.child_nodes.get(&node_index) {
            Some(child) if field.interpolate_child_nodes() => {
                let ancestor_sensitivities = child
                    .ancestors()
                    .iter()
                    .map(|&a| self.field_sensitivities(geometry_index, a, &self.coordinates[a]))
                    .collect::<eyre::Result<Vec<_>>>()?;
                Ok(child.join_field_sensitivities(&ancestor_sensitivities))
            }
            _ => field.sensitivities(node_index, coordinates),
        }
    }

    fn determining_adv_ids(&self, geometry_index: usize, node_index: usize, coordinates: &DVector<T>) -> Vec<usize> {
        let field = &self.fields[geometry_index];
        match self.child_nodes.get(&node_index) {
            Some(child) if field.interpolate_child_nodes() => {
                let ancestor_ids: Vec<_> = child
                    .ancestors()
                    .iter()
                    .map(|&a| self.determining_adv_ids(geometry_index, a, &self.coordinates[a]))
                    .collect();
                child.join_determining_adv_ids(&ancestor_ids)
            }
            _ => field.determining_adv_ids(node_index, coordinates),
        }
    }

    /// Sensitivities of the active geometry at a node, `1 x n`.
    ///
    /// # Errors
    ///
    /// Fails for fields without sensitivities.
    pub fn get_field_sensitivities(&self, node_index: usize, coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>> {
        self.field_sensitivities(self.active_geometry, node_index, coordinates)
    }

    /// ADV ids matching the columns of [`get_field_sensitivities`](Self::get_field_sensitivities).
    pub fn get_determining_adv_ids(&self, node_index: usize, coordinates: &DVector<T>) -> Vec<usize> {
        self.determining_adv_ids(self.active_geometry, node_index, coordinates)
    }

    /// Computes `dx/dp` for every interface node from the sensitivities of its parent nodes.
    ///
    /// # Errors
    ///
    /// Fails if a parent field has no sensitivities.
    pub fn compute_interface_sensitivity(&mut self) -> eyre::Result<()> {
        let mut results = Vec::with_capacity(self.interface_nodes.len());
        for interface_node in &self.interface_nodes {
            let g = interface_node.geometry_index;
            let [a, b] = interface_node.parents;
            let (x_a, x_b) = (&self.coordinates[a], &self.coordinates[b]);
            let phi = [self.field_value(g, a, x_a), self.field_value(g, b, x_b)];
            let dphi_a = self.field_sensitivities(g, a, x_a)?;
            let dphi_b = self.field_sensitivities(g, b, x_b)?;
            let dx_dp = compute_dx_dp_with_linear_basis(phi, [x_a, x_b], [&dphi_a, &dphi_b], self.threshold);
            let mut adv_ids = self.determining_adv_ids(g, a, x_a);
            adv_ids.extend(self.determining_adv_ids(g, b, x_b));
            results.push((dx_dp, adv_ids));
        }
        for (interface_node, (dx_dp, adv_ids)) in self.interface_nodes.iter_mut().zip(results) {
            interface_node.dx_dp = Some(dx_dp);
            interface_node.adv_ids = adv_ids;
        }
        debug!(
            "Geometry engine: computed sensitivities of {} interface nodes",
            self.interface_nodes.len()
        );
        Ok(())
    }

    /// Bit-encoded phase of a node: bit `g` is set if the node lies on or above the threshold of
    /// geometry `g`.
    ///
    /// # Panics
    ///
    /// Panics if the node has not been evaluated.
    pub fn phase_index(&self, node_index: usize) -> usize {
        let node = &self.nodes[node_index];
        assert!(
            node.state != NodeState::Unvisited,
            "Phase values of node {} have not been evaluated.",
            node_index
        );
        node.phase_values
            .iter()
            .enumerate()
            .filter(|(_, &phi)| phi >= self.threshold)
            .fold(0, |index, (g, _)| index | (1 << g))
    }
}
