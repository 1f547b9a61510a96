use crate::engine::{GeometryEngine, IntersectionCheck};
use crate::intersection::scatter_adv_columns;
use eyre::eyre;
use log::debug;
use moris_optimize::criteria::{CriteriaError, CriteriaInterface};
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};

/// Exposes the coordinates of all interface nodes as optimization criteria.
///
/// Every call to [`get_criteria`](CriteriaInterface::get_criteria) imports the new ADVs into the
/// geometry engine and recomputes phase values, intersections and interface nodes on a fixed set of
/// background nodes and edges. The criteria vector stacks the global coordinates of the interface
/// nodes in creation order, and the gradient stacks their `dx/dp` scattered onto the ADVs.
#[derive(Debug)]
pub struct InterfaceCriteria<T: Real> {
    engine: GeometryEngine<T>,
    node_coordinates: Vec<DVector<T>>,
    edges: Vec<[usize; 2]>,
    initial_advs: DVector<T>,
    lower_bounds: DVector<T>,
    upper_bounds: DVector<T>,
    initialized: bool,
    evaluated: bool,
}

impl<T: Real> InterfaceCriteria<T> {
    pub fn new(
        engine: GeometryEngine<T>,
        node_coordinates: Vec<DVector<T>>,
        edges: Vec<[usize; 2]>,
        initial_advs: DVector<T>,
    ) -> Self {
        let n = initial_advs.len();
        let unbounded = T::max_value().unwrap_or_else(|| T::one() / T::default_epsilon());
        Self {
            engine,
            node_coordinates,
            edges,
            initial_advs,
            lower_bounds: DVector::from_element(n, -unbounded),
            upper_bounds: DVector::from_element(n, unbounded),
            initialized: false,
            evaluated: false,
        }
    }

    pub fn with_bounds(mut self, lower_bounds: DVector<T>, upper_bounds: DVector<T>) -> Self {
        assert_eq!(lower_bounds.len(), self.initial_advs.len());
        assert_eq!(upper_bounds.len(), self.initial_advs.len());
        self.lower_bounds = lower_bounds;
        self.upper_bounds = upper_bounds;
        self
    }

    pub fn engine(&self) -> &GeometryEngine<T> {
        &self.engine
    }

    pub fn num_advs(&self) -> usize {
        self.initial_advs.len()
    }

    fn check_advs(&self, advs: &DVector<T>) -> Result<(), CriteriaError> {
        if !self.initialized {
            return Err(CriteriaError::NotInitialized);
        }
        if advs.len() != self.num_advs() {
            return Err(CriteriaError::DimensionMismatch {
                expected: self.num_advs(),
                actual: advs.len(),
            });
        }
        let violation = advs
            .iter()
            .zip(self.lower_bounds.iter().zip(self.upper_bounds.iter()))
            .position(|(&p, (&lower, &upper))| p < lower || p > upper);
        match violation {
            Some(index) => Err(CriteriaError::BoundViolation { index }),
            None => Ok(()),
        }
    }

    fn run_engine(&mut self, advs: &DVector<T>) -> eyre::Result<DVector<T>> {
        let engine = &mut self.engine;
        engine.import_advs(advs)?;
        engine.initialize_geometry_objects_for_background_mesh_nodes(self.node_coordinates.len());
        engine.initialize_geometry_object_phase_values(&self.node_coordinates)?;
        loop {
            let intersections = engine.is_intersected(&self.node_coordinates, &self.edges, IntersectionCheck::Full)?;
            engine.create_interface_nodes(&intersections)?;
            if !engine.advance_geometry_index() {
                break;
            }
        }
        engine.compute_interface_sensitivity()?;

        let coordinates: Vec<T> = engine
            .interface_nodes()
            .iter()
            .flat_map(|node| node.global_coordinates.iter().copied())
            .collect();
        Ok(DVector::from_vec(coordinates))
    }

    fn stacked_sensitivities(&self) -> eyre::Result<DMatrix<T>> {
        let interface_nodes = self.engine.interface_nodes();
        let num_rows = interface_nodes
            .iter()
            .map(|node| node.global_coordinates.len())
            .sum();
        let mut gradient = DMatrix::zeros(num_rows, self.num_advs());
        let mut offset = 0;
        for node in interface_nodes {
            let dx_dp = node
                .dx_dp
                .as_ref()
                .ok_or_else(|| eyre!("Interface node {} has no sensitivities.", node.node_index))?;
            let dense = scatter_adv_columns(dx_dp, &node.adv_ids, self.num_advs());
            gradient
                .rows_mut(offset, dense.nrows())
                .copy_from(&dense);
            offset += dense.nrows();
        }
        Ok(gradient)
    }
}

impl<T: Real> CriteriaInterface<T> for InterfaceCriteria<T> {
    fn initialize(
        &mut self,
        advs: &mut DVector<T>,
        lower_bounds: &mut DVector<T>,
        upper_bounds: &mut DVector<T>,
    ) -> Result<(), CriteriaError> {
        *advs = self.initial_advs.clone();
        *lower_bounds = self.lower_bounds.clone();
        *upper_bounds = self.upper_bounds.clone();
        self.initialized = true;
        self.evaluated = false;
        Ok(())
    }

    fn get_criteria(&mut self, new_advs: &DVector<T>) -> Result<DVector<T>, CriteriaError> {
        self.check_advs(new_advs)?;
        self.evaluated = false;
        let criteria = self
            .run_engine(new_advs)
            .map_err(|err| CriteriaError::Evaluation(err.into()))?;
        debug!("Interface criteria: {} interface nodes", self.engine.interface_nodes().len());
        self.evaluated = true;
        Ok(criteria)
    }

    fn get_dcriteria_dadv(&mut self) -> Result<DMatrix<T>, CriteriaError> {
        if !self.initialized {
            return Err(CriteriaError::NotInitialized);
        }
        if !self.evaluated {
            return Err(CriteriaError::CriteriaNotEvaluated);
        }
        self.stacked_sensitivities()
            .map_err(|err| CriteriaError::Evaluation(err.into()))
    }
}
