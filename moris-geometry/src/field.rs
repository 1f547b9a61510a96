//! Level-set fields whose parameters may be abstract design variables (ADVs).
use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A field parameter that is either fixed or taken from the global ADV vector.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldParameter<T> {
    Constant(T),
    Adv(usize),
}

/// Parameters of a field together with their current values.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet<T> {
    parameters: Vec<FieldParameter<T>>,
    values: Vec<T>,
}

impl<T: Real> ParameterSet<T> {
    /// Creates the set. ADV-mapped parameters are zero until ADVs are imported.
    pub fn new(parameters: Vec<FieldParameter<T>>) -> Self {
        let values = parameters
            .iter()
            .map(|parameter| match parameter {
                FieldParameter::Constant(value) => *value,
                FieldParameter::Adv(_) => T::zero(),
            })
            .collect();
        Self { parameters, values }
    }

    pub fn from_constants(values: &[T]) -> Self {
        Self::new(values.iter().copied().map(FieldParameter::Constant).collect())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameters(&self) -> &[FieldParameter<T>] {
        &self.parameters
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Reads the values of ADV-mapped parameters from the global ADV vector.
    ///
    /// # Errors
    ///
    /// Fails if a parameter refers to an ADV outside of `advs`.
    pub fn import_advs(&mut self, advs: &DVector<T>) -> eyre::Result<()> {
        for (parameter, value) in self.parameters.iter().zip(&mut self.values) {
            if let &FieldParameter::Adv(id) = parameter {
                *value = *advs.get(id).ok_or_else(|| {
                    eyre!("Field parameter refers to ADV {}, but only {} ADVs exist.", id, advs.len())
                })?;
            }
        }
        Ok(())
    }

    /// Global ids of the ADV-mapped parameters, in parameter order.
    pub fn adv_ids(&self) -> Vec<usize> {
        self.parameters
            .iter()
            .filter_map(|parameter| match parameter {
                FieldParameter::Adv(id) => Some(*id),
                FieldParameter::Constant(_) => None,
            })
            .collect()
    }

    /// Restricts a derivative with respect to all parameters to the ADV-mapped ones, as a row.
    pub fn select_adv_derivatives(&self, d_field_d_parameters: &[T]) -> DMatrix<T> {
        assert_eq!(d_field_d_parameters.len(), self.len());
        let selected: Vec<T> = self
            .parameters
            .iter()
            .zip(d_field_d_parameters)
            .filter(|(parameter, _)| matches!(parameter, FieldParameter::Adv(_)))
            .map(|(_, &derivative)| derivative)
            .collect();
        DMatrix::from_row_slice(1, selected.len(), &selected)
    }
}

/// An implicit geometry described by the zero (threshold) level set of a scalar field.
pub trait LevelSetField<T: Real>: Debug + Send + Sync {
    fn value(&self, node_index: usize, coordinates: &DVector<T>) -> T;

    /// Derivative of the field value with respect to its determining ADVs, as a `1 x n` row.
    ///
    /// # Errors
    ///
    /// Fails with a "not implemented" error for fields without a derivative.
    fn sensitivities(&self, node_index: usize, coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>>;

    /// Global ids of the ADVs the value at the given node depends on, matching the columns of
    /// [`sensitivities`](Self::sensitivities).
    fn determining_adv_ids(&self, node_index: usize, coordinates: &DVector<T>) -> Vec<usize>;

    fn import_advs(&mut self, advs: &DVector<T>) -> eyre::Result<()>;

    /// Whether values at child nodes are interpolated from their ancestors instead of evaluated.
    fn interpolate_child_nodes(&self) -> bool {
        false
    }
}

fn check_dimension<T: Real>(name: &str, expected: usize, coordinates: &DVector<T>) {
    assert_eq!(
        coordinates.len(),
        expected,
        "{} expects {}-dimensional coordinates.",
        name,
        expected
    );
}

/// Signed distance to a circle, `|x - c| - r`. Parameters are `[c_x, c_y, r]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle<T> {
    parameters: ParameterSet<T>,
}

impl<T: Real> Circle<T> {
    pub fn new(center: [FieldParameter<T>; 2], radius: FieldParameter<T>) -> Self {
        Self {
            parameters: ParameterSet::new(vec![center[0], center[1], radius]),
        }
    }

    pub fn from_constants(center: [T; 2], radius: T) -> Self {
        Self {
            parameters: ParameterSet::from_constants(&[center[0], center[1], radius]),
        }
    }

    pub fn parameters(&self) -> &ParameterSet<T> {
        &self.parameters
    }
}

/// Signed distance to a sphere, `|x - c| - r`. Parameters are `[c_x, c_y, c_z, r]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere<T> {
    parameters: ParameterSet<T>,
}

impl<T: Real> Sphere<T> {
    pub fn new(center: [FieldParameter<T>; 3], radius: FieldParameter<T>) -> Self {
        Self {
            parameters: ParameterSet::new(vec![center[0], center[1], center[2], radius]),
        }
    }

    pub fn from_constants(center: [T; 3], radius: T) -> Self {
        Self {
            parameters: ParameterSet::from_constants(&[center[0], center[1], center[2], radius]),
        }
    }

    pub fn parameters(&self) -> &ParameterSet<T> {
        &self.parameters
    }
}

/// Value and parameter derivatives of `|x - c| - r` with parameters `[c, r]`.
fn radial_distance<T: Real>(name: &str, parameters: &[T], x: &DVector<T>) -> (T, Option<Vec<T>>) {
    let dim = parameters.len() - 1;
    check_dimension(name, dim, x);
    let center = DVector::from_column_slice(&parameters[..dim]);
    let radius = parameters[dim];
    let offset = x - center;
    let distance = offset.norm();

    let derivatives = if distance == T::zero() {
        None
    } else {
        let mut d = Vec::with_capacity(dim + 1);
        d.extend(offset.iter().map(|&o| -o / distance));
        d.push(-T::one());
        Some(d)
    };
    (distance - radius, derivatives)
}

macro_rules! impl_radial_field {
    ($field:ident) => {
        impl<T: Real> LevelSetField<T> for $field<T> {
            fn value(&self, _node_index: usize, coordinates: &DVector<T>) -> T {
                radial_distance(stringify!($field), self.parameters.values(), coordinates).0
            }

            fn sensitivities(&self, _node_index: usize, coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>> {
                let (_, derivatives) = radial_distance(stringify!($field), self.parameters.values(), coordinates);
                let derivatives = derivatives.ok_or_else(|| {
                    eyre!(
                        "{}: sensitivities are undefined at the center.",
                        stringify!($field)
                    )
                })?;
                Ok(self.parameters.select_adv_derivatives(&derivatives))
            }

            fn determining_adv_ids(&self, _node_index: usize, _coordinates: &DVector<T>) -> Vec<usize> {
                self.parameters.adv_ids()
            }

            fn import_advs(&mut self, advs: &DVector<T>) -> eyre::Result<()> {
                self.parameters.import_advs(advs)
            }
        }
    };
}

impl_radial_field!(Circle);
impl_radial_field!(Sphere);

/// Signed distance to a plane, `(x - p) · n`. Parameters are `[p, n]`.
///
/// The normal is used as given, so the value is a true distance only for unit normals.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    space_dim: usize,
    parameters: ParameterSet<T>,
}

impl<T: Real> Plane<T> {
    /// # Panics
    ///
    /// Panics if point and normal have different or unsupported dimensions.
    pub fn new(point: Vec<FieldParameter<T>>, normal: Vec<FieldParameter<T>>) -> Self {
        let space_dim = point.len();
        assert_eq!(normal.len(), space_dim, "Plane point and normal must have the same dimension.");
        assert!((2..=3).contains(&space_dim), "Planes are only supported in 2D and 3D.");
        let mut parameters = point;
        parameters.extend(normal);
        Self {
            space_dim,
            parameters: ParameterSet::new(parameters),
        }
    }

    pub fn from_constants(point: &[T], normal: &[T]) -> Self {
        let constant = |values: &[T]| values.iter().copied().map(FieldParameter::Constant).collect();
        Self::new(constant(point), constant(normal))
    }

    pub fn parameters(&self) -> &ParameterSet<T> {
        &self.parameters
    }
}

impl<T: Real> LevelSetField<T> for Plane<T> {
    fn value(&self, _node_index: usize, coordinates: &DVector<T>) -> T {
        check_dimension("Plane", self.space_dim, coordinates);
        let (point, normal) = self.parameters.values().split_at(self.space_dim);
        (0..self.space_dim).fold(T::zero(), |acc, i| acc + (coordinates[i] - point[i]) * normal[i])
    }

    fn sensitivities(&self, _node_index: usize, coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>> {
        check_dimension("Plane", self.space_dim, coordinates);
        let (point, normal) = self.parameters.values().split_at(self.space_dim);
        let mut derivatives: Vec<T> = normal.iter().map(|&n_i| -n_i).collect();
        derivatives.extend((0..self.space_dim).map(|i| coordinates[i] - point[i]));
        Ok(self.parameters.select_adv_derivatives(&derivatives))
    }

    fn determining_adv_ids(&self, _node_index: usize, _coordinates: &DVector<T>) -> Vec<usize> {
        self.parameters.adv_ids()
    }

    fn import_advs(&mut self, advs: &DVector<T>) -> eyre::Result<()> {
        self.parameters.import_advs(advs)
    }
}

/// A field with one parameter per background node, typically one ADV per node.
///
/// Values at child nodes are interpolated from the ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalField<T> {
    parameters: ParameterSet<T>,
}

impl<T: Real> NodalField<T> {
    pub fn new(node_parameters: Vec<FieldParameter<T>>) -> Self {
        Self {
            parameters: ParameterSet::new(node_parameters),
        }
    }

    /// Maps background node `i` to ADV `first_adv + i`.
    pub fn with_consecutive_advs(num_nodes: usize, first_adv: usize) -> Self {
        Self::new((0..num_nodes).map(|i| FieldParameter::Adv(first_adv + i)).collect())
    }

    pub fn num_nodes(&self) -> usize {
        self.parameters.len()
    }

    fn check_node(&self, node_index: usize) {
        assert!(
            node_index < self.num_nodes(),
            "NodalField has no value for node {} (only {} background nodes).",
            node_index,
            self.num_nodes()
        );
    }
}

impl<T: Real> LevelSetField<T> for NodalField<T> {
    fn value(&self, node_index: usize, _coordinates: &DVector<T>) -> T {
        self.check_node(node_index);
        self.parameters.values()[node_index]
    }

    fn sensitivities(&self, node_index: usize, _coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>> {
        self.check_node(node_index);
        match self.parameters.parameters()[node_index] {
            FieldParameter::Adv(_) => Ok(DMatrix::from_element(1, 1, T::one())),
            FieldParameter::Constant(_) => Ok(DMatrix::zeros(1, 0)),
        }
    }

    fn determining_adv_ids(&self, node_index: usize, _coordinates: &DVector<T>) -> Vec<usize> {
        self.check_node(node_index);
        match self.parameters.parameters()[node_index] {
            FieldParameter::Adv(id) => vec![id],
            FieldParameter::Constant(_) => Vec::new(),
        }
    }

    fn import_advs(&mut self, advs: &DVector<T>) -> eyre::Result<()> {
        self.parameters.import_advs(advs)
    }

    fn interpolate_child_nodes(&self) -> bool {
        true
    }
}

/// Indicator of a set of voxels on a regular grid: `-1` inside a filled voxel, `1` elsewhere.
///
/// The field is piecewise constant and has no design sensitivities.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelField<T> {
    origin: DVector<T>,
    voxel_size: T,
    shape: Vec<usize>,
    filled: Vec<bool>,
}

impl<T: Real> VoxelField<T> {
    /// Creates a voxel field. Voxels are stored with the first axis varying fastest.
    ///
    /// # Errors
    ///
    /// Fails if the shape does not match the origin or the number of voxels.
    pub fn new(origin: DVector<T>, voxel_size: T, shape: Vec<usize>, filled: Vec<bool>) -> eyre::Result<Self> {
        if shape.len() != origin.len() {
            return Err(eyre!(
                "VoxelField: shape has {} axes but the origin has {} coordinates.",
                shape.len(),
                origin.len()
            ));
        }
        let num_voxels: usize = shape.iter().product();
        if num_voxels != filled.len() {
            return Err(eyre!("VoxelField: expected {} voxels, got {}.", num_voxels, filled.len()));
        }
        if voxel_size <= T::zero() {
            return Err(eyre!("VoxelField: voxel size must be positive."));
        }
        Ok(Self {
            origin,
            voxel_size,
            shape,
            filled,
        })
    }

    fn voxel_index(&self, coordinates: &DVector<T>) -> Option<usize> {
        check_dimension("VoxelField", self.origin.len(), coordinates);
        let mut index = 0;
        let mut stride = 1;
        for (axis, &extent) in self.shape.iter().enumerate() {
            let local = ((coordinates[axis] - self.origin[axis]) / self.voxel_size).floor();
            if local < T::zero() {
                return None;
            }
            let local = nalgebra::try_convert::<T, f64>(local)? as usize;
            if local >= extent {
                return None;
            }
            index += local * stride;
            stride *= extent;
        }
        Some(index)
    }
}

impl<T: Real> LevelSetField<T> for VoxelField<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn value(&self, _node_index: usize, coordinates: &DVector<T>) -> T {
        match self.voxel_index(coordinates) {
            Some(index) if self.filled[index] => -1.0,
            _ => 1.0,
        }
    }

    fn sensitivities(&self, _node_index: usize, _coordinates: &DVector<T>) -> eyre::Result<DMatrix<T>> {
        Err(eyre!("VoxelField: sensitivities are not implemented for a non-differentiable field."))
    }

    fn determining_adv_ids(&self, _node_index: usize, _coordinates: &DVector<T>) -> Vec<usize> {
        Vec::new()
    }

    fn import_advs(&mut self, _advs: &DVector<T>) -> eyre::Result<()> {
        Ok(())
    }
}

/// Declarative description of a level-set field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldParameters<T> {
    Circle {
        center: [FieldParameter<T>; 2],
        radius: FieldParameter<T>,
    },
    Sphere {
        center: [FieldParameter<T>; 3],
        radius: FieldParameter<T>,
    },
    Plane {
        point: Vec<FieldParameter<T>>,
        normal: Vec<FieldParameter<T>>,
    },
    Nodal {
        nodes: Vec<FieldParameter<T>>,
    },
    Voxel {
        origin: Vec<T>,
        voxel_size: T,
        shape: Vec<usize>,
        filled: Vec<bool>,
    },
}

/// Builds the field described by `parameters`.
///
/// # Errors
///
/// Fails for plane and voxel descriptions with inconsistent dimensions.
pub fn build_field<T: Real>(parameters: &FieldParameters<T>) -> eyre::Result<Box<dyn LevelSetField<T>>> {
    let field: Box<dyn LevelSetField<T>> = match parameters {
        FieldParameters::Circle { center, radius } => Box::new(Circle::new(*center, *radius)),
        FieldParameters::Sphere { center, radius } => Box::new(Sphere::new(*center, *radius)),
        FieldParameters::Plane { point, normal } => {
            if point.len() != normal.len() || !(2..=3).contains(&point.len()) {
                return Err(eyre!(
                    "Plane: point ({}) and normal ({}) must both be 2D or 3D.",
                    point.len(),
                    normal.len()
                ));
            }
            Box::new(Plane::new(point.clone(), normal.clone()))
        }
        FieldParameters::Nodal { nodes } => Box::new(NodalField::new(nodes.clone())),
        FieldParameters::Voxel {
            origin,
            voxel_size,
            shape,
            filled,
        } => Box::new(VoxelField::new(
            DVector::from_column_slice(origin),
            *voxel_size,
            shape.clone(),
            filled.clone(),
        )?),
    };
    Ok(field)
}
