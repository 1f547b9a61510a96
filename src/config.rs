//! Declarative description of constitutive models.
//!
//! Parameters are plain serde structs, so a model can be described in any serde format and built
//! with [`build_constitutive_model`]. Properties given here are constant; dof-dependent properties
//! must be bound programmatically.
use crate::constitutive::{
    ConstitutiveModel, LinearIsotropic, ModelType, MoriTanaka, TensorType, VanDerWaalsFluid,
};
use crate::dof::DofType;
use crate::property::ConstantProperty;
use eyre::eyre;
use log::debug;
use moris_traits::Real;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstitutiveModelKind {
    LinearIsotropic,
    MoriTanaka,
    VanDerWaals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofBinding {
    pub role: String,
    pub dof: DofType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyBinding {
    pub name: String,
    pub value: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutiveModelParameters {
    pub kind: ConstitutiveModelKind,
    pub space_dim: usize,
    pub model_type: ModelType,
    #[serde(default)]
    pub tensor_type: TensorType,
    pub dofs: Vec<DofBinding>,
    #[serde(default)]
    pub properties: Vec<PropertyBinding>,
}

impl ConstitutiveModelParameters {
    pub fn new(kind: ConstitutiveModelKind, space_dim: usize, model_type: ModelType) -> Self {
        Self {
            kind,
            space_dim,
            model_type,
            tensor_type: TensorType::Full,
            dofs: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_tensor_type(mut self, tensor_type: TensorType) -> Self {
        self.tensor_type = tensor_type;
        self
    }

    pub fn with_dof(mut self, role: &str, dof: DofType) -> Self {
        self.dofs.push(DofBinding {
            role: role.to_string(),
            dof,
        });
        self
    }

    pub fn with_property(mut self, name: &str, value: &[f64]) -> Self {
        self.properties.push(PropertyBinding {
            name: name.to_string(),
            value: value.to_vec(),
        });
        self
    }
}

/// Builds and fully configures a constitutive model.
///
/// # Errors
///
/// Fails with a message naming the offending value if a dof role or property name is unknown, a
/// property value is empty or not representable in `T`, the variant is unsupported, or a required
/// property is missing.
pub fn build_constitutive_model<T: Real>(
    params: &ConstitutiveModelParameters,
) -> eyre::Result<Box<dyn ConstitutiveModel<T>>> {
    let mut model: Box<dyn ConstitutiveModel<T>> = match params.kind {
        ConstitutiveModelKind::LinearIsotropic => Box::new(LinearIsotropic::<T>::default()),
        ConstitutiveModelKind::MoriTanaka => Box::new(MoriTanaka::<T>::default()),
        ConstitutiveModelKind::VanDerWaals => Box::new(VanDerWaalsFluid::<T>::new()),
    };

    let dof_types: Vec<DofType> = params.dofs.iter().map(|binding| binding.dof).collect();
    let roles: Vec<&str> = params
        .dofs
        .iter()
        .map(|binding| binding.role.as_str())
        .collect();
    model.set_dof_type_list(&dof_types, &roles)?;

    for binding in &params.properties {
        if binding.value.is_empty() {
            return Err(eyre!("{}: property \"{}\" has no value.", model.name(), binding.name));
        }
        let values = binding
            .value
            .iter()
            .map(|&v| {
                T::from_f64(v).ok_or_else(|| {
                    eyre!(
                        "{}: value {} of property \"{}\" is not representable.",
                        model.name(),
                        v,
                        binding.name
                    )
                })
            })
            .collect::<eyre::Result<Vec<T>>>()?;
        model.set_property(Arc::new(ConstantProperty::from_slice(&values)), &binding.name)?;
    }

    model.select_model_variant(params.space_dim, params.model_type, params.tensor_type)?;
    model.set_local_properties()?;
    debug!(
        "Built {} with {} dof roles and {} properties",
        model.name(),
        params.dofs.len(),
        params.properties.len()
    );
    Ok(model)
}
