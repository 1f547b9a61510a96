//! Degree-of-freedom types and the binding of symbolic role names to them.
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// Symbolic tag identifying a physical unknown field.
///
/// Vector-valued fields are identified by the first component of their group: `UX` stands for the
/// displacement group `{UX, UY[, UZ]}` and `VX` for the velocity group `{VX, VY[, VZ]}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DofType {
    UX,
    UY,
    UZ,
    P,
    TEMP,
    VX,
    VY,
    VZ,
    RHO,
}

impl DofType {
    pub fn from_name(name: &str) -> eyre::Result<Self> {
        match name {
            "UX" => Ok(Self::UX),
            "UY" => Ok(Self::UY),
            "UZ" => Ok(Self::UZ),
            "P" => Ok(Self::P),
            "TEMP" => Ok(Self::TEMP),
            "VX" => Ok(Self::VX),
            "VY" => Ok(Self::VY),
            "VZ" => Ok(Self::VZ),
            "RHO" => Ok(Self::RHO),
            _ => Err(eyre!("Unknown dof type \"{}\".", name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UX => "UX",
            Self::UY => "UY",
            Self::UZ => "UZ",
            Self::P => "P",
            Self::TEMP => "TEMP",
            Self::VX => "VX",
            Self::VY => "VY",
            Self::VZ => "VZ",
            Self::RHO => "RHO",
        }
    }
}

impl Display for DofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Binds a model's symbolic dof role names (e.g. `"Displacement"`) to concrete dof types.
///
/// The role names are fixed per model; binding an unknown role is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofRoles {
    component: &'static str,
    names: &'static [&'static str],
    bound: Vec<Option<DofType>>,
}

impl DofRoles {
    pub fn new(component: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            component,
            names,
            bound: vec![None; names.len()],
        }
    }

    /// Binds every dof type to the role with the same position in `role_names`.
    ///
    /// # Errors
    ///
    /// Fails if the lists have different lengths or a role name is not known to the model.
    pub fn set(&mut self, dof_types: &[DofType], role_names: &[&str]) -> eyre::Result<()> {
        if dof_types.len() != role_names.len() {
            return Err(eyre!(
                "{}: got {} dof types but {} role names.",
                self.component,
                dof_types.len(),
                role_names.len()
            ));
        }

        for (&dof_type, &role_name) in dof_types.iter().zip(role_names) {
            let slot = self
                .names
                .iter()
                .position(|&name| name == role_name)
                .ok_or_else(|| {
                    eyre!(
                        "{}: unknown dof role \"{}\" (known roles: {}).",
                        self.component,
                        role_name,
                        self.names.join(", ")
                    )
                })?;
            self.bound[slot] = Some(dof_type);
        }
        Ok(())
    }

    /// Returns the dof type bound to the role with the given slot index.
    pub fn get(&self, slot: usize) -> Option<DofType> {
        self.bound[slot]
    }

    /// All bound dof types, in role order.
    pub fn dof_types(&self) -> Vec<DofType> {
        self.bound.iter().flatten().copied().collect()
    }
}
