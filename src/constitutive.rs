//! Constitutive models: maps from kinematic fields to fluxes and their exact derivatives.
//!
//! Every model caches its evaluated quantities. The first call to an accessor after
//! [`ConstitutiveModel::reset_eval_flags`] evaluates the quantity, subsequent calls return the
//! cached result until the next reset. Forgetting the reset yields results for the previous point.
use crate::dof::DofType;
use crate::field_interpolator::FieldInterpolatorManager;
use crate::property::Property;
use crate::voigt::VoigtLayout;
use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod isotropic;
mod mori_tanaka;
mod struc_linear;
mod van_der_waals;

pub use isotropic::*;
pub use mori_tanaka::*;
pub use struc_linear::*;
pub use van_der_waals::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    PlaneStress,
    PlaneStrain,
    Axisymmetric,
    Full,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TensorType {
    #[default]
    Full,
    Deviatoric,
}

/// Resolves the Voigt layout of a model variant.
///
/// Two-dimensional models must be plane stress, plane strain or axisymmetric, three-dimensional
/// models must be full.
pub fn voigt_layout(space_dim: usize, model_type: ModelType) -> eyre::Result<VoigtLayout> {
    match (space_dim, model_type) {
        (2, ModelType::PlaneStress) => Ok(VoigtLayout::PlaneStress),
        (2, ModelType::PlaneStrain) => Ok(VoigtLayout::PlaneStrain),
        (2, ModelType::Axisymmetric) => Ok(VoigtLayout::Axisymmetric),
        (3, ModelType::Full) => Ok(VoigtLayout::Full3d),
        _ => Err(eyre!(
            "Unsupported combination of space dimension {} and model type {:?}.",
            space_dim,
            model_type
        )),
    }
}

pub trait ConstitutiveModel<T: Real>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Binds dof types to the model's role names (e.g. `"Displacement"`).
    fn set_dof_type_list(&mut self, dof_types: &[DofType], role_names: &[&str]) -> eyre::Result<()>;

    /// Binds a property to one of the model's property names (e.g. `"YoungsModulus"`).
    fn set_property(&mut self, property: Arc<dyn Property<T>>, name: &str) -> eyre::Result<()>;

    /// Selects the evaluators for the given dimension and model variant. Must be called once
    /// before any evaluation.
    fn select_model_variant(
        &mut self,
        space_dim: usize,
        model_type: ModelType,
        tensor_type: TensorType,
    ) -> eyre::Result<()>;

    /// Checks that every property required by the selected variant has been bound.
    fn set_local_properties(&mut self) -> eyre::Result<()>;

    /// Marks every cached quantity stale. Must be called once per integration point.
    fn reset_eval_flags(&mut self);

    fn space_dim(&self) -> usize;

    /// The dof types bound to the model's roles.
    fn dof_types(&self) -> Vec<DofType>;

    /// The bound dof types together with the dof dependencies of all bound properties.
    fn global_dof_types(&self) -> Vec<DofType>;

    fn check_dof_dependency(&self, dof_type: DofType) -> bool {
        self.global_dof_types().contains(&dof_type)
    }

    fn flux(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T>;

    fn d_flux_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T>;

    fn strain(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T>;

    fn d_strain_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T>;

    /// Traction `flatten(n) * flux`. The normal is assumed fixed between two resets.
    fn traction(&mut self, normal: &DVector<T>, fis: &FieldInterpolatorManager<T>) -> &DVector<T>;

    fn d_traction_d_dof(
        &mut self,
        dof_type: DofType,
        normal: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T>;

    /// Traction of the test function of `test_dof_type`, as a `space_dim x num_coefficients`
    /// matrix.
    fn test_traction(
        &mut self,
        normal: &DVector<T>,
        test_dof_type: DofType,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T>;

    /// Derivative of `test_traction^T * jump` with respect to the coefficients of `dof_type`.
    fn d_test_traction_d_dof(
        &mut self,
        dof_type: DofType,
        normal: &DVector<T>,
        jump: &DVector<T>,
        test_dof_type: DofType,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T>;

    fn constitutive_matrix(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T>;

    fn clone_box(&self) -> Box<dyn ConstitutiveModel<T>>;
}

impl<T: Real> Clone for Box<dyn ConstitutiveModel<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Appends the property dependencies to the bound dofs, keeping the first occurrence only.
pub(crate) fn merge_dof_types(own: Vec<DofType>, dependencies: Vec<DofType>) -> Vec<DofType> {
    let mut merged = own;
    for dof in dependencies {
        if !merged.contains(&dof) {
            merged.push(dof);
        }
    }
    merged
}
