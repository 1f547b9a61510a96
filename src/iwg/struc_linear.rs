use crate::constitutive::{merge_dof_types, ConstitutiveModel};
use crate::dof::DofType;
use crate::iwg::{ElementSet, IntegrationPoint, Iwg, Side};
use crate::property::{Property, PropertyRegistry};
use moris_traits::Real;
use std::sync::Arc;

pub const LOAD: usize = 0;

pub const STRUC_LINEAR_BULK_PROPERTY_NAMES: &[&str] = &["Load"];

const NAME: &str = "StrucLinearBulk";

/// Bulk term of linear elasticity, `∫ Bᵀ σ - Nᵀ f`.
///
/// `B` is the strain derivative and `σ` the flux of the owned constitutive model. The Jacobian
/// has one column block per dof type the model (or the load) depends on.
#[derive(Clone)]
pub struct StrucLinearBulkIwg<T: Real> {
    displacement: DofType,
    model: Box<dyn ConstitutiveModel<T>>,
    properties: PropertyRegistry<T>,
}

impl<T: Real> std::fmt::Debug for StrucLinearBulkIwg<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrucLinearBulkIwg")
            .field("displacement", &self.displacement)
            .field("model", &self.model.name())
            .field("properties", &self.properties)
            .finish()
    }
}

impl<T: Real> StrucLinearBulkIwg<T> {
    /// Creates the IWG for a fully configured constitutive model.
    pub fn new(displacement: DofType, model: Box<dyn ConstitutiveModel<T>>) -> Self {
        Self {
            displacement,
            model,
            properties: PropertyRegistry::new(NAME, STRUC_LINEAR_BULK_PROPERTY_NAMES),
        }
    }

    pub fn set_property(&mut self, property: Arc<dyn Property<T>>, name: &str) -> eyre::Result<()> {
        self.properties.set(property, name)
    }

    pub fn model(&self) -> &dyn ConstitutiveModel<T> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn ConstitutiveModel<T> {
        self.model.as_mut()
    }
}

impl<T: Real> Iwg<T> for StrucLinearBulkIwg<T> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn residual_dof_types(&self) -> Vec<DofType> {
        vec![self.displacement]
    }

    fn requested_dof_types(&self) -> Vec<DofType> {
        let own = merge_dof_types(vec![self.displacement], self.model.global_dof_types());
        merge_dof_types(own, self.properties.dof_dependencies())
    }

    fn reset_eval_flags(&mut self) {
        self.model.reset_eval_flags();
    }

    fn compute_residual(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>) {
        let fis = point.leader;
        let flux = self.model.flux(fis).clone();
        let b = self.model.d_strain_d_dof(self.displacement, fis);
        let mut r = b.tr_mul(&flux);
        if let Some(load) = self.properties.get(LOAD) {
            let n = fis.field_interpolator(self.displacement).n();
            r -= n.tr_mul(&load.val(fis));
        }
        set.add_residual_block(Side::Leader, self.displacement, &(r * point.weight));
    }

    fn compute_jacobian(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>) {
        let fis = point.leader;
        let b = self
            .model
            .d_strain_d_dof(self.displacement, fis)
            .clone();
        let n = fis.field_interpolator(self.displacement).n();
        for dof_type in self.requested_dof_types() {
            let mut block = if self.model.check_dof_dependency(dof_type) {
                b.tr_mul(self.model.d_flux_d_dof(dof_type, fis))
            } else {
                nalgebra::DMatrix::zeros(b.ncols(), fis.num_coefficients(dof_type))
            };
            if let Some(load) = self.properties.get(LOAD) {
                if load.check_dof_dependency(dof_type) {
                    block -= n.tr_mul(&load.d_prop_d_dof(dof_type, fis));
                }
            }
            block *= point.weight;
            set.add_jacobian_block((Side::Leader, self.displacement), (Side::Leader, dof_type), &block);
        }
    }

    fn clone_box(&self) -> Box<dyn Iwg<T>> {
        Box::new(self.clone())
    }
}
