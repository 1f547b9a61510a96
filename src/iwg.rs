//! Integral weak-form generators (IWGs): element residual and Jacobian contributions of one
//! physics term at one integration point.
use crate::dof::DofType;
use crate::field_interpolator::FieldInterpolatorManager;
use moris_traits::Real;
use nalgebra::DVector;

mod assembly;
mod compressible_ns;
mod ghost;
mod struc_linear;
mod variable_set;

pub use assembly::*;
pub use compressible_ns::*;
pub use ghost::*;
pub use struc_linear::*;
pub use variable_set::*;

/// Everything an IWG may query at the current integration point.
#[derive(Debug)]
pub struct IntegrationPoint<'a, T: Real> {
    pub leader: &'a FieldInterpolatorManager<'a, T>,
    pub follower: Option<&'a FieldInterpolatorManager<'a, T>>,
    /// Facet normal pointing from the leader into the follower side.
    pub normal: Option<&'a DVector<T>>,
    /// Quadrature weight including the integration-domain Jacobian determinant.
    pub weight: T,
}

impl<'a, T: Real> Clone for IntegrationPoint<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: Real> Copy for IntegrationPoint<'a, T> {}

impl<'a, T: Real> IntegrationPoint<'a, T> {
    pub fn bulk(leader: &'a FieldInterpolatorManager<'a, T>, weight: T) -> Self {
        Self {
            leader,
            follower: None,
            normal: None,
            weight,
        }
    }

    pub fn interface(
        leader: &'a FieldInterpolatorManager<'a, T>,
        follower: &'a FieldInterpolatorManager<'a, T>,
        normal: &'a DVector<T>,
        weight: T,
    ) -> Self {
        Self {
            leader,
            follower: Some(follower),
            normal: Some(normal),
            weight,
        }
    }

    pub fn side(&self, side: Side) -> &'a FieldInterpolatorManager<'a, T> {
        match side {
            Side::Leader => self.leader,
            Side::Follower => self
                .follower
                .unwrap_or_else(|| panic!("Integration point has no follower side.")),
        }
    }

    /// # Panics
    ///
    /// Panics if the point carries no normal.
    pub fn normal(&self) -> &'a DVector<T> {
        self.normal
            .unwrap_or_else(|| panic!("Integration point has no normal."))
    }
}

pub trait Iwg<T: Real>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Dof groups whose equations this IWG contributes to, in assembly order.
    fn residual_dof_types(&self) -> Vec<DofType>;

    /// Dof groups the residual depends on, i.e. the Jacobian columns this IWG fills.
    fn requested_dof_types(&self) -> Vec<DofType>;

    /// Marks every cached quantity stale. Must be called once per integration point.
    fn reset_eval_flags(&mut self);

    fn compute_residual(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>);

    fn compute_jacobian(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>);

    fn clone_box(&self) -> Box<dyn Iwg<T>>;
}

impl<T: Real> Clone for Box<dyn Iwg<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
