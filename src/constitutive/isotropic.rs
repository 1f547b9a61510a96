use crate::constitutive::struc_linear::{
    StiffnessLaw, StrucLinear, POISSON_RATIO, STRUC_LINEAR_PROPERTY_NAMES, YOUNGS_MODULUS,
};
use crate::constitutive::TensorType;
use crate::dof::DofType;
use crate::field_interpolator::FieldInterpolatorManager;
use crate::property::PropertyRegistry;
use crate::voigt::VoigtLayout;
use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;

/// Linear isotropic elasticity.
pub type LinearIsotropic<T> = StrucLinear<T, IsotropicLaw>;

pub const ISOTROPIC_PROPERTY_NAMES: &[&str] = &STRUC_LINEAR_PROPERTY_NAMES;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IsotropicLaw;

/// Isotropic constitutive matrix for the given layout and tensor type.
///
/// Shear rows act on engineering shear strains.
///
/// # Panics
///
/// Panics for the deviatoric plane stress combination, which has no closed form.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn isotropic_stiffness<T: Real>(layout: VoigtLayout, tensor_type: TensorType, youngs_modulus: T, poisson_ratio: T) -> DMatrix<T> {
    let e = youngs_modulus;
    let nu = poisson_ratio;
    match tensor_type {
        TensorType::Full => match layout {
            VoigtLayout::PlaneStress => {
                let f = e / (1.0 - nu * nu);
                let mut c = DMatrix::zeros(3, 3);
                c[(0, 0)] = f;
                c[(1, 1)] = f;
                c[(0, 1)] = f * nu;
                c[(1, 0)] = f * nu;
                c[(2, 2)] = f * (1.0 - nu) / 2.0;
                c
            }
            VoigtLayout::PlaneStrain | VoigtLayout::Axisymmetric | VoigtLayout::Full3d => {
                let f = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
                let n = layout.num_components();
                let num_normal = layout.num_normal_stresses();
                let mut c = DMatrix::zeros(n, n);
                for i in 0..num_normal {
                    for j in 0..num_normal {
                        c[(i, j)] = if i == j { f * (1.0 - nu) } else { f * nu };
                    }
                }
                for i in num_normal..n {
                    c[(i, i)] = f * (1.0 - 2.0 * nu) / 2.0;
                }
                c
            }
        },
        TensorType::Deviatoric => {
            assert_ne!(
                layout,
                VoigtLayout::PlaneStress,
                "Deviatoric plane stress stiffness is not supported."
            );
            let g = e / (2.0 * (1.0 + nu));
            let n = layout.num_components();
            let num_normal = layout.num_normal_stresses();
            let mut c = DMatrix::zeros(n, n);
            for i in 0..num_normal {
                for j in 0..num_normal {
                    c[(i, j)] = if i == j { 4.0 / 3.0 * g } else { -2.0 / 3.0 * g };
                }
            }
            for i in num_normal..n {
                c[(i, i)] = g;
            }
            c
        }
    }
}

impl<T: Real> StiffnessLaw<T> for IsotropicLaw {
    const NAME: &'static str = "StrucLinearIsotropic";
    const PROPERTY_NAMES: &'static [&'static str] = ISOTROPIC_PROPERTY_NAMES;

    fn check_variant(&self, layout: VoigtLayout, tensor_type: TensorType) -> eyre::Result<()> {
        if layout == VoigtLayout::PlaneStress && tensor_type == TensorType::Deviatoric {
            Err(eyre!(
                "{}: deviatoric tensor is not supported for plane stress.",
                <Self as StiffnessLaw<T>>::NAME
            ))
        } else {
            Ok(())
        }
    }

    fn check_properties(&self, properties: &PropertyRegistry<T>, _layout: VoigtLayout) -> eyre::Result<()> {
        for slot in [YOUNGS_MODULUS, POISSON_RATIO] {
            if !properties.is_set(slot) {
                return Err(eyre!(
                    "{}: required property \"{}\" has not been set.",
                    <Self as StiffnessLaw<T>>::NAME,
                    properties.names()[slot]
                ));
            }
        }
        Ok(())
    }

    fn constitutive_matrix(
        &self,
        layout: VoigtLayout,
        tensor_type: TensorType,
        properties: &PropertyRegistry<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> DMatrix<T> {
        let e = properties.scalar(YOUNGS_MODULUS, fis);
        let nu = properties.scalar(POISSON_RATIO, fis);
        isotropic_stiffness(layout, tensor_type, e, nu)
    }

    fn d_stiffness_times_strain(
        &self,
        _layout: VoigtLayout,
        _tensor_type: TensorType,
        properties: &PropertyRegistry<T>,
        dof_type: DofType,
        elastic_flux: &DVector<T>,
        _strain: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> Option<DMatrix<T>> {
        if properties.depends_on(POISSON_RATIO, dof_type) {
            panic!(
                "{}: dependency of the Poisson ratio on dof type {} is not implemented.",
                <Self as StiffnessLaw<T>>::NAME,
                dof_type
            );
        }
        if !properties.depends_on(YOUNGS_MODULUS, dof_type) {
            return None;
        }
        // C is linear in E
        let e = properties.scalar(YOUNGS_MODULUS, fis);
        let d_e = properties.require(YOUNGS_MODULUS).d_prop_d_dof(dof_type, fis);
        Some(elastic_flux * d_e / e)
    }

    fn d_test_traction_d_dof(
        &self,
        properties: &PropertyRegistry<T>,
        dof_type: DofType,
        test_traction_jump: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> Option<DMatrix<T>> {
        if properties.depends_on(POISSON_RATIO, dof_type) {
            panic!(
                "{}: dependency of the Poisson ratio on dof type {} is not implemented.",
                <Self as StiffnessLaw<T>>::NAME,
                dof_type
            );
        }
        if !properties.depends_on(YOUNGS_MODULUS, dof_type) {
            return None;
        }
        let e = properties.scalar(YOUNGS_MODULUS, fis);
        let d_e = properties.require(YOUNGS_MODULUS).d_prop_d_dof(dof_type, fis);
        Some(test_traction_jump * d_e / e)
    }
}
