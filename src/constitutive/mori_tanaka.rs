//! Mori–Tanaka homogenization of a matrix reinforced by aligned spheroidal fibers.
//!
//! All 3D tensors use the Voigt order `[11, 22, 33, 23, 13, 12]` with engineering shear strains.
//! The fiber axis is the local 1-axis.
use crate::constitutive::isotropic::isotropic_stiffness;
use crate::constitutive::struc_linear::{StiffnessLaw, StrucLinear};
use crate::constitutive::TensorType;
use crate::dof::DofType;
use crate::field_interpolator::FieldInterpolatorManager;
use crate::property::PropertyRegistry;
use crate::voigt::VoigtLayout;
use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;

pub type MoriTanaka<T> = StrucLinear<T, MoriTanakaLaw>;

pub const YOUNGS_MODULUS_MATRIX: usize = 6;
pub const POISSON_RATIO_MATRIX: usize = 7;
pub const YOUNGS_MODULUS_FIBER: usize = 8;
pub const POISSON_RATIO_FIBER: usize = 9;
pub const VOLUME_FRACTION: usize = 10;
pub const ORIENTATION_IN_PLANE: usize = 11;
pub const ORIENTATION_OUT_OF_PLANE: usize = 12;
pub const ASPECT_RATIO: usize = 13;

pub const MORI_TANAKA_PROPERTY_NAMES: &[&str] = &[
    "YoungsModulus",
    "PoissonRatio",
    "CTE",
    "PropertyTemperature",
    "ReferenceTemperature",
    "AxisymRotationAxis",
    "YoungsModulusMatrix",
    "PoissonRatioMatrix",
    "YoungsModulusFiber",
    "PoissonRatioFiber",
    "VolumeFraction",
    "OrientationInPlane",
    "OrientationOutOfPlane",
    "AspectRatio",
];

/// Aspect ratio above which fibers are treated as continuous.
pub const CONTINUOUS_FIBER_ASPECT_RATIO: f64 = 1000.0;

/// 3D isotropic stiffness.
pub fn isotropic_stiffness_3d<T: Real>(youngs_modulus: T, poisson_ratio: T) -> DMatrix<T> {
    isotropic_stiffness(VoigtLayout::Full3d, TensorType::Full, youngs_modulus, poisson_ratio)
}

/// Builds the Voigt Eshelby matrix from the independent components
/// `[S1111, S2222, S2233, S2211, S1122, S2323, S1212]` of a transversely isotropic inclusion.
fn eshelby_from_components<T: Real>(s: [T; 7]) -> DMatrix<T> {
    let [s1111, s2222, s2233, s2211, s1122, s2323, s1212] = s;
    let two = T::one() + T::one();
    let mut m = DMatrix::zeros(6, 6);
    m[(0, 0)] = s1111;
    m[(0, 1)] = s1122;
    m[(0, 2)] = s1122;
    m[(1, 0)] = s2211;
    m[(1, 1)] = s2222;
    m[(1, 2)] = s2233;
    m[(2, 0)] = s2211;
    m[(2, 1)] = s2233;
    m[(2, 2)] = s2222;
    m[(3, 3)] = two * s2323;
    m[(4, 4)] = two * s1212;
    m[(5, 5)] = two * s1212;
    m
}

/// Eshelby tensor of a spheroid with the given aspect ratio (length over diameter) embedded in an
/// isotropic matrix with Poisson ratio `nu`.
///
/// Uses the sphere closed form for an aspect ratio of exactly one, the `acos` form for oblate
/// (`a < 1`) and the `acosh` form for prolate (`a > 1`) inclusions.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn eshelby_tensor_spheroid<T: Real>(nu: T, aspect_ratio: T) -> DMatrix<T> {
    let a = aspect_ratio;
    if a == 1.0 {
        let d = 15.0 * (1.0 - nu);
        let normal = (7.0 - 5.0 * nu) / d;
        let off = (5.0 * nu - 1.0) / d;
        let shear = (4.0 - 5.0 * nu) / d;
        return eshelby_from_components([normal, normal, off, off, off, shear, shear]);
    }

    let a2 = a * a;
    let g = if a > 1.0 {
        let root = (a2 - 1.0).sqrt();
        a / (root * root * root) * (a * root - a.acosh())
    } else {
        let root = (1.0 - a2).sqrt();
        a / (root * root * root) * (a.acos() - a * root)
    };

    let q = 1.0 / (1.0 - nu);
    let b = a2 - 1.0;
    let s1111 = q / 2.0 * (1.0 - 2.0 * nu + (3.0 * a2 - 1.0) / b - (1.0 - 2.0 * nu + 3.0 * a2 / b) * g);
    let s2222 = 3.0 * q / 8.0 * a2 / b + q / 4.0 * (1.0 - 2.0 * nu - 9.0 / (4.0 * b)) * g;
    let s2233 = q / 4.0 * (a2 / (2.0 * b) - (1.0 - 2.0 * nu + 3.0 / (4.0 * b)) * g);
    let s2211 = -q / 2.0 * a2 / b + q / 4.0 * (3.0 * a2 / b - (1.0 - 2.0 * nu)) * g;
    let s1122 = -q / 2.0 * (1.0 - 2.0 * nu + 1.0 / b) + q / 2.0 * (1.0 - 2.0 * nu + 3.0 / (2.0 * b)) * g;
    let s2323 = q / 4.0 * (a2 / (2.0 * b) + (1.0 - 2.0 * nu - 3.0 / (4.0 * b)) * g);
    let s1212 = q / 4.0 * (1.0 - 2.0 * nu - (a2 + 1.0) / b - 0.5 * (1.0 - 2.0 * nu - 3.0 * (a2 + 1.0) / b) * g);
    eshelby_from_components([s1111, s2222, s2233, s2211, s1122, s2323, s1212])
}

/// Eshelby tensor of an infinitely long cylindrical fiber.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn eshelby_tensor_continuous_fiber<T: Real>(nu: T) -> DMatrix<T> {
    let d = 8.0 * (1.0 - nu);
    eshelby_from_components([
        0.0,
        (5.0 - 4.0 * nu) / d,
        (4.0 * nu - 1.0) / d,
        nu / (2.0 * (1.0 - nu)),
        0.0,
        (3.0 - 4.0 * nu) / d,
        0.25,
    ])
}

/// Eshelby tensor, switching to the continuous fiber form above
/// [`CONTINUOUS_FIBER_ASPECT_RATIO`].
pub fn eshelby_tensor<T: Real>(nu: T, aspect_ratio: T) -> DMatrix<T> {
    let threshold = T::from_f64(CONTINUOUS_FIBER_ASPECT_RATIO).expect("Literal must fit in T");
    if aspect_ratio > threshold {
        eshelby_tensor_continuous_fiber(nu)
    } else {
        eshelby_tensor_spheroid(nu, aspect_ratio)
    }
}

fn invert<T: Real>(matrix: DMatrix<T>, what: &str) -> DMatrix<T> {
    matrix
        .try_inverse()
        .unwrap_or_else(|| panic!("Mori-Tanaka: {} is singular.", what))
}

/// Dilute strain concentration `[I + S Cm⁻¹ (Cf − Cm)]⁻¹`.
///
/// # Panics
///
/// Panics if one of the involved matrices is singular.
pub fn dilute_concentration<T: Real>(eshelby: &DMatrix<T>, matrix_stiffness: &DMatrix<T>, fiber_stiffness: &DMatrix<T>) -> DMatrix<T> {
    let matrix_compliance = invert(matrix_stiffness.clone(), "matrix stiffness");
    let n = eshelby.nrows();
    let a = DMatrix::identity(n, n) + eshelby * matrix_compliance * (fiber_stiffness - matrix_stiffness);
    invert(a, "dilute concentration operator")
}

/// Mori–Tanaka concentration `A_dil [(1 − vf) I + vf A_dil]⁻¹`.
pub fn mori_tanaka_concentration<T: Real>(dilute: &DMatrix<T>, volume_fraction: T) -> DMatrix<T> {
    let n = dilute.nrows();
    let mixed = DMatrix::identity(n, n) * (T::one() - volume_fraction) + dilute * volume_fraction;
    dilute * invert(mixed, "Mori-Tanaka mixing operator")
}

/// Effective stiffness of the composite in the fiber frame.
pub fn mori_tanaka_stiffness<T: Real>(
    matrix_stiffness: &DMatrix<T>,
    fiber_stiffness: &DMatrix<T>,
    eshelby: &DMatrix<T>,
    volume_fraction: T,
) -> DMatrix<T> {
    let dilute = dilute_concentration(eshelby, matrix_stiffness, fiber_stiffness);
    let concentration = mori_tanaka_concentration(&dilute, volume_fraction);
    matrix_stiffness + (fiber_stiffness - matrix_stiffness) * concentration * volume_fraction
}

/// Condenses a 3D stiffness to plane stress by eliminating the 33 component.
///
/// Returns the `[11, 22, 12]` stiffness `C'ij = Cij − Ci3 C3j / C33` for `i, j ∈ {11, 22, 12}`.
pub fn condense_to_plane_stress<T: Real>(stiffness: &DMatrix<T>) -> DMatrix<T> {
    const KEEP: [usize; 3] = [0, 1, 5];
    const ELIMINATED: usize = 2;
    let c33 = stiffness[(ELIMINATED, ELIMINATED)];
    DMatrix::from_fn(3, 3, |i, j| {
        let (i, j) = (KEEP[i], KEEP[j]);
        stiffness[(i, j)] - stiffness[(i, ELIMINATED)] * stiffness[(ELIMINATED, j)] / c33
    })
}

/// Rotation `Rz(θ) Ry(−φ)` taking the local fiber frame to the global frame.
pub fn rotation_matrix<T: Real>(theta: T, phi: T) -> DMatrix<T> {
    let (s, c) = theta.sin_cos();
    let (sp, cp) = (-phi).sin_cos();
    let rz = DMatrix::from_row_slice(3, 3, &[c, -s, T::zero(), s, c, T::zero(), T::zero(), T::zero(), T::one()]);
    let ry = DMatrix::from_row_slice(3, 3, &[cp, T::zero(), sp, T::zero(), T::one(), T::zero(), -sp, T::zero(), cp]);
    rz * ry
}

/// Bond matrix transforming Voigt stresses with the given rotation, `σ' = M σ`.
///
/// A stiffness transforms as `C' = M C Mᵀ`.
pub fn bond_stress_matrix<T: Real>(rotation: &DMatrix<T>) -> DMatrix<T> {
    let r = |i: usize, j: usize| rotation[(i, j)];
    let two = T::one() + T::one();
    // (i, j) index pairs of the Voigt slots
    const PAIRS: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)];
    DMatrix::from_fn(6, 6, |row, col| {
        let (i, j) = PAIRS[row];
        let (k, l) = PAIRS[col];
        match (row < 3, col < 3) {
            (true, true) => r(i, k) * r(i, k),
            (true, false) => two * r(i, k) * r(i, l),
            (false, true) => r(i, k) * r(j, k),
            (false, false) => r(i, k) * r(j, l) + r(i, l) * r(j, k),
        }
    })
}

/// In-plane Bond matrix of a rotation by `θ` about the 3-axis, acting on `[11, 22, 12]`.
pub fn plane_stress_bond_matrix<T: Real>(theta: T) -> DMatrix<T> {
    let (s, c) = theta.sin_cos();
    let two = T::one() + T::one();
    DMatrix::from_row_slice(
        3,
        3,
        &[c * c, s * s, -two * c * s, s * s, c * c, two * c * s, c * s, -c * s, c * c - s * s],
    )
}

/// Derivative of [`plane_stress_bond_matrix`] with respect to `θ`.
pub fn plane_stress_bond_matrix_derivative<T: Real>(theta: T) -> DMatrix<T> {
    let (s, c) = theta.sin_cos();
    let two = T::one() + T::one();
    let four = two + two;
    let cos2 = c * c - s * s;
    DMatrix::from_row_slice(
        3,
        3,
        &[
            -two * c * s,
            two * c * s,
            -two * cos2,
            two * c * s,
            -two * c * s,
            two * cos2,
            cos2,
            -cos2,
            -four * c * s,
        ],
    )
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MoriTanakaLaw;

impl MoriTanakaLaw {
    /// Stiffness in the fiber frame, condensed to plane stress for 2D layouts.
    fn local_stiffness<T: Real>(
        &self,
        layout: VoigtLayout,
        properties: &PropertyRegistry<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> DMatrix<T> {
        let em = properties.scalar(YOUNGS_MODULUS_MATRIX, fis);
        let num = properties.scalar(POISSON_RATIO_MATRIX, fis);
        let ef = properties.scalar(YOUNGS_MODULUS_FIBER, fis);
        let nuf = properties.scalar(POISSON_RATIO_FIBER, fis);
        let vf = properties.scalar(VOLUME_FRACTION, fis);
        let aspect_ratio = properties.scalar(ASPECT_RATIO, fis);

        let cm = isotropic_stiffness_3d(em, num);
        let cf = isotropic_stiffness_3d(ef, nuf);
        let eshelby = eshelby_tensor(num, aspect_ratio);
        let c = mori_tanaka_stiffness(&cm, &cf, &eshelby, vf);
        match layout {
            VoigtLayout::PlaneStress => condense_to_plane_stress(&c),
            _ => c,
        }
    }

    fn angles<T: Real>(&self, properties: &PropertyRegistry<T>, fis: &FieldInterpolatorManager<T>) -> (T, T) {
        let theta = properties.scalar(ORIENTATION_IN_PLANE, fis);
        let phi = properties
            .get(ORIENTATION_OUT_OF_PLANE)
            .map(|property| property.val(fis)[0])
            .unwrap_or_else(T::zero);
        (theta, phi)
    }

    fn check_unsupported_dependencies<T: Real>(&self, properties: &PropertyRegistry<T>, dof_type: DofType) {
        for slot in [
            YOUNGS_MODULUS_MATRIX,
            POISSON_RATIO_MATRIX,
            YOUNGS_MODULUS_FIBER,
            POISSON_RATIO_FIBER,
            VOLUME_FRACTION,
            ASPECT_RATIO,
            ORIENTATION_OUT_OF_PLANE,
        ] {
            if properties.depends_on(slot, dof_type) {
                panic!(
                    "MoriTanaka: dependency of {} on dof type {} is not implemented.",
                    properties.names()[slot],
                    dof_type
                );
            }
        }
    }
}

impl<T: Real> StiffnessLaw<T> for MoriTanakaLaw {
    const NAME: &'static str = "StrucLinearMoriTanaka";
    const PROPERTY_NAMES: &'static [&'static str] = MORI_TANAKA_PROPERTY_NAMES;

    fn check_variant(&self, layout: VoigtLayout, tensor_type: TensorType) -> eyre::Result<()> {
        if tensor_type != TensorType::Full {
            return Err(eyre!("MoriTanaka: only the full tensor is supported."));
        }
        match layout {
            VoigtLayout::PlaneStress | VoigtLayout::Full3d => Ok(()),
            _ => Err(eyre!(
                "MoriTanaka: {:?} is not supported, 2D models must be plane stress.",
                layout
            )),
        }
    }

    fn check_properties(&self, properties: &PropertyRegistry<T>, _layout: VoigtLayout) -> eyre::Result<()> {
        for slot in [
            YOUNGS_MODULUS_MATRIX,
            POISSON_RATIO_MATRIX,
            YOUNGS_MODULUS_FIBER,
            POISSON_RATIO_FIBER,
            VOLUME_FRACTION,
            ORIENTATION_IN_PLANE,
            ASPECT_RATIO,
        ] {
            if !properties.is_set(slot) {
                return Err(eyre!(
                    "MoriTanaka: required property \"{}\" has not been set.",
                    properties.names()[slot]
                ));
            }
        }
        Ok(())
    }

    fn constitutive_matrix(
        &self,
        layout: VoigtLayout,
        _tensor_type: TensorType,
        properties: &PropertyRegistry<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> DMatrix<T> {
        let local = self.local_stiffness(layout, properties, fis);
        let (theta, phi) = self.angles(properties, fis);
        let m = match layout {
            VoigtLayout::PlaneStress => plane_stress_bond_matrix(theta),
            _ => bond_stress_matrix(&rotation_matrix(theta, phi)),
        };
        &m * local * m.transpose()
    }

    fn d_stiffness_times_strain(
        &self,
        layout: VoigtLayout,
        _tensor_type: TensorType,
        properties: &PropertyRegistry<T>,
        dof_type: DofType,
        _elastic_flux: &DVector<T>,
        strain: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> Option<DMatrix<T>> {
        self.check_unsupported_dependencies(properties, dof_type);
        if !properties.depends_on(ORIENTATION_IN_PLANE, dof_type) {
            return None;
        }
        if layout != VoigtLayout::PlaneStress {
            panic!(
                "MoriTanaka: orientation derivative is only implemented for plane stress, not {:?}.",
                layout
            );
        }
        let local = self.local_stiffness(layout, properties, fis);
        let (theta, _) = self.angles(properties, fis);
        let m = plane_stress_bond_matrix(theta);
        let dm = plane_stress_bond_matrix_derivative(theta);
        let dc = &dm * &local * m.transpose() + &m * &local * dm.transpose();
        let d_theta = properties
            .require(ORIENTATION_IN_PLANE)
            .d_prop_d_dof(dof_type, fis);
        Some(dc * strain * d_theta)
    }

    fn d_test_traction_d_dof(
        &self,
        properties: &PropertyRegistry<T>,
        dof_type: DofType,
        _test_traction_jump: &DVector<T>,
        _fis: &FieldInterpolatorManager<T>,
    ) -> Option<DMatrix<T>> {
        self.check_unsupported_dependencies(properties, dof_type);
        if properties.depends_on(ORIENTATION_IN_PLANE, dof_type) {
            panic!("MoriTanaka: test traction derivative with respect to the orientation is not implemented.");
        }
        None
    }
}
