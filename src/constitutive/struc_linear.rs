use crate::cache::{Cached, DofCached};
use crate::constitutive::{merge_dof_types, voigt_layout, ConstitutiveModel, ModelType, TensorType};
use crate::dof::{DofRoles, DofType};
use crate::field_interpolator::FieldInterpolatorManager;
use crate::property::{Property, PropertyRegistry};
use crate::voigt::VoigtLayout;
use eyre::eyre;
use log::debug;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;
use std::sync::Arc;

pub const DISPLACEMENT: usize = 0;
pub const TEMPERATURE: usize = 1;
pub const PRESSURE: usize = 2;

pub const STRUC_LINEAR_DOF_ROLES: &[&str] = &["Displacement", "Temperature", "Pressure"];

pub const YOUNGS_MODULUS: usize = 0;
pub const POISSON_RATIO: usize = 1;
pub const CTE: usize = 2;
pub const PROPERTY_TEMPERATURE: usize = 3;
pub const REFERENCE_TEMPERATURE: usize = 4;
pub const AXISYM_ROTATION_AXIS: usize = 5;

/// Property names shared by all linear elastic models, in slot order. Laws append their own names.
pub const STRUC_LINEAR_PROPERTY_NAMES: [&str; 6] = [
    "YoungsModulus",
    "PoissonRatio",
    "CTE",
    "PropertyTemperature",
    "ReferenceTemperature",
    "AxisymRotationAxis",
];

/// The stiffness part of a linear elastic model.
///
/// [`StrucLinear`] owns kinematics, thermal strain, the mixed pressure term and tractions. A law
/// only provides the constitutive matrix and the derivative terms that come from its own
/// property dependencies.
pub trait StiffnessLaw<T: Real>: Debug + Clone + Send + Sync + 'static {
    const NAME: &'static str;

    /// Full property name table. Must start with [`STRUC_LINEAR_PROPERTY_NAMES`].
    const PROPERTY_NAMES: &'static [&'static str];

    fn check_variant(&self, layout: VoigtLayout, tensor_type: TensorType) -> eyre::Result<()>;

    fn check_properties(&self, properties: &PropertyRegistry<T>, layout: VoigtLayout) -> eyre::Result<()>;

    fn constitutive_matrix(
        &self,
        layout: VoigtLayout,
        tensor_type: TensorType,
        properties: &PropertyRegistry<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> DMatrix<T>;

    /// Returns `(dC/d dof) * strain` if any stiffness property depends on `dof_type`.
    ///
    /// `elastic_flux` is `C * strain`.
    #[allow(clippy::too_many_arguments)]
    fn d_stiffness_times_strain(
        &self,
        layout: VoigtLayout,
        tensor_type: TensorType,
        properties: &PropertyRegistry<T>,
        dof_type: DofType,
        elastic_flux: &DVector<T>,
        strain: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> Option<DMatrix<T>>;

    /// Returns the derivative of `test_traction^T * jump` if any stiffness property depends on
    /// `dof_type`. `test_traction_jump` is `test_traction^T * jump`.
    fn d_test_traction_d_dof(
        &self,
        properties: &PropertyRegistry<T>,
        dof_type: DofType,
        test_traction_jump: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> Option<DMatrix<T>>;
}

/// Linear elasticity with optional thermal expansion, axisymmetric hoop strain and a mixed
/// pressure field, parameterized by its stiffness law.
#[derive(Debug, Clone)]
pub struct StrucLinear<T: Real, L> {
    law: L,
    dofs: DofRoles,
    properties: PropertyRegistry<T>,
    variant: Option<(VoigtLayout, TensorType)>,

    constitutive_matrix: Cached<DMatrix<T>>,
    strain: Cached<DVector<T>>,
    flux: Cached<DVector<T>>,
    traction: Cached<DVector<T>>,
    d_strain: DofCached<DofType, DMatrix<T>>,
    d_flux: DofCached<DofType, DMatrix<T>>,
    d_traction: DofCached<DofType, DMatrix<T>>,
    test_traction: DofCached<DofType, DMatrix<T>>,
    d_test_traction: DofCached<(DofType, DofType), DMatrix<T>>,
}

impl<T: Real, L: StiffnessLaw<T> + Default> Default for StrucLinear<T, L> {
    fn default() -> Self {
        Self::new(L::default())
    }
}

impl<T: Real, L: StiffnessLaw<T>> StrucLinear<T, L> {
    pub fn new(law: L) -> Self {
        debug_assert_eq!(&L::PROPERTY_NAMES[..STRUC_LINEAR_PROPERTY_NAMES.len()], &STRUC_LINEAR_PROPERTY_NAMES);
        Self {
            law,
            dofs: DofRoles::new(L::NAME, STRUC_LINEAR_DOF_ROLES),
            properties: PropertyRegistry::new(L::NAME, L::PROPERTY_NAMES),
            variant: None,
            constitutive_matrix: Cached::default(),
            strain: Cached::default(),
            flux: Cached::default(),
            traction: Cached::default(),
            d_strain: DofCached::default(),
            d_flux: DofCached::default(),
            d_traction: DofCached::default(),
            test_traction: DofCached::default(),
            d_test_traction: DofCached::default(),
        }
    }

    pub fn law(&self) -> &L {
        &self.law
    }

    pub fn properties(&self) -> &PropertyRegistry<T> {
        &self.properties
    }

    /// # Panics
    ///
    /// Panics if no model variant has been selected.
    pub fn layout(&self) -> VoigtLayout {
        self.variant().0
    }

    pub fn tensor_type(&self) -> TensorType {
        self.variant().1
    }

    fn variant(&self) -> (VoigtLayout, TensorType) {
        self.variant
            .unwrap_or_else(|| panic!("{}: model variant has not been selected.", L::NAME))
    }

    fn displacement_dof(&self) -> DofType {
        self.dofs
            .get(DISPLACEMENT)
            .unwrap_or_else(|| panic!("{}: displacement dof has not been set.", L::NAME))
    }

    /// Returns the current temperature, from either the temperature dof or the
    /// `PropertyTemperature` property.
    ///
    /// # Panics
    ///
    /// Panics if both or neither source is available.
    fn current_temperature(&self, fis: &FieldInterpolatorManager<T>) -> T {
        self.check_temperature_sources();
        if let Some(dof) = self.dofs.get(TEMPERATURE) {
            fis.field_interpolator(dof).val()[0]
        } else if let Some(property) = self.properties.get(PROPERTY_TEMPERATURE) {
            property.val(fis)[0]
        } else {
            panic!(
                "{}: CTE requires either a temperature dof or the PropertyTemperature property.",
                L::NAME
            )
        }
    }

    fn check_temperature_sources(&self) {
        if self.dofs.get(TEMPERATURE).is_some() && self.properties.is_set(PROPERTY_TEMPERATURE) {
            panic!(
                "{}: temperature is given both as a dof and as the PropertyTemperature property.",
                L::NAME
            );
        }
    }

    /// Rotation-axis data `(r, n1, n2)` of the axisymmetric variant.
    fn axisymmetric_axis(&self, fis: &FieldInterpolatorManager<T>) -> (T, T, T) {
        let axis = self.properties.require(AXISYM_ROTATION_AXIS).val(fis);
        assert!(axis.len() >= 4, "{}: AxisymRotationAxis must hold {{2πr, r, n1, n2}}.", L::NAME);
        (axis[1], axis[2], axis[3])
    }

    fn num_coefficients(&self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> usize {
        fis.num_coefficients(dof_type)
    }

    fn thermal_strain(&self, fis: &FieldInterpolatorManager<T>) -> Option<DVector<T>> {
        let cte = self.properties.get(CTE)?.val(fis)[0];
        let reference = self
            .properties
            .require(REFERENCE_TEMPERATURE)
            .val(fis)[0];
        let temperature = self.current_temperature(fis);
        Some(self.layout().normal_identity::<T>() * (cte * (reference - temperature)))
    }

    fn eval_strain(&self, fis: &FieldInterpolatorManager<T>) -> DVector<T> {
        self.check_temperature_sources();
        let layout = self.layout();
        let fi = fis.field_interpolator(self.displacement_dof());
        let g = fi.gradx(1);
        let mut strain = match layout {
            VoigtLayout::PlaneStress | VoigtLayout::PlaneStrain => {
                DVector::from_column_slice(&[g[(0, 0)], g[(1, 1)], g[(0, 1)] + g[(1, 0)]])
            }
            VoigtLayout::Axisymmetric => {
                let (r, n1, n2) = self.axisymmetric_axis(fis);
                let u = fi.val();
                let hoop = (u[0] * n1 + u[1] * n2) / r;
                DVector::from_column_slice(&[g[(0, 0)], g[(1, 1)], hoop, g[(0, 1)] + g[(1, 0)]])
            }
            VoigtLayout::Full3d => DVector::from_column_slice(&[
                g[(0, 0)],
                g[(1, 1)],
                g[(2, 2)],
                g[(1, 2)] + g[(2, 1)],
                g[(0, 2)] + g[(2, 0)],
                g[(0, 1)] + g[(1, 0)],
            ]),
        };
        if let Some(thermal) = self.thermal_strain(fis) {
            strain += thermal;
        }
        strain
    }

    /// The strain-displacement operator `B` with `strain = B * u_coefficients`.
    fn strain_displacement_matrix(&self, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        let layout = self.layout();
        let fi = fis.field_interpolator(self.displacement_dof());
        let dndx = fi.dnndxn(1);
        let nb = fi.number_of_space_time_bases();
        let mut b = DMatrix::zeros(layout.num_components(), fi.number_of_space_time_coefficients());

        // (voigt row, displacement component, derivative direction)
        let entries: &[(usize, usize, usize)] = match layout {
            VoigtLayout::PlaneStress | VoigtLayout::PlaneStrain => &[(0, 0, 0), (1, 1, 1), (2, 0, 1), (2, 1, 0)],
            VoigtLayout::Axisymmetric => &[(0, 0, 0), (1, 1, 1), (3, 0, 1), (3, 1, 0)],
            VoigtLayout::Full3d => &[
                (0, 0, 0),
                (1, 1, 1),
                (2, 2, 2),
                (3, 1, 2),
                (3, 2, 1),
                (4, 0, 2),
                (4, 2, 0),
                (5, 0, 1),
                (5, 1, 0),
            ],
        };
        for &(row, component, direction) in entries {
            b.view_mut((row, component * nb), (1, nb))
                .copy_from(&dndx.row(direction));
        }

        if layout == VoigtLayout::Axisymmetric {
            let (r, n1, n2) = self.axisymmetric_axis(fis);
            let values = fi.n().view((0, 0), (1, nb)).clone_owned();
            b.view_mut((2, 0), (1, nb)).copy_from(&(&values * (n1 / r)));
            b.view_mut((2, nb), (1, nb)).copy_from(&(&values * (n2 / r)));
        }
        b
    }

    /// Derivative of the strain with respect to the dof itself, without property terms.
    fn direct_d_strain(&self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        let layout = self.layout();
        if dof_type == self.displacement_dof() {
            return self.strain_displacement_matrix(fis);
        }
        let mut d = DMatrix::zeros(layout.num_components(), self.num_coefficients(dof_type, fis));
        if self.dofs.get(TEMPERATURE) == Some(dof_type) {
            if let Some(cte) = self.properties.get(CTE) {
                let cte = cte.val(fis)[0];
                let n_temp = fis.field_interpolator(dof_type).n();
                d -= layout.normal_identity::<T>() * n_temp * cte;
            }
        }
        d
    }

    fn eval_d_strain(&self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        let mut d = self.direct_d_strain(dof_type, fis);

        let cte = match self.properties.get(CTE) {
            Some(cte) => cte,
            None => return d,
        };
        let identity = self.layout().normal_identity::<T>();
        let cte_value = cte.val(fis)[0];

        if cte.check_dof_dependency(dof_type) {
            let reference = self
                .properties
                .require(REFERENCE_TEMPERATURE)
                .val(fis)[0];
            let temperature = self.current_temperature(fis);
            d += &identity * cte.d_prop_d_dof(dof_type, fis) * (reference - temperature);
        }
        if self.properties.depends_on(PROPERTY_TEMPERATURE, dof_type) {
            let d_temp = self
                .properties
                .require(PROPERTY_TEMPERATURE)
                .d_prop_d_dof(dof_type, fis);
            d -= &identity * d_temp * cte_value;
        }
        if self.properties.depends_on(REFERENCE_TEMPERATURE, dof_type) {
            let d_reference = self
                .properties
                .require(REFERENCE_TEMPERATURE)
                .d_prop_d_dof(dof_type, fis);
            d += &identity * d_reference * cte_value;
        }
        d
    }

    fn pressure_term(&self, fis: &FieldInterpolatorManager<T>) -> Option<DVector<T>> {
        let dof = self.dofs.get(PRESSURE)?;
        let p = fis.field_interpolator(dof).val()[0];
        Some(self.layout().normal_identity::<T>() * p)
    }

    fn ensure_constitutive_matrix(&mut self, fis: &FieldInterpolatorManager<T>) {
        if self.constitutive_matrix.is_stale() {
            let (layout, tensor_type) = self.variant();
            let c = self
                .law
                .constitutive_matrix(layout, tensor_type, &self.properties, fis);
            self.constitutive_matrix.set(c);
        }
    }

    fn ensure_strain(&mut self, fis: &FieldInterpolatorManager<T>) {
        if self.strain.is_stale() {
            let strain = self.eval_strain(fis);
            self.strain.set(strain);
        }
    }

    fn ensure_flux(&mut self, fis: &FieldInterpolatorManager<T>) {
        if self.flux.is_stale() {
            self.ensure_constitutive_matrix(fis);
            self.ensure_strain(fis);
            let mut flux = self.constitutive_matrix.value() * self.strain.value();
            if let Some(pressure) = self.pressure_term(fis) {
                flux -= pressure;
            }
            self.flux.set(flux);
        }
    }

    fn ensure_d_strain(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) {
        if self.d_strain.is_stale(&dof_type) {
            let d = self.eval_d_strain(dof_type, fis);
            self.d_strain.set(dof_type, d);
        }
    }

    fn ensure_d_flux(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) {
        if self.d_flux.is_stale(&dof_type) {
            self.ensure_constitutive_matrix(fis);
            self.ensure_strain(fis);
            self.ensure_d_strain(dof_type, fis);
            let c = self.constitutive_matrix.value();
            let mut d = c * self.d_strain.value(&dof_type);

            if self.dofs.get(PRESSURE) == Some(dof_type) {
                let n_p = fis.field_interpolator(dof_type).n();
                d -= self.layout().normal_identity::<T>() * n_p;
            }

            let (layout, tensor_type) = self.variant();
            let strain = self.strain.value();
            let elastic_flux = c * strain;
            if let Some(indirect) = self.law.d_stiffness_times_strain(
                layout,
                tensor_type,
                &self.properties,
                dof_type,
                &elastic_flux,
                strain,
                fis,
            ) {
                d += indirect;
            }
            self.d_flux.set(dof_type, d);
        }
    }

    fn ensure_test_traction(&mut self, normal: &DVector<T>, test_dof_type: DofType, fis: &FieldInterpolatorManager<T>) {
        if self.test_traction.is_stale(&test_dof_type) {
            self.ensure_constitutive_matrix(fis);
            let layout = self.layout();
            let mut direct = self.constitutive_matrix.value() * self.direct_d_strain(test_dof_type, fis);
            if self.dofs.get(PRESSURE) == Some(test_dof_type) {
                let n_p = fis.field_interpolator(test_dof_type).n();
                direct -= layout.normal_identity::<T>() * n_p;
            }
            let test_traction = layout.flatten_normal(normal) * direct;
            self.test_traction.set(test_dof_type, test_traction);
        }
    }
}

impl<T: Real, L: StiffnessLaw<T>> ConstitutiveModel<T> for StrucLinear<T, L> {
    fn name(&self) -> &'static str {
        L::NAME
    }

    fn set_dof_type_list(&mut self, dof_types: &[DofType], role_names: &[&str]) -> eyre::Result<()> {
        self.dofs.set(dof_types, role_names)
    }

    fn set_property(&mut self, property: Arc<dyn Property<T>>, name: &str) -> eyre::Result<()> {
        self.properties.set(property, name)
    }

    fn select_model_variant(
        &mut self,
        space_dim: usize,
        model_type: ModelType,
        tensor_type: TensorType,
    ) -> eyre::Result<()> {
        let layout = voigt_layout(space_dim, model_type)?;
        self.law.check_variant(layout, tensor_type)?;
        debug!("{}: selected {:?} layout with {:?} tensor", L::NAME, layout, tensor_type);
        self.variant = Some((layout, tensor_type));
        self.reset_eval_flags();
        Ok(())
    }

    fn set_local_properties(&mut self) -> eyre::Result<()> {
        let (layout, _) = self
            .variant
            .ok_or_else(|| eyre!("{}: select a model variant before checking properties.", L::NAME))?;
        if self.dofs.get(DISPLACEMENT).is_none() {
            return Err(eyre!("{}: the Displacement dof role must be bound.", L::NAME));
        }
        if self.properties.is_set(CTE) && !self.properties.is_set(REFERENCE_TEMPERATURE) {
            return Err(eyre!("{}: CTE requires the ReferenceTemperature property.", L::NAME));
        }
        if layout == VoigtLayout::Axisymmetric && !self.properties.is_set(AXISYM_ROTATION_AXIS) {
            return Err(eyre!(
                "{}: axisymmetric model requires the AxisymRotationAxis property.",
                L::NAME
            ));
        }
        self.law.check_properties(&self.properties, layout)
    }

    fn reset_eval_flags(&mut self) {
        self.constitutive_matrix.invalidate();
        self.strain.invalidate();
        self.flux.invalidate();
        self.traction.invalidate();
        self.d_strain.invalidate();
        self.d_flux.invalidate();
        self.d_traction.invalidate();
        self.test_traction.invalidate();
        self.d_test_traction.invalidate();
    }

    fn space_dim(&self) -> usize {
        self.layout().space_dim()
    }

    fn dof_types(&self) -> Vec<DofType> {
        self.dofs.dof_types()
    }

    fn global_dof_types(&self) -> Vec<DofType> {
        merge_dof_types(self.dofs.dof_types(), self.properties.dof_dependencies())
    }

    fn flux(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.ensure_flux(fis);
        self.flux.value()
    }

    fn d_flux_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.ensure_d_flux(dof_type, fis);
        self.d_flux.value(&dof_type)
    }

    fn strain(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.ensure_strain(fis);
        self.strain.value()
    }

    fn d_strain_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.ensure_d_strain(dof_type, fis);
        self.d_strain.value(&dof_type)
    }

    fn traction(&mut self, normal: &DVector<T>, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        if self.traction.is_stale() {
            self.ensure_flux(fis);
            let traction = self.layout().flatten_normal(normal) * self.flux.value();
            self.traction.set(traction);
        }
        self.traction.value()
    }

    fn d_traction_d_dof(
        &mut self,
        dof_type: DofType,
        normal: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        if self.d_traction.is_stale(&dof_type) {
            self.ensure_d_flux(dof_type, fis);
            let d = self.layout().flatten_normal(normal) * self.d_flux.value(&dof_type);
            self.d_traction.set(dof_type, d);
        }
        self.d_traction.value(&dof_type)
    }

    fn test_traction(
        &mut self,
        normal: &DVector<T>,
        test_dof_type: DofType,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        self.ensure_test_traction(normal, test_dof_type, fis);
        self.test_traction.value(&test_dof_type)
    }

    fn d_test_traction_d_dof(
        &mut self,
        dof_type: DofType,
        normal: &DVector<T>,
        jump: &DVector<T>,
        test_dof_type: DofType,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        let key = (dof_type, test_dof_type);
        if self.d_test_traction.is_stale(&key) {
            self.ensure_test_traction(normal, test_dof_type, fis);
            let test_traction_jump = self.test_traction.value(&test_dof_type).tr_mul(jump);
            let d = self
                .law
                .d_test_traction_d_dof(&self.properties, dof_type, &test_traction_jump, fis)
                .unwrap_or_else(|| {
                    DMatrix::zeros(test_traction_jump.len(), self.num_coefficients(dof_type, fis))
                });
            self.d_test_traction.set(key, d);
        }
        self.d_test_traction.value(&key)
    }

    fn constitutive_matrix(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.ensure_constitutive_matrix(fis);
        self.constitutive_matrix.value()
    }

    fn clone_box(&self) -> Box<dyn ConstitutiveModel<T>> {
        Box::new(self.clone())
    }
}
