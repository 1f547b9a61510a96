//! Compressible Van der Waals fluid with capillarity (diffuse interface) stresses.
//!
//! With density `ρ`, velocity `v` and temperature `T`:
//!
//! - pressure `p = ρRT/(1 − bρ) − aρ²`
//! - viscous stress `τ = 2μ ε(v) − 2/3 μ (∇·v) I`
//! - capillary stress `K = Cap [(ρΔρ + ½|∇ρ|²) I − ∇ρ ⊗ ∇ρ]`
//! - stress `σ = τ + K − p I`
//! - total energy `E = ρ(Cv T − aρ) + ½ρ|v|² + ½Cap|∇ρ|²`
//! - flux `σ·v − E v − q − c` with thermal flux `q = −κ∇T` and capillary flux
//!   `c = −Cap ρ (∇·v) ∇ρ`
//!
//! Stresses are stored in Voigt order without shear scaling.
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
use numeric_literals::replace_float_literals;
use std::sync::Arc;

pub const FLUID_DENSITY: usize = 0;
pub const FLUID_VELOCITY: usize = 1;
pub const FLUID_TEMPERATURE: usize = 2;

pub const VAN_DER_WAALS_DOF_ROLES: &[&str] = &["Density", "Velocity", "Temperature"];

pub const ISOCHORIC_HEAT_CAPACITY: usize = 0;
pub const SPECIFIC_GAS_CONSTANT: usize = 1;
pub const DYNAMIC_VISCOSITY: usize = 2;
pub const THERMAL_CONDUCTIVITY: usize = 3;
pub const CAPILLARITY_COEFFICIENT: usize = 4;
pub const FIRST_VDW_CONSTANT: usize = 5;
pub const SECOND_VDW_CONSTANT: usize = 6;

pub const VAN_DER_WAALS_PROPERTY_NAMES: &[&str] = &[
    "IsochoricHeatCapacity",
    "SpecificGasConstant",
    "DynamicViscosity",
    "ThermalConductivity",
    "CapillarityCoefficient",
    "FirstVdWconstant",
    "SecondVdWconstant",
];

const NAME: &str = "FluidCompressibleVdW";

/// Quantities evaluated by [`VanDerWaalsFluid`], each with its own cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VdwQuantity {
    Pressure,
    Strain,
    ViscousStress,
    CapillaryStress,
    Stress,
    Energy,
    WorkFlux,
    EnergyFlux,
    ThermalFlux,
    CapillaryFlux,
    Flux,
}

impl VdwQuantity {
    const COUNT: usize = 11;

    fn index(self) -> usize {
        self as usize
    }
}

/// Field values at the current point.
struct FluidState<T: Real> {
    rho: T,
    grad_rho: DVector<T>,
    laplace_rho: T,
    velocity: DVector<T>,
    /// `grad_velocity[(i, j)] = ∂v_j/∂x_i`
    grad_velocity: DMatrix<T>,
    temperature: T,
    grad_temperature: DVector<T>,
}

impl<T: Real> FluidState<T> {
    fn divergence(&self) -> T {
        self.grad_velocity.trace()
    }
}

/// Material parameters at the current point.
struct FluidProperties<T> {
    cv: T,
    r: T,
    mu: T,
    kappa: T,
    cap: T,
    a: T,
    b: T,
}

#[derive(Debug, Clone)]
pub struct VanDerWaalsFluid<T: Real> {
    dofs: DofRoles,
    properties: PropertyRegistry<T>,
    layout: Option<VoigtLayout>,
    values: Vec<Cached<DVector<T>>>,
    derivatives: DofCached<(VdwQuantity, DofType), DMatrix<T>>,
    traction: Cached<DVector<T>>,
}

impl<T: Real> Default for VanDerWaalsFluid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> VanDerWaalsFluid<T> {
    pub fn new() -> Self {
        Self {
            dofs: DofRoles::new(NAME, VAN_DER_WAALS_DOF_ROLES),
            properties: PropertyRegistry::new(NAME, VAN_DER_WAALS_PROPERTY_NAMES),
            layout: None,
            values: vec![Cached::default(); VdwQuantity::COUNT],
            derivatives: DofCached::default(),
            traction: Cached::default(),
        }
    }

    pub fn properties(&self) -> &PropertyRegistry<T> {
        &self.properties
    }

    /// # Panics
    ///
    /// Panics if no model variant has been selected.
    pub fn layout(&self) -> VoigtLayout {
        self.layout
            .unwrap_or_else(|| panic!("{}: model variant has not been selected.", NAME))
    }

    fn dof(&self, role: usize) -> DofType {
        self.dofs.get(role).unwrap_or_else(|| {
            panic!(
                "{}: dof role \"{}\" has not been set.",
                NAME, VAN_DER_WAALS_DOF_ROLES[role]
            )
        })
    }

    /// Returns the value of a quantity, evaluating it if stale.
    pub fn quantity(&mut self, quantity: VdwQuantity, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.ensure(quantity, fis);
        self.values[quantity.index()].value()
    }

    /// Returns the derivative of a quantity with respect to the coefficients of `dof_type`.
    pub fn d_quantity_d_dof(
        &mut self,
        quantity: VdwQuantity,
        dof_type: DofType,
        fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        self.ensure_derivative(quantity, dof_type, fis);
        self.derivatives.value(&(quantity, dof_type))
    }

    pub fn pressure(&mut self, fis: &FieldInterpolatorManager<T>) -> T {
        self.quantity(VdwQuantity::Pressure, fis)[0]
    }

    pub fn d_pressure_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.d_quantity_d_dof(VdwQuantity::Pressure, dof_type, fis)
    }

    pub fn viscous_stress(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::ViscousStress, fis)
    }

    pub fn capillary_stress(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::CapillaryStress, fis)
    }

    pub fn stress(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::Stress, fis)
    }

    pub fn d_stress_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.d_quantity_d_dof(VdwQuantity::Stress, dof_type, fis)
    }

    pub fn energy(&mut self, fis: &FieldInterpolatorManager<T>) -> T {
        self.quantity(VdwQuantity::Energy, fis)[0]
    }

    pub fn d_energy_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.d_quantity_d_dof(VdwQuantity::Energy, dof_type, fis)
    }

    pub fn work_flux(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::WorkFlux, fis)
    }

    pub fn energy_flux(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::EnergyFlux, fis)
    }

    pub fn thermal_flux(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::ThermalFlux, fis)
    }

    pub fn capillary_flux(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::CapillaryFlux, fis)
    }

    fn state(&self, fis: &FieldInterpolatorManager<T>) -> FluidState<T> {
        let space_dim = self.layout().space_dim();
        let density = fis.field_interpolator(self.dof(FLUID_DENSITY));
        let velocity = fis.field_interpolator(self.dof(FLUID_VELOCITY));
        let temperature = fis.field_interpolator(self.dof(FLUID_TEMPERATURE));
        let d2_rho = density.gradx(2);
        FluidState {
            rho: density.val()[0],
            grad_rho: density.gradx(1).column(0).into_owned(),
            laplace_rho: d2_rho.rows(0, space_dim).sum(),
            velocity: velocity.val(),
            grad_velocity: velocity.gradx(1),
            temperature: temperature.val()[0],
            grad_temperature: temperature.gradx(1).column(0).into_owned(),
        }
    }

    fn material(&self, fis: &FieldInterpolatorManager<T>) -> FluidProperties<T> {
        let p = &self.properties;
        FluidProperties {
            cv: p.scalar(ISOCHORIC_HEAT_CAPACITY, fis),
            r: p.scalar(SPECIFIC_GAS_CONSTANT, fis),
            mu: p.scalar(DYNAMIC_VISCOSITY, fis),
            kappa: p.scalar(THERMAL_CONDUCTIVITY, fis),
            cap: p.scalar(CAPILLARITY_COEFFICIENT, fis),
            a: p.scalar(FIRST_VDW_CONSTANT, fis),
            b: p.scalar(SECOND_VDW_CONSTANT, fis),
        }
    }

    /// Symmetric velocity gradient as a tensor.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn strain_rate_tensor(grad_velocity: &DMatrix<T>) -> DMatrix<T> {
        (grad_velocity + grad_velocity.transpose()) * 0.5
    }

    /// Viscous stress per unit viscosity.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn unit_viscous_tensor(grad_velocity: &DMatrix<T>) -> DMatrix<T> {
        let dim = grad_velocity.nrows();
        Self::strain_rate_tensor(grad_velocity) * 2.0
            - DMatrix::identity(dim, dim) * (2.0 / 3.0 * grad_velocity.trace())
    }

    /// Capillary stress per unit capillarity coefficient.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn unit_capillary_tensor(rho: T, grad_rho: &DVector<T>, laplace_rho: T) -> DMatrix<T> {
        let dim = grad_rho.len();
        DMatrix::identity(dim, dim) * (rho * laplace_rho + 0.5 * grad_rho.norm_squared())
            - grad_rho * grad_rho.transpose()
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn eval_quantity(&mut self, quantity: VdwQuantity, fis: &FieldInterpolatorManager<T>) -> DVector<T> {
        use VdwQuantity::*;
        let layout = self.layout();
        let scalar = |value: T| DVector::from_element(1, value);
        match quantity {
            Pressure => {
                let s = self.state(fis);
                let m = self.material(fis);
                let p = s.rho * m.r * s.temperature / (1.0 - m.b * s.rho) - m.a * s.rho * s.rho;
                scalar(p)
            }
            Strain => {
                let s = self.state(fis);
                layout.tensor_to_voigt(&Self::strain_rate_tensor(&s.grad_velocity))
            }
            ViscousStress => {
                let s = self.state(fis);
                let m = self.material(fis);
                layout.tensor_to_voigt(&(Self::unit_viscous_tensor(&s.grad_velocity) * m.mu))
            }
            CapillaryStress => {
                let s = self.state(fis);
                let m = self.material(fis);
                let k = Self::unit_capillary_tensor(s.rho, &s.grad_rho, s.laplace_rho) * m.cap;
                layout.tensor_to_voigt(&k)
            }
            Stress => {
                let p = self.quantity(Pressure, fis)[0];
                let mut stress = self.quantity(ViscousStress, fis).clone();
                stress += self.quantity(CapillaryStress, fis);
                stress - layout.normal_identity::<T>() * p
            }
            Energy => {
                let s = self.state(fis);
                let m = self.material(fis);
                let e = s.rho * (m.cv * s.temperature - m.a * s.rho)
                    + 0.5 * s.rho * s.velocity.norm_squared()
                    + 0.5 * m.cap * s.grad_rho.norm_squared();
                scalar(e)
            }
            WorkFlux => {
                let velocity = self.state(fis).velocity;
                let sigma = layout.voigt_to_tensor(self.quantity(Stress, fis));
                sigma * velocity
            }
            EnergyFlux => {
                let velocity = self.state(fis).velocity;
                let e = self.quantity(Energy, fis)[0];
                velocity * e
            }
            ThermalFlux => {
                let s = self.state(fis);
                let m = self.material(fis);
                -s.grad_temperature * m.kappa
            }
            CapillaryFlux => {
                let s = self.state(fis);
                let m = self.material(fis);
                &s.grad_rho * (-m.cap * s.rho * s.divergence())
            }
            Flux => {
                let mut flux = self.quantity(WorkFlux, fis).clone();
                flux -= self.quantity(EnergyFlux, fis);
                flux -= self.quantity(ThermalFlux, fis);
                flux -= self.quantity(CapillaryFlux, fis);
                flux
            }
        }
    }

    fn ensure(&mut self, quantity: VdwQuantity, fis: &FieldInterpolatorManager<T>) {
        if self.values[quantity.index()].is_stale() {
            let value = self.eval_quantity(quantity, fis);
            self.values[quantity.index()].set(value);
        }
    }

    fn ensure_derivative(&mut self, quantity: VdwQuantity, dof_type: DofType, fis: &FieldInterpolatorManager<T>) {
        let key = (quantity, dof_type);
        if self.derivatives.is_stale(&key) {
            let d = self.eval_derivative(quantity, dof_type, fis);
            self.derivatives.set(key, d);
        }
    }

    /// Partial derivative of a leaf quantity with respect to the property in `slot`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn property_partial(&self, quantity: VdwQuantity, slot: usize, fis: &FieldInterpolatorManager<T>) -> Option<DVector<T>> {
        use VdwQuantity::*;
        let layout = self.layout();
        let s = self.state(fis);
        let m = self.material(fis);
        let scalar = |value: T| Some(DVector::from_element(1, value));
        let denominator = 1.0 - m.b * s.rho;
        match (quantity, slot) {
            (Pressure, SPECIFIC_GAS_CONSTANT) => scalar(s.rho * s.temperature / denominator),
            (Pressure, FIRST_VDW_CONSTANT) => scalar(-s.rho * s.rho),
            (Pressure, SECOND_VDW_CONSTANT) => {
                scalar(s.rho * s.rho * m.r * s.temperature / (denominator * denominator))
            }
            (ViscousStress, DYNAMIC_VISCOSITY) => {
                Some(layout.tensor_to_voigt(&Self::unit_viscous_tensor(&s.grad_velocity)))
            }
            (CapillaryStress, CAPILLARITY_COEFFICIENT) => Some(layout.tensor_to_voigt(
                &Self::unit_capillary_tensor(s.rho, &s.grad_rho, s.laplace_rho),
            )),
            (Energy, ISOCHORIC_HEAT_CAPACITY) => scalar(s.rho * s.temperature),
            (Energy, FIRST_VDW_CONSTANT) => scalar(-s.rho * s.rho),
            (Energy, CAPILLARITY_COEFFICIENT) => scalar(0.5 * s.grad_rho.norm_squared()),
            (ThermalFlux, THERMAL_CONDUCTIVITY) => Some(-s.grad_temperature),
            (CapillaryFlux, CAPILLARITY_COEFFICIENT) => Some(&s.grad_rho * (-s.rho * s.divergence())),
            _ => None,
        }
    }

    /// Adds `∂quantity/∂property * d property/d dof` for every property depending on `dof_type`.
    fn add_property_terms(
        &self,
        quantity: VdwQuantity,
        dof_type: DofType,
        fis: &FieldInterpolatorManager<T>,
        d: &mut DMatrix<T>,
    ) {
        for slot in 0..VAN_DER_WAALS_PROPERTY_NAMES.len() {
            if !self.properties.depends_on(slot, dof_type) {
                continue;
            }
            if let Some(partial) = self.property_partial(quantity, slot, fis) {
                let d_prop = self.properties.require(slot).d_prop_d_dof(dof_type, fis);
                *d += partial * d_prop;
            }
        }
    }

    /// Converts each Voigt column of `d_voigt` to a tensor and contracts it with `vector`.
    fn contract_voigt_columns(layout: VoigtLayout, d_voigt: &DMatrix<T>, vector: &DVector<T>) -> DMatrix<T> {
        let mut result = DMatrix::zeros(vector.len(), d_voigt.ncols());
        for (col, column) in d_voigt.column_iter().enumerate() {
            let tensor = layout.voigt_to_tensor(&column.into_owned());
            result.set_column(col, &(tensor * vector));
        }
        result
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn eval_derivative(&mut self, quantity: VdwQuantity, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        use VdwQuantity::*;
        let layout = self.layout();
        let num_coefficients = fis.num_coefficients(dof_type);
        let is_density = self.dofs.get(FLUID_DENSITY) == Some(dof_type);
        let is_velocity = self.dofs.get(FLUID_VELOCITY) == Some(dof_type);
        let is_temperature = self.dofs.get(FLUID_TEMPERATURE) == Some(dof_type);
        let dim = layout.space_dim();

        // Composite quantities are assembled from the derivatives of their parts.
        match quantity {
            Stress => {
                let d_p = self.d_quantity_d_dof(Pressure, dof_type, fis).clone();
                let mut d = self.d_quantity_d_dof(ViscousStress, dof_type, fis).clone();
                d += self.d_quantity_d_dof(CapillaryStress, dof_type, fis);
                return d - layout.normal_identity::<T>() * d_p;
            }
            WorkFlux => {
                let s = self.state(fis);
                let d_sigma = self.d_quantity_d_dof(Stress, dof_type, fis).clone();
                let mut d = Self::contract_voigt_columns(layout, &d_sigma, &s.velocity);
                if is_velocity {
                    let sigma = layout.voigt_to_tensor(self.quantity(Stress, fis));
                    d += sigma * fis.field_interpolator(dof_type).n();
                }
                return d;
            }
            EnergyFlux => {
                let s = self.state(fis);
                let d_e = self.d_quantity_d_dof(Energy, dof_type, fis).clone();
                let mut d = &s.velocity * d_e;
                if is_velocity {
                    let e = self.quantity(Energy, fis)[0];
                    d += fis.field_interpolator(dof_type).n() * e;
                }
                return d;
            }
            Flux => {
                let mut d = self.d_quantity_d_dof(WorkFlux, dof_type, fis).clone();
                d -= self.d_quantity_d_dof(EnergyFlux, dof_type, fis);
                d -= self.d_quantity_d_dof(ThermalFlux, dof_type, fis);
                d -= self.d_quantity_d_dof(CapillaryFlux, dof_type, fis);
                return d;
            }
            _ => {}
        }

        let num_rows = match quantity {
            Pressure | Energy => 1,
            Strain | ViscousStress | CapillaryStress => layout.num_components(),
            _ => dim,
        };
        let mut d = DMatrix::zeros(num_rows, num_coefficients);
        let s = self.state(fis);
        let m = self.material(fis);
        let fi = fis.field_interpolator(dof_type);

        match quantity {
            Pressure => {
                let denominator = 1.0 - m.b * s.rho;
                if is_density {
                    let dp_drho = m.r * s.temperature / (denominator * denominator) - 2.0 * m.a * s.rho;
                    d += fi.n() * dp_drho;
                }
                if is_temperature {
                    d += fi.n() * (m.r * s.rho / denominator);
                }
            }
            Strain | ViscousStress if is_velocity => {
                let dndx = fi.dnndxn(1);
                let nb = fi.number_of_space_time_bases();
                for k in 0..dim {
                    for b in 0..nb {
                        let mut perturbation = DMatrix::zeros(dim, dim);
                        perturbation.set_column(k, &dndx.column(b));
                        let tensor = match quantity {
                            Strain => Self::strain_rate_tensor(&perturbation),
                            _ => Self::unit_viscous_tensor(&perturbation) * m.mu,
                        };
                        d.set_column(k * nb + b, &layout.tensor_to_voigt(&tensor));
                    }
                }
            }
            CapillaryStress if is_density => {
                let n = fi.n();
                let dndx = fi.dnndxn(1);
                let laplace_n = fi.dnndxn(2).rows(0, dim).row_sum();
                for b in 0..fi.number_of_space_time_bases() {
                    let grad_n = dndx.column(b).into_owned();
                    let trace_part = n[(0, b)] * s.laplace_rho + s.rho * laplace_n[b] + s.grad_rho.dot(&grad_n);
                    let tensor = (DMatrix::identity(dim, dim) * trace_part
                        - &grad_n * s.grad_rho.transpose()
                        - &s.grad_rho * grad_n.transpose())
                        * m.cap;
                    d.set_column(b, &layout.tensor_to_voigt(&tensor));
                }
            }
            Energy => {
                if is_density {
                    let factor = m.cv * s.temperature - 2.0 * m.a * s.rho + 0.5 * s.velocity.norm_squared();
                    d += fi.n() * factor + s.grad_rho.transpose() * fi.dnndxn(1) * m.cap;
                }
                if is_temperature {
                    d += fi.n() * (s.rho * m.cv);
                }
                if is_velocity {
                    d += s.velocity.transpose() * fi.n() * s.rho;
                }
            }
            ThermalFlux if is_temperature => {
                d -= fi.dnndxn(1) * m.kappa;
            }
            CapillaryFlux => {
                if is_density {
                    let div = s.divergence();
                    d -= (&s.grad_rho * fi.n() * div + fi.dnndxn(1) * (s.rho * div)) * m.cap;
                }
                if is_velocity {
                    // ∂(∇·v)/∂(v_k, b) = ∂N_b/∂x_k
                    let dndx = fi.dnndxn(1);
                    let nb = fi.number_of_space_time_bases();
                    let mut d_div = DMatrix::zeros(1, num_coefficients);
                    for k in 0..dim {
                        d_div.view_mut((0, k * nb), (1, nb)).copy_from(&dndx.row(k));
                    }
                    d -= &s.grad_rho * d_div * (m.cap * s.rho);
                }
            }
            _ => {}
        }

        self.add_property_terms(quantity, dof_type, fis, &mut d);
        d
    }
}

impl<T: Real> ConstitutiveModel<T> for VanDerWaalsFluid<T> {
    fn name(&self) -> &'static str {
        NAME
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
        if !matches!(layout, VoigtLayout::PlaneStrain | VoigtLayout::Full3d) || tensor_type != TensorType::Full {
            return Err(eyre!(
                "{}: unsupported variant {:?} with {:?} tensor (use plane strain in 2D, full in 3D).",
                NAME,
                model_type,
                tensor_type
            ));
        }
        debug!("{}: selected {:?} layout", NAME, layout);
        self.layout = Some(layout);
        self.reset_eval_flags();
        Ok(())
    }

    fn set_local_properties(&mut self) -> eyre::Result<()> {
        if self.layout.is_none() {
            return Err(eyre!("{}: select a model variant before checking properties.", NAME));
        }
        for role in [FLUID_DENSITY, FLUID_VELOCITY, FLUID_TEMPERATURE] {
            if self.dofs.get(role).is_none() {
                return Err(eyre!(
                    "{}: the {} dof role must be bound.",
                    NAME,
                    VAN_DER_WAALS_DOF_ROLES[role]
                ));
            }
        }
        for (slot, name) in VAN_DER_WAALS_PROPERTY_NAMES.iter().enumerate() {
            if !self.properties.is_set(slot) {
                return Err(eyre!("{}: required property \"{}\" has not been set.", NAME, name));
            }
        }
        Ok(())
    }

    fn reset_eval_flags(&mut self) {
        for value in &mut self.values {
            value.invalidate();
        }
        self.derivatives.invalidate();
        self.traction.invalidate();
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
        self.quantity(VdwQuantity::Flux, fis)
    }

    fn d_flux_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.d_quantity_d_dof(VdwQuantity::Flux, dof_type, fis)
    }

    fn strain(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        self.quantity(VdwQuantity::Strain, fis)
    }

    fn d_strain_d_dof(&mut self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        self.d_quantity_d_dof(VdwQuantity::Strain, dof_type, fis)
    }

    fn traction(&mut self, normal: &DVector<T>, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        if self.traction.is_stale() {
            let layout = self.layout();
            let traction = layout.flatten_normal(normal) * self.stress(fis);
            self.traction.set(traction);
        }
        self.traction.value()
    }

    fn d_traction_d_dof(
        &mut self,
        _dof_type: DofType,
        _normal: &DVector<T>,
        _fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        panic!("{}: traction derivative is not implemented.", NAME)
    }

    fn test_traction(
        &mut self,
        _normal: &DVector<T>,
        _test_dof_type: DofType,
        _fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        panic!("{}: test traction is not implemented.", NAME)
    }

    fn d_test_traction_d_dof(
        &mut self,
        _dof_type: DofType,
        _normal: &DVector<T>,
        _jump: &DVector<T>,
        _test_dof_type: DofType,
        _fis: &FieldInterpolatorManager<T>,
    ) -> &DMatrix<T> {
        panic!("{}: test traction derivative is not implemented.", NAME)
    }

    fn constitutive_matrix(&mut self, _fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        panic!("{}: constitutive matrix is not implemented.", NAME)
    }

    fn clone_box(&self) -> Box<dyn ConstitutiveModel<T>> {
        Box::new(self.clone())
    }
}
