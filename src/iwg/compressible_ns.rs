//! Compressible Navier-Stokes in pressure-primitive variables `Y = [p, v, T]` for an ideal gas.
//!
//! The conservative variables `U = [ρ, ρv, ρ e_tot]` with `ρ = p / (R T)` and
//! `e_tot = c_v T + |v|² / 2` are never formed. Instead the system is written in quasi-linear form
//! with the flux Jacobians `A(0) = dU/dY` and `A(j + 1) = dF_j/dY` and the diffusion matrices
//! `K(i, j)` that map `Y_{,j}` to the viscous flux in direction `i`.
use crate::cache::Cached;
use crate::dof::{DofRoles, DofType};
use crate::field_interpolator::FieldInterpolatorManager;
use crate::iwg::{second_derivative_index, ElementSet, IntegrationPoint, Iwg, Side, TestFunctionSet, VariableSet};
use crate::property::{Property, PropertyRegistry};
use eyre::eyre;
use itertools::iproduct;
use log::debug;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

pub const COMPRESSIBLE_NS_DOF_ROLES: &[&str] = &["Pressure", "Velocity", "Temperature"];

pub const DYNAMIC_VISCOSITY: usize = 0;
pub const THERMAL_CONDUCTIVITY: usize = 1;
pub const ISOCHORIC_HEAT_CAPACITY: usize = 2;
pub const SPECIFIC_GAS_CONSTANT: usize = 3;
pub const BODY_FORCE: usize = 4;
pub const BODY_HEAT_LOAD: usize = 5;

pub const COMPRESSIBLE_NS_PROPERTY_NAMES: &[&str] = &[
    "DynamicViscosity",
    "ThermalConductivity",
    "IsochoricHeatCapacity",
    "SpecificGasConstant",
    "BodyForce",
    "BodyHeatLoad",
];

const NAME: &str = "CompressibleNsBulk";

/// Forward-mode dual number carrying the derivative with respect to one state variable.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Dual<T> {
    value: T,
    derivative: T,
}

impl<T: Real> Dual<T> {
    fn constant(value: T) -> Self {
        Self {
            value,
            derivative: T::zero(),
        }
    }

    fn variable(value: T, seeded: bool) -> Self {
        Self {
            value,
            derivative: if seeded { T::one() } else { T::zero() },
        }
    }
}

impl<T: Real> Add for Dual<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            derivative: self.derivative + rhs.derivative,
        }
    }
}

impl<T: Real> Sub for Dual<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
            derivative: self.derivative - rhs.derivative,
        }
    }
}

impl<T: Real> Mul for Dual<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            value: self.value * rhs.value,
            derivative: self.derivative * rhs.value + self.value * rhs.derivative,
        }
    }
}

impl<T: Real> Div for Dual<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self {
            value: self.value / rhs.value,
            derivative: (self.derivative * rhs.value - self.value * rhs.derivative) / (rhs.value * rhs.value),
        }
    }
}

impl<T: Real> Neg for Dual<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: -self.value,
            derivative: -self.derivative,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct GasProperties<T> {
    viscosity: T,
    conductivity: T,
    heat_capacity: T,
    gas_constant: T,
}

/// Thermodynamic symbols at the current state, differentiated with respect to at most one state
/// variable.
#[derive(Debug, Clone)]
struct GasState<T> {
    pressure: Dual<T>,
    velocity: Vec<Dual<T>>,
    density: Dual<T>,
    density_p: Dual<T>,
    density_t: Dual<T>,
    total_energy: Dual<T>,
    heat_capacity: Dual<T>,
    viscosity: Dual<T>,
    conductivity: Dual<T>,
}

impl<T: Real> GasState<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn new(y: &DVector<T>, seed: Option<usize>, gas: &GasProperties<T>) -> Self {
        let space_dim = y.len() - 2;
        let variable = |m: usize| Dual::variable(y[m], seed == Some(m));

        let pressure = variable(0);
        let velocity: Vec<_> = (0..space_dim).map(|k| variable(1 + k)).collect();
        let temperature = variable(space_dim + 1);

        let gas_constant = Dual::constant(gas.gas_constant);
        let heat_capacity = Dual::constant(gas.heat_capacity);
        let density = pressure / (gas_constant * temperature);
        let kinetic = velocity
            .iter()
            .fold(Dual::constant(0.0), |acc, &v_k| acc + v_k * v_k);

        Self {
            pressure,
            density,
            density_p: Dual::constant(1.0) / (gas_constant * temperature),
            density_t: -density / temperature,
            total_energy: heat_capacity * temperature + Dual::constant(0.5) * kinetic,
            heat_capacity,
            viscosity: Dual::constant(gas.viscosity),
            conductivity: Dual::constant(gas.conductivity),
            velocity,
        }
    }

    fn space_dim(&self) -> usize {
        self.velocity.len()
    }

    fn zero(&self) -> Dual<T> {
        Dual::constant(T::zero())
    }

    fn delta(&self, a: usize, b: usize) -> Dual<T> {
        Dual::constant(if a == b { T::one() } else { T::zero() })
    }

    /// `A(0)` for `k == 0`, the convective flux Jacobian in direction `k - 1` otherwise.
    fn flux_jacobian(&self, k: usize) -> DMatrix<Dual<T>> {
        let d = self.space_dim();
        let e = d + 1;
        let v = &self.velocity;
        let mut a = DMatrix::from_element(d + 2, d + 2, self.zero());

        if k == 0 {
            a[(0, 0)] = self.density_p;
            a[(0, e)] = self.density_t;
            for i in 0..d {
                a[(1 + i, 0)] = self.density_p * v[i];
                a[(1 + i, 1 + i)] = self.density;
                a[(1 + i, e)] = self.density_t * v[i];
                a[(e, 1 + i)] = self.density * v[i];
            }
            a[(e, 0)] = self.density_p * self.total_energy;
            a[(e, e)] = self.density_t * self.total_energy + self.density * self.heat_capacity;
        } else {
            let j = k - 1;
            let v_j = v[j];
            let enthalpy = self.density * self.total_energy + self.pressure;

            a[(0, 0)] = self.density_p * v_j;
            a[(0, 1 + j)] = self.density;
            a[(0, e)] = self.density_t * v_j;
            for i in 0..d {
                a[(1 + i, 0)] = self.density_p * v[i] * v_j + self.delta(i, j);
                for l in 0..d {
                    a[(1 + i, 1 + l)] = self.density * (self.delta(i, l) * v_j + v[i] * self.delta(j, l));
                }
                a[(1 + i, e)] = self.density_t * v[i] * v_j;
                a[(e, 1 + i)] = self.density * v[i] * v_j + enthalpy * self.delta(j, i);
            }
            a[(e, 0)] = (self.density_p * self.total_energy + Dual::constant(T::one())) * v_j;
            a[(e, e)] = (self.density_t * self.total_energy + self.density * self.heat_capacity) * v_j;
        }
        a
    }

    /// `K(i, j)` with Stokes' hypothesis `λ = -2/3 μ`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn diffusion_matrix(&self, i: usize, j: usize) -> DMatrix<Dual<T>> {
        let d = self.space_dim();
        let e = d + 1;
        let mu = self.viscosity;
        let lambda = Dual::constant(-2.0 / 3.0) * mu;
        let mut k = DMatrix::from_element(d + 2, d + 2, self.zero());

        for (m, l) in iproduct!(0..d, 0..d) {
            k[(1 + m, 1 + l)] = mu * (self.delta(i, j) * self.delta(m, l) + self.delta(j, m) * self.delta(i, l))
                + lambda * self.delta(i, m) * self.delta(j, l);
        }
        for l in 0..d {
            k[(e, 1 + l)] = (0..d).fold(self.zero(), |acc, m| acc + self.velocity[m] * k[(1 + m, 1 + l)]);
        }
        k[(e, e)] = self.conductivity * self.delta(i, j);
        k
    }

    /// `S = [0, ρ f, ρ f·v + Q]`.
    fn source(&self, body_force: Option<&DVector<T>>, heat_load: Option<T>) -> DVector<Dual<T>> {
        let d = self.space_dim();
        let mut s = DVector::from_element(d + 2, self.zero());
        if let Some(force) = body_force {
            for k in 0..d {
                let f_k = Dual::constant(force[k]);
                s[1 + k] = self.density * f_k;
                s[d + 1] = s[d + 1] + self.density * f_k * self.velocity[k];
            }
        }
        if let Some(q) = heat_load {
            s[d + 1] = s[d + 1] + Dual::constant(q);
        }
        s
    }
}

fn values<T: Real>(m: &DMatrix<Dual<T>>) -> DMatrix<T> {
    m.map(|x| x.value)
}

fn derivatives<T: Real>(m: &DMatrix<Dual<T>>) -> DMatrix<T> {
    m.map(|x| x.derivative)
}

/// Galerkin bulk term of the compressible Navier-Stokes equations.
///
/// The residual is
/// `w [Wᵀ (A(0) Y_t + Σ_i A(i+1) Y_{,i} - S) + Σ_i W_{,i}ᵀ Σ_j K(i, j) Y_{,j}]`
/// with an exact Jacobian. The strong-form operator [`residual_strong_form`](Self::residual_strong_form)
/// and its derivative are exposed for stabilization terms.
#[derive(Debug, Clone)]
pub struct CompressibleNsBulkIwg<T: Real> {
    space_dim: usize,
    dofs: DofRoles,
    properties: PropertyRegistry<T>,
    variables: VariableSet<T>,
    test_functions: TestFunctionSet<T>,

    a: Vec<Cached<DMatrix<T>>>,
    k: Cached<Vec<DMatrix<T>>>,
    kiji: Cached<Vec<DMatrix<T>>>,
    l: Cached<DVector<T>>,
    dl: Cached<DMatrix<T>>,
}

impl<T: Real> CompressibleNsBulkIwg<T> {
    /// Creates the IWG with the default dof groups `[P, VX, TEMP]`.
    pub fn new(space_dim: usize) -> eyre::Result<Self> {
        if !(2..=3).contains(&space_dim) {
            return Err(eyre!("{}: unsupported space dimension {}.", NAME, space_dim));
        }
        let mut iwg = Self {
            space_dim,
            dofs: DofRoles::new(NAME, COMPRESSIBLE_NS_DOF_ROLES),
            properties: PropertyRegistry::new(NAME, COMPRESSIBLE_NS_PROPERTY_NAMES),
            variables: VariableSet::new(Vec::new()),
            test_functions: TestFunctionSet::new(Vec::new()),
            a: (0..=space_dim).map(|_| Cached::default()).collect(),
            k: Cached::default(),
            kiji: Cached::default(),
            l: Cached::default(),
            dl: Cached::default(),
        };
        iwg.set_dof_type_list(&[DofType::P, DofType::VX, DofType::TEMP], COMPRESSIBLE_NS_DOF_ROLES)?;
        Ok(iwg)
    }

    /// Binds the pressure, velocity and temperature roles. All three must end up bound.
    pub fn set_dof_type_list(&mut self, dof_types: &[DofType], role_names: &[&str]) -> eyre::Result<()> {
        self.dofs.set(dof_types, role_names)?;
        let bound = self.dofs.dof_types();
        if bound.len() != COMPRESSIBLE_NS_DOF_ROLES.len() {
            return Err(eyre!(
                "{}: all of the roles {} must be bound.",
                NAME,
                COMPRESSIBLE_NS_DOF_ROLES.join(", ")
            ));
        }
        debug!("{}: state variables {:?}", NAME, bound);
        self.variables = VariableSet::new(bound.clone());
        self.test_functions = TestFunctionSet::new(bound);
        Ok(())
    }

    pub fn set_property(&mut self, property: Arc<dyn Property<T>>, name: &str) -> eyre::Result<()> {
        self.properties.set(property, name)
    }

    /// Checks that the gas properties have been bound.
    pub fn check_properties(&self) -> eyre::Result<()> {
        for slot in [
            DYNAMIC_VISCOSITY,
            THERMAL_CONDUCTIVITY,
            ISOCHORIC_HEAT_CAPACITY,
            SPECIFIC_GAS_CONSTANT,
        ] {
            if !self.properties.is_set(slot) {
                return Err(eyre!(
                    "{}: required property \"{}\" has not been set.",
                    NAME,
                    COMPRESSIBLE_NS_PROPERTY_NAMES[slot]
                ));
            }
        }
        Ok(())
    }

    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    pub fn num_state_variables(&self) -> usize {
        self.space_dim + 2
    }

    pub fn reset_spec_eval_flags(&mut self) {
        self.variables.reset_spec_eval_flags();
        self.test_functions.reset_spec_eval_flags();
        self.a.iter_mut().for_each(Cached::invalidate);
        self.k.invalidate();
        self.kiji.invalidate();
        self.l.invalidate();
        self.dl.invalidate();
    }

    pub fn variables(&mut self) -> &mut VariableSet<T> {
        &mut self.variables
    }

    pub fn test_functions(&mut self) -> &mut TestFunctionSet<T> {
        &mut self.test_functions
    }

    fn gas_properties(&self, fis: &FieldInterpolatorManager<T>) -> GasProperties<T> {
        GasProperties {
            viscosity: self.properties.scalar(DYNAMIC_VISCOSITY, fis),
            conductivity: self.properties.scalar(THERMAL_CONDUCTIVITY, fis),
            heat_capacity: self.properties.scalar(ISOCHORIC_HEAT_CAPACITY, fis),
            gas_constant: self.properties.scalar(SPECIFIC_GAS_CONSTANT, fis),
        }
    }

    fn gas_state(&mut self, seed: Option<usize>, fis: &FieldInterpolatorManager<T>) -> GasState<T> {
        let gas = self.gas_properties(fis);
        let y = self.variables.y(fis);
        GasState::new(y, seed, &gas)
    }

    /// # Panics
    ///
    /// Panics if any property depends on a dof.
    fn assert_constant_properties(&self) {
        let dependencies = self.properties.dof_dependencies();
        if !dependencies.is_empty() {
            panic!(
                "{}: dof-dependent properties are not implemented (found dependencies on {:?}).",
                NAME, dependencies
            );
        }
    }

    /// Flux Jacobian `A(k)`: `A(0) = dU/dY`, `A(j + 1) = dF_j/dY`.
    pub fn a(&mut self, k: usize, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        assert!(k <= self.space_dim, "Flux Jacobian index {} out of bounds.", k);
        if self.a[k].is_stale() {
            let a = values(&self.gas_state(None, fis).flux_jacobian(k));
            self.a[k].set(a);
        }
        self.a[k].value()
    }

    /// Diffusion matrix `K(i, j)`.
    pub fn k(&mut self, i: usize, j: usize, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        let d = self.space_dim;
        assert!(i < d && j < d, "Diffusion matrix index ({}, {}) out of bounds.", i, j);
        if self.k.is_stale() {
            let state = self.gas_state(None, fis);
            let k = iproduct!(0..d, 0..d)
                .map(|(i, j)| values(&state.diffusion_matrix(i, j)))
                .collect();
            self.k.set(k);
        }
        &self.k.value()[i * d + j]
    }

    /// Divergence of the diffusion matrices, `Kiji(j) = Σ_i d K(i, j) / d x_i`.
    pub fn kiji(&mut self, j: usize, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        let d = self.space_dim;
        assert!(j < d, "Diffusion divergence index {} out of bounds.", j);
        if self.kiji.is_stale() {
            let n = self.num_state_variables();
            let dydx = self.variables.dydx(fis).clone();
            let mut kiji = vec![DMatrix::zeros(n, n); d];
            for m in 0..n {
                let state = self.gas_state(Some(m), fis);
                for (i, jj) in iproduct!(0..d, 0..d) {
                    kiji[jj] += derivatives(&state.diffusion_matrix(i, jj)) * dydx[(i, m)];
                }
            }
            self.kiji.set(kiji);
        }
        &self.kiji.value()[j]
    }

    /// Source vector `S`.
    pub fn source(&mut self, fis: &FieldInterpolatorManager<T>) -> DVector<T> {
        let (force, heat) = self.sources(fis);
        self.gas_state(None, fis)
            .source(force.as_ref(), heat)
            .map(|x| x.value)
    }

    fn sources(&self, fis: &FieldInterpolatorManager<T>) -> (Option<DVector<T>>, Option<T>) {
        let force = self
            .properties
            .get(BODY_FORCE)
            .map(|property| property.val(fis));
        let heat = self
            .properties
            .get(BODY_HEAT_LOAD)
            .map(|property| property.val(fis)[0]);
        (force, heat)
    }

    /// Applies `seeded(state)` once per state variable and stacks `derivative * vr` column-wise.
    fn derivative_columns(
        &mut self,
        vr: &DVector<T>,
        fis: &FieldInterpolatorManager<T>,
        seeded: impl Fn(&GasState<T>) -> DMatrix<Dual<T>>,
    ) -> DMatrix<T> {
        let n = self.num_state_variables();
        let mut result = DMatrix::zeros(n, n);
        for m in 0..n {
            let state = self.gas_state(Some(m), fis);
            result.set_column(m, &(derivatives(&seeded(&state)) * vr));
        }
        result
    }

    /// The matrix whose `m`-th column is `dA(k)/dY_m * vr`.
    pub fn eval_da_dy_vr(&mut self, k: usize, vr: &DVector<T>, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        self.derivative_columns(vr, fis, |state| state.flux_jacobian(k))
    }

    /// The matrix whose `m`-th column is `dK(i, j)/dY_m * vr`.
    pub fn eval_dk_dy_vr(&mut self, i: usize, j: usize, vr: &DVector<T>, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        self.derivative_columns(vr, fis, |state| state.diffusion_matrix(i, j))
    }

    /// Derivative of `Kiji(j) * vr` with respect to the coefficients, `num_state_variables x
    /// num_coefficients`. `K` is affine in `Y`, so only the state gradient contributes.
    pub fn eval_dkiji_dy_vr(&mut self, j: usize, vr: &DVector<T>, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        let dwdx = self.test_functions.dwdx(fis).to_vec();
        let mut result = DMatrix::zeros(self.num_state_variables(), dwdx[0].ncols());
        for (i, dwdx_i) in dwdx.iter().enumerate() {
            result += self.eval_dk_dy_vr(i, j, vr, fis) * dwdx_i;
        }
        result
    }

    /// `dS/dY`, one column per state variable.
    fn eval_ds_dy(&mut self, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        let n = self.num_state_variables();
        let (force, heat) = self.sources(fis);
        let mut result = DMatrix::zeros(n, n);
        for m in 0..n {
            let source = self.gas_state(Some(m), fis).source(force.as_ref(), heat);
            result.set_column(m, &source.map(|x| x.derivative));
        }
        result
    }

    /// Strong-form operator
    /// `L(Y) = A(0) Y_t + Σ_j (A(j+1) - Kiji(j)) Y_{,j} - Σ_i Σ_j K(i, j) Y_{,ij} - S`.
    pub fn residual_strong_form(&mut self, fis: &FieldInterpolatorManager<T>) -> &DVector<T> {
        if self.l.is_stale() {
            let d = self.space_dim;
            let yt = self.variables.dydt(fis).clone();
            let dydx = self.variables.dydx(fis).clone();
            let d2ydx2 = self.variables.d2ydx2(fis).clone();

            let mut l = self.a(0, fis) * &yt;
            for j in 0..d {
                let y_j = dydx.row(j).transpose();
                let operator = self.a(j + 1, fis).clone() - self.kiji(j, fis);
                l += operator * y_j;
            }
            for (i, j) in iproduct!(0..d, 0..d) {
                let y_ij = d2ydx2.row(second_derivative_index(d, i, j)).transpose();
                l -= self.k(i, j, fis) * y_ij;
            }
            l -= self.source(fis);
            self.l.set(l);
        }
        self.l.value()
    }

    /// Derivative of [`residual_strong_form`](Self::residual_strong_form) with respect to the
    /// coefficients of all state dof groups, `num_state_variables x num_coefficients`.
    ///
    /// # Panics
    ///
    /// Panics if any property depends on a dof.
    pub fn d_residual_strong_form(&mut self, fis: &FieldInterpolatorManager<T>) -> &DMatrix<T> {
        if self.dl.is_stale() {
            self.assert_constant_properties();
            let d = self.space_dim;
            let yt = self.variables.dydt(fis).clone();
            let dydx = self.variables.dydx(fis).clone();
            let d2ydx2 = self.variables.d2ydx2(fis).clone();
            let w = self.test_functions.w(fis).clone();
            let dwdt = self.test_functions.dwdt(fis).clone();
            let dwdx = self.test_functions.dwdx(fis).to_vec();
            let d2wdx2 = self.test_functions.d2wdx2(fis).to_vec();

            let mut dl = self.a(0, fis) * &dwdt;
            dl += self.eval_da_dy_vr(0, &yt, fis) * &w;
            for j in 0..d {
                let y_j = dydx.row(j).transpose();
                let operator = self.a(j + 1, fis).clone() - self.kiji(j, fis);
                dl += operator * &dwdx[j];
                dl += self.eval_da_dy_vr(j + 1, &y_j, fis) * &w;
                dl -= self.eval_dkiji_dy_vr(j, &y_j, fis);
            }
            for (i, j) in iproduct!(0..d, 0..d) {
                let index = second_derivative_index(d, i, j);
                let y_ij = d2ydx2.row(index).transpose();
                dl -= self.k(i, j, fis) * &d2wdx2[index];
                dl -= self.eval_dk_dy_vr(i, j, &y_ij, fis) * &w;
            }
            dl -= self.eval_ds_dy(fis) * &w;
            self.dl.set(dl);
        }
        self.dl.value()
    }

    /// Unweighted Galerkin residual over all state coefficients.
    pub fn galerkin_residual(&mut self, fis: &FieldInterpolatorManager<T>) -> DVector<T> {
        let d = self.space_dim;
        let yt = self.variables.dydt(fis).clone();
        let dydx = self.variables.dydx(fis).clone();
        let w = self.test_functions.w(fis).clone();
        let dwdx = self.test_functions.dwdx(fis).to_vec();

        let mut strong = self.a(0, fis) * &yt;
        for i in 0..d {
            strong += self.a(i + 1, fis) * dydx.row(i).transpose();
        }
        strong -= self.source(fis);

        let mut r = w.tr_mul(&strong);
        for (i, j) in iproduct!(0..d, 0..d) {
            let viscous = self.k(i, j, fis) * dydx.row(j).transpose();
            r += dwdx[i].tr_mul(&viscous);
        }
        r
    }

    /// Exact derivative of [`galerkin_residual`](Self::galerkin_residual).
    ///
    /// # Panics
    ///
    /// Panics if any property depends on a dof.
    pub fn galerkin_jacobian(&mut self, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        self.assert_constant_properties();
        let d = self.space_dim;
        let yt = self.variables.dydt(fis).clone();
        let dydx = self.variables.dydx(fis).clone();
        let w = self.test_functions.w(fis).clone();
        let dwdt = self.test_functions.dwdt(fis).clone();
        let dwdx = self.test_functions.dwdx(fis).to_vec();

        let mut d_strong = self.a(0, fis) * &dwdt;
        d_strong += self.eval_da_dy_vr(0, &yt, fis) * &w;
        for i in 0..d {
            let y_i = dydx.row(i).transpose();
            d_strong += self.a(i + 1, fis) * &dwdx[i];
            d_strong += self.eval_da_dy_vr(i + 1, &y_i, fis) * &w;
        }
        d_strong -= self.eval_ds_dy(fis) * &w;

        let mut jacobian = w.tr_mul(&d_strong);
        for (i, j) in iproduct!(0..d, 0..d) {
            let y_j = dydx.row(j).transpose();
            let mut d_viscous = self.k(i, j, fis) * &dwdx[j];
            d_viscous += self.eval_dk_dy_vr(i, j, &y_j, fis) * &w;
            jacobian += dwdx[i].tr_mul(&d_viscous);
        }
        jacobian
    }
}

impl<T: Real> Iwg<T> for CompressibleNsBulkIwg<T> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn residual_dof_types(&self) -> Vec<DofType> {
        self.dofs.dof_types()
    }

    fn requested_dof_types(&self) -> Vec<DofType> {
        self.dofs.dof_types()
    }

    fn reset_eval_flags(&mut self) {
        self.reset_spec_eval_flags();
    }

    fn compute_residual(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>) {
        let fis = point.leader;
        let r = self.galerkin_residual(fis) * point.weight;
        let mut offset = 0;
        for dof_type in self.residual_dof_types() {
            let n = fis.num_coefficients(dof_type);
            set.add_residual_block(Side::Leader, dof_type, &r.rows(offset, n).into_owned());
            offset += n;
        }
    }

    fn compute_jacobian(&mut self, point: &IntegrationPoint<T>, set: &mut ElementSet<T>) {
        let fis = point.leader;
        let jacobian = self.galerkin_jacobian(fis) * point.weight;
        let dof_types = self.residual_dof_types();
        let mut row = 0;
        for &row_dof in &dof_types {
            let num_rows = fis.num_coefficients(row_dof);
            let mut col = 0;
            for &col_dof in &dof_types {
                let num_cols = fis.num_coefficients(col_dof);
                let block = jacobian.view((row, col), (num_rows, num_cols)).into_owned();
                set.add_jacobian_block((Side::Leader, row_dof), (Side::Leader, col_dof), &block);
                col += num_cols;
            }
            row += num_rows;
        }
    }

    fn clone_box(&self) -> Box<dyn Iwg<T>> {
        Box::new(self.clone())
    }
}
