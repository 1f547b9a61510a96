//! Material parameters that may vary with the unknown fields.
use crate::dof::DofType;
use crate::field_interpolator::FieldInterpolatorManager;
use eyre::eyre;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::sync::Arc;

/// A scalar or vector material parameter evaluated at the current integration point.
///
/// Callers must consult [`check_dof_dependency`](Self::check_dof_dependency) before asking for
/// a derivative. A term that depends on a property through a dof type is only added if the
/// property reports that dependency, so a property that under-reports its dependencies silently
/// loses terms.
pub trait Property<T: Real>: Send + Sync {
    fn val(&self, fis: &FieldInterpolatorManager<T>) -> DVector<T>;

    /// The dof types the property may vary with.
    fn dof_dependencies(&self) -> &[DofType];

    fn check_dof_dependency(&self, dof_type: DofType) -> bool {
        self.dof_dependencies().contains(&dof_type)
    }

    /// Derivative of the property value with respect to the coefficients of the given dof group.
    ///
    /// The result has one row per value component and one column per coefficient of the group.
    ///
    /// # Panics
    ///
    /// Panics if the property does not depend on `dof_type`.
    fn d_prop_d_dof(&self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> DMatrix<T>;
}

/// A property with a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantProperty<T: Real> {
    value: DVector<T>,
}

impl<T: Real> ConstantProperty<T> {
    pub fn new(value: DVector<T>) -> Self {
        Self { value }
    }

    pub fn scalar(value: T) -> Self {
        Self::new(DVector::from_element(1, value))
    }

    pub fn from_slice(values: &[T]) -> Self {
        Self::new(DVector::from_column_slice(values))
    }
}

impl<T: Real> Property<T> for ConstantProperty<T> {
    fn val(&self, _fis: &FieldInterpolatorManager<T>) -> DVector<T> {
        self.value.clone()
    }

    fn dof_dependencies(&self) -> &[DofType] {
        &[]
    }

    fn d_prop_d_dof(&self, dof_type: DofType, _fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        panic!("Constant property does not depend on dof type {}.", dof_type)
    }
}

type ValueFn<T> = dyn Fn(&FieldInterpolatorManager<T>) -> DVector<T> + Send + Sync;
type DerivativeFn<T> = dyn Fn(&FieldInterpolatorManager<T>) -> DMatrix<T> + Send + Sync;

/// A property given by closures for its value and for its derivative with respect to each dof
/// group it depends on.
pub struct FunctionProperty<T: Real> {
    value: Box<ValueFn<T>>,
    dependencies: Vec<DofType>,
    derivatives: Vec<Box<DerivativeFn<T>>>,
}

impl<T: Real> fmt::Debug for FunctionProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionProperty")
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl<T: Real> FunctionProperty<T> {
    pub fn new(value: impl Fn(&FieldInterpolatorManager<T>) -> DVector<T> + Send + Sync + 'static) -> Self {
        Self {
            value: Box::new(value),
            dependencies: Vec::new(),
            derivatives: Vec::new(),
        }
    }

    /// Declares a dependency on `dof_type` together with the derivative of the value with respect
    /// to the coefficients of that group.
    pub fn with_dof_derivative(
        mut self,
        dof_type: DofType,
        derivative: impl Fn(&FieldInterpolatorManager<T>) -> DMatrix<T> + Send + Sync + 'static,
    ) -> Self {
        if let Some(index) = self.dependencies.iter().position(|&d| d == dof_type) {
            self.derivatives[index] = Box::new(derivative);
        } else {
            self.dependencies.push(dof_type);
            self.derivatives.push(Box::new(derivative));
        }
        self
    }
}

impl<T: Real> Property<T> for FunctionProperty<T> {
    fn val(&self, fis: &FieldInterpolatorManager<T>) -> DVector<T> {
        (self.value)(fis)
    }

    fn dof_dependencies(&self) -> &[DofType] {
        &self.dependencies
    }

    fn d_prop_d_dof(&self, dof_type: DofType, fis: &FieldInterpolatorManager<T>) -> DMatrix<T> {
        let index = self
            .dependencies
            .iter()
            .position(|&d| d == dof_type)
            .unwrap_or_else(|| panic!("Function property does not depend on dof type {}.", dof_type));
        (self.derivatives[index])(fis)
    }
}

/// Dense property slots of a single model, addressed by slot index and populated by exact name.
///
/// Each model owns a static table of the property names it understands. The position of a name in
/// that table is the slot index used internally.
#[derive(Clone)]
pub struct PropertyRegistry<T: Real> {
    component: &'static str,
    names: &'static [&'static str],
    slots: Vec<Option<Arc<dyn Property<T>>>>,
}

impl<T: Real> fmt::Debug for PropertyRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<_> = self
            .names
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.is_some())
            .map(|(name, _)| *name)
            .collect();
        f.debug_struct("PropertyRegistry")
            .field("component", &self.component)
            .field("bound", &bound)
            .finish()
    }
}

impl<T: Real> PropertyRegistry<T> {
    pub fn new(component: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            component,
            names,
            slots: vec![None; names.len()],
        }
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Binds a property to the slot with the given name.
    ///
    /// # Errors
    ///
    /// Fails if the name is not known to the model.
    pub fn set(&mut self, property: Arc<dyn Property<T>>, name: &str) -> eyre::Result<()> {
        let slot = self.slot_of(name)?;
        self.slots[slot] = Some(property);
        Ok(())
    }

    pub fn slot_of(&self, name: &str) -> eyre::Result<usize> {
        self.names
            .iter()
            .position(|&candidate| candidate == name)
            .ok_or_else(|| {
                eyre!(
                    "{}: unknown property \"{}\" (known properties: {}).",
                    self.component,
                    name,
                    self.names.join(", ")
                )
            })
    }

    pub fn get(&self, slot: usize) -> Option<&dyn Property<T>> {
        self.slots[slot].as_deref()
    }

    pub fn is_set(&self, slot: usize) -> bool {
        self.slots[slot].is_some()
    }

    /// Returns the property in the given slot.
    ///
    /// # Panics
    ///
    /// Panics with the property name if the slot is empty.
    pub fn require(&self, slot: usize) -> &dyn Property<T> {
        self.get(slot).unwrap_or_else(|| {
            panic!(
                "{}: required property \"{}\" has not been set.",
                self.component, self.names[slot]
            )
        })
    }

    /// Whether the property in the given slot is set and depends on `dof_type`.
    pub fn depends_on(&self, slot: usize, dof_type: DofType) -> bool {
        self.get(slot)
            .map(|property| property.check_dof_dependency(dof_type))
            .unwrap_or(false)
    }

    /// First component of the property value in the given slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is empty.
    pub fn scalar(&self, slot: usize, fis: &FieldInterpolatorManager<T>) -> T {
        self.require(slot).val(fis)[0]
    }

    /// Union of the dof dependencies of all bound properties, in order of first appearance.
    pub fn dof_dependencies(&self) -> Vec<DofType> {
        let mut dofs = Vec::new();
        for property in self.slots.iter().flatten() {
            for &dof in property.dof_dependencies() {
                if !dofs.contains(&dof) {
                    dofs.push(dof);
                }
            }
        }
        dofs
    }
}
