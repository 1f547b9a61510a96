use crate::calculus::approximate_jacobian_fd;
use log::debug;
use moris_traits::Real;
use nalgebra::{DMatrix, DVector, DVectorViewMut};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug)]
pub enum CriteriaError {
    /// The interface was queried before `initialize` was called.
    NotInitialized,
    /// The number of design variables does not match the initialized number.
    DimensionMismatch { expected: usize, actual: usize },
    /// A design variable violates its lower or upper bound.
    BoundViolation { index: usize },
    /// Gradients were requested before criteria were evaluated for the current design variables.
    CriteriaNotEvaluated,
    /// The underlying model failed to evaluate.
    Evaluation(Box<dyn Error + Send + Sync>),
}

impl Display for CriteriaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            CriteriaError::NotInitialized => write!(f, "Criteria interface has not been initialized."),
            &CriteriaError::DimensionMismatch { expected, actual } => {
                write!(f, "Expected {} design variables, got {}.", expected, actual)
            }
            &CriteriaError::BoundViolation { index } => {
                write!(f, "Design variable {} violates its bounds.", index)
            }
            CriteriaError::CriteriaNotEvaluated => {
                write!(f, "Criteria gradients requested before criteria were evaluated.")
            }
            CriteriaError::Evaluation(err) => write!(f, "Failed to evaluate criteria. Error: {}", err),
        }
    }
}

impl Error for CriteriaError {}

/// The call contract between an optimization algorithm and the model that produces criteria.
///
/// An algorithm first calls [`initialize`](Self::initialize) to obtain the initial design variables
/// (ADVs) and their bounds. Afterwards, every call to [`get_criteria`](Self::get_criteria) evaluates
/// the model at new ADVs and every subsequent call to
/// [`get_dcriteria_dadv`](Self::get_dcriteria_dadv) returns the gradients at those same ADVs.
pub trait CriteriaInterface<T: Real> {
    /// Fills in the initial ADVs and their lower/upper bounds.
    fn initialize(
        &mut self,
        advs: &mut DVector<T>,
        lower_bounds: &mut DVector<T>,
        upper_bounds: &mut DVector<T>,
    ) -> Result<(), CriteriaError>;

    fn get_criteria(&mut self, new_advs: &DVector<T>) -> Result<DVector<T>, CriteriaError>;

    /// Returns the `num_criteria x num_advs` matrix of criteria gradients at the most recently
    /// evaluated ADVs.
    fn get_dcriteria_dadv(&mut self) -> Result<DMatrix<T>, CriteriaError>;
}

/// Result of comparing analytic criteria gradients against finite differences.
#[derive(Debug, Clone)]
pub struct GradientCheck<T: Real> {
    pub analytic: DMatrix<T>,
    pub finite_difference: DMatrix<T>,
    pub max_abs_error: T,
}

/// Compares the analytic gradients of `criteria` at `advs` against central finite differences with
/// step `h`.
///
/// The criteria are re-evaluated at `advs` before returning, so that the interface is left in the
/// same state as after a regular `get_criteria(advs)` call.
pub fn check_criteria_gradients<T, C>(criteria: &mut C, advs: &DVector<T>, h: T) -> Result<GradientCheck<T>, CriteriaError>
where
    T: Real,
    C: CriteriaInterface<T> + ?Sized,
{
    let num_criteria = criteria.get_criteria(advs)?.len();
    let analytic = criteria.get_dcriteria_dadv()?;

    let mut failure = None;
    let mut x = advs.clone();
    let finite_difference = approximate_jacobian_fd(
        num_criteria,
        |x, mut out| match criteria.get_criteria(&x.clone_owned()) {
            Ok(values) => out.copy_from(&values),
            Err(err) => {
                out.fill(T::zero());
                failure.get_or_insert(err);
            }
        },
        DVectorViewMut::from(&mut x),
        h,
    );
    if let Some(err) = failure {
        return Err(err);
    }
    criteria.get_criteria(advs)?;

    let max_abs_error = (&analytic - &finite_difference).amax();
    debug!("Criteria gradient check: max abs error {:?}", max_abs_error);
    Ok(GradientCheck {
        analytic,
        finite_difference,
        max_abs_error,
    })
}
