/// Numerical differentiation helpers
pub mod calculus;
/// The boundary between design-variable producers and an optimization algorithm
pub mod criteria;
