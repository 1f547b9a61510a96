//! Level-set geometry for `moris`: analytic and discrete fields, edge intersections, child nodes
//! and the sensitivities of interface locations with respect to design variables.
pub mod child_node;
pub mod criteria;
pub mod engine;
pub mod field;
pub mod intersection;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use child_node::*;
pub use criteria::*;
pub use engine::*;
pub use field::*;
pub use intersection::*;

pub use moris_traits::{BackgroundMesh, Real};
