pub mod cache;
pub mod config;
pub mod constitutive;
pub mod dof;
pub mod field_interpolator;
pub mod iwg;
pub mod property;
pub mod voigt;

pub mod geometry {
    pub use moris_geometry::*;
}

pub mod optimize {
    pub use moris_optimize::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use moris_traits::Real;
