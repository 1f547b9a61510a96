//! Voigt-notation layouts of symmetric second-order tensors.
//!
//! | layout          | components                 |
//! |-----------------|----------------------------|
//! | plane stress    | `[11, 22, 12]`             |
//! | plane strain    | `[11, 22, 12]`             |
//! | axisymmetric    | `[rr, zz, θθ, rz]`         |
//! | 3D              | `[11, 22, 33, 23, 13, 12]` |
//!
//! Normal components always come first.
use moris_traits::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoigtLayout {
    PlaneStress,
    PlaneStrain,
    Axisymmetric,
    Full3d,
}

impl VoigtLayout {
    pub fn space_dim(&self) -> usize {
        match self {
            Self::Full3d => 3,
            _ => 2,
        }
    }

    pub fn num_components(&self) -> usize {
        match self {
            Self::PlaneStress | Self::PlaneStrain => 3,
            Self::Axisymmetric => 4,
            Self::Full3d => 6,
        }
    }

    pub fn num_normal_stresses(&self) -> usize {
        match self {
            Self::PlaneStress | Self::PlaneStrain => 2,
            Self::Axisymmetric | Self::Full3d => 3,
        }
    }

    /// Maps a unit normal to the operator that contracts a Voigt stress with it, i.e.
    /// `flatten_normal(n) * voigt(σ) == σ n`.
    ///
    /// # Panics
    ///
    /// Panics if the normal does not have `space_dim` entries.
    pub fn flatten_normal<T: Real>(&self, normal: &DVector<T>) -> DMatrix<T> {
        assert_eq!(normal.len(), self.space_dim(), "Normal has wrong dimension for layout.");
        let mut m = DMatrix::zeros(self.space_dim(), self.num_components());
        match self {
            Self::PlaneStress | Self::PlaneStrain => {
                m[(0, 0)] = normal[0];
                m[(0, 2)] = normal[1];
                m[(1, 1)] = normal[1];
                m[(1, 2)] = normal[0];
            }
            Self::Axisymmetric => {
                m[(0, 0)] = normal[0];
                m[(0, 3)] = normal[1];
                m[(1, 1)] = normal[1];
                m[(1, 3)] = normal[0];
            }
            Self::Full3d => {
                m[(0, 0)] = normal[0];
                m[(1, 1)] = normal[1];
                m[(2, 2)] = normal[2];
                m[(0, 4)] = normal[2];
                m[(0, 5)] = normal[1];
                m[(1, 3)] = normal[2];
                m[(1, 5)] = normal[0];
                m[(2, 3)] = normal[1];
                m[(2, 4)] = normal[0];
            }
        }
        m
    }

    /// Voigt vector with ones in the normal slots and zeros in the shear slots.
    pub fn normal_identity<T: Real>(&self) -> DVector<T> {
        DVector::from_fn(self.num_components(), |i, _| {
            if i < self.num_normal_stresses() {
                T::one()
            } else {
                T::zero()
            }
        })
    }

    /// Index pairs `(i, j)` of the tensor entry stored in each Voigt slot.
    ///
    /// The axisymmetric tensor is ordered `(r, z, θ)`.
    pub fn tensor_indices(&self) -> &'static [(usize, usize)] {
        match self {
            Self::PlaneStress | Self::PlaneStrain => &[(0, 0), (1, 1), (0, 1)],
            Self::Axisymmetric => &[(0, 0), (1, 1), (2, 2), (0, 1)],
            Self::Full3d => &[(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)],
        }
    }

    fn tensor_dim(&self) -> usize {
        match self {
            Self::PlaneStress | Self::PlaneStrain => 2,
            Self::Axisymmetric | Self::Full3d => 3,
        }
    }

    /// Expands a Voigt stress vector into the symmetric tensor. Shear entries are copied unscaled.
    pub fn voigt_to_tensor<T: Real>(&self, voigt: &DVector<T>) -> DMatrix<T> {
        assert_eq!(voigt.len(), self.num_components());
        let dim = self.tensor_dim();
        let mut tensor = DMatrix::zeros(dim, dim);
        for (slot, &(i, j)) in self.tensor_indices().iter().enumerate() {
            tensor[(i, j)] = voigt[slot];
            tensor[(j, i)] = voigt[slot];
        }
        tensor
    }

    /// Collects the Voigt entries of a symmetric tensor. Only the upper triangle is read.
    pub fn tensor_to_voigt<T: Real>(&self, tensor: &DMatrix<T>) -> DVector<T> {
        let dim = self.tensor_dim();
        assert_eq!(tensor.shape(), (dim, dim));
        let indices = self.tensor_indices();
        DVector::from_fn(indices.len(), |slot, _| {
            let (i, j) = indices[slot];
            tensor[(i, j)]
        })
    }
}
