//! Inertia tensor arithmetic

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::constants::{DUMMY_INERTIA_DIAGONAL, INERTIA_TO_SI};

/// Inertia tensor (symmetric 3x3 matrix)
///
/// Units are whatever the producer uses; the host reports kg*cm^2 in the
/// assembly frame and [`InertiaMatrix::to_si`] converts to kg*m^2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InertiaMatrix {
    pub ixx: f64,
    pub iyy: f64,
    pub izz: f64,
    pub ixy: f64,
    pub iyz: f64,
    pub ixz: f64,
}

impl InertiaMatrix {
    pub const ZERO: Self = Self {
        ixx: 0.0,
        iyy: 0.0,
        izz: 0.0,
        ixy: 0.0,
        iyz: 0.0,
        ixz: 0.0,
    };

    /// Placeholder tensor diag(1000, 1000, 1000) in host units
    pub fn dummy() -> Self {
        Self {
            ixx: DUMMY_INERTIA_DIAGONAL,
            iyy: DUMMY_INERTIA_DIAGONAL,
            izz: DUMMY_INERTIA_DIAGONAL,
            ..Self::ZERO
        }
    }

    /// Multiply every component by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            ixx: self.ixx * factor,
            iyy: self.iyy * factor,
            izz: self.izz * factor,
            ixy: self.ixy * factor,
            iyz: self.iyz * factor,
            ixz: self.ixz * factor,
        }
    }

    /// Convert from host units (kg*cm^2) to SI (kg*m^2)
    pub fn to_si(&self) -> Self {
        self.scaled(INERTIA_TO_SI)
    }

    /// Check if the inertia matrix is physically valid
    pub fn is_valid(&self) -> bool {
        // Diagonal elements must be positive
        if self.ixx <= 0.0 || self.iyy <= 0.0 || self.izz <= 0.0 {
            return false;
        }

        // Triangle inequality: each diagonal must be <= sum of other two
        let ixx = self.ixx;
        let iyy = self.iyy;
        let izz = self.izz;

        ixx <= iyy + izz && iyy <= ixx + izz && izz <= ixx + iyy
    }

    /// SDF element order [ixx, ixy, ixz, iyy, iyz, izz]
    pub fn to_sdf_array(&self) -> [f64; 6] {
        [self.ixx, self.ixy, self.ixz, self.iyy, self.iyz, self.izz]
    }
}

impl Add for InertiaMatrix {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            ixx: self.ixx + rhs.ixx,
            iyy: self.iyy + rhs.iyy,
            izz: self.izz + rhs.izz,
            ixy: self.ixy + rhs.ixy,
            iyz: self.iyz + rhs.iyz,
            ixz: self.ixz + rhs.ixz,
        }
    }
}

impl AddAssign for InertiaMatrix {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for InertiaMatrix {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
