//! Unit and frame conversion
//!
//! Pure functions taking host quantities (cm, kg*cm^2, row-major rotation
//! blocks) to SI and SDF pose form.

use std::f64::consts::FRAC_PI_2;

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::constants::{GIMBAL_LOCK_EPSILON, INERTIA_TO_SI, LENGTH_TO_SI};
use crate::scene::Transform;

/// Roll, pitch, yaw in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rpy {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Rpy {
    pub const ZERO: Self = Self {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    pub fn to_array(self) -> [f64; 3] {
        [self.roll, self.pitch, self.yaw]
    }
}

/// Pose (position in meters and orientation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub xyz: DVec3,
    pub rpy: Rpy,
}

impl Pose {
    pub fn new(xyz: DVec3, rpy: Rpy) -> Self {
        Self { xyz, rpy }
    }

    pub fn from_position(xyz: DVec3) -> Self {
        Self {
            xyz,
            rpy: Rpy::ZERO,
        }
    }

    /// The six SDF pose values `x y z roll pitch yaw`
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.xyz.x,
            self.xyz.y,
            self.xyz.z,
            self.rpy.roll,
            self.rpy.pitch,
            self.rpy.yaw,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConvertError {
    #[error("Rotation is gimbal locked (cos(pitch) = {cos_pitch:e}); roll and yaw are not separable")]
    GimbalLock { cos_pitch: f64 },
}

/// Host length (cm) to meters
pub fn length_to_si(value: f64) -> f64 {
    value * LENGTH_TO_SI
}

/// Host length vector (cm) to meters
pub fn vector_to_si(v: DVec3) -> DVec3 {
    v * LENGTH_TO_SI
}

/// Host moment of inertia (kg*cm^2) to kg*m^2
pub fn inertia_to_si(value: f64) -> f64 {
    value * INERTIA_TO_SI
}

/// Extract roll/pitch/yaw (Z-Y-X convention) from a rotation matrix
///
/// `pitch = atan2(-r31, sqrt(r11^2 + r21^2))`,
/// `yaw = atan2(r21 / cp, r11 / cp)`, `roll = atan2(r32 / cp, r33 / cp)`.
/// Fails when `cos(pitch)` vanishes.
pub fn rpy_from_rotation(m: DMat3) -> Result<Rpy, ConvertError> {
    let (r11, r21, r31) = (m.x_axis.x, m.x_axis.y, m.x_axis.z);
    let (r32, r33) = (m.y_axis.z, m.z_axis.z);

    let pitch = (-r31).atan2((r11 * r11 + r21 * r21).sqrt());
    let cp = pitch.cos();
    if cp.abs() < GIMBAL_LOCK_EPSILON {
        return Err(ConvertError::GimbalLock { cos_pitch: cp });
    }

    Ok(Rpy {
        roll: (r32 / cp).atan2(r33 / cp),
        pitch,
        yaw: (r21 / cp).atan2(r11 / cp),
    })
}

/// [`rpy_from_rotation`], resolving gimbal lock instead of failing
///
/// At pitch = +-pi/2 only `roll - yaw` (or `roll + yaw`) is observable, so yaw
/// is pinned to zero and roll is taken from the second row.
pub fn rpy_from_rotation_or_fallback(m: DMat3) -> Rpy {
    match rpy_from_rotation(m) {
        Ok(rpy) => rpy,
        Err(err) => {
            tracing::warn!("{err}, using yaw = 0");
            let r31 = m.x_axis.z;
            let (r22, r23) = (m.y_axis.y, m.z_axis.y);
            Rpy {
                roll: (-r23).atan2(r22),
                pitch: if r31 <= 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 },
                yaw: 0.0,
            }
        }
    }
}

/// Pose from a bare offset: scaled position, zero rotation
pub fn pose_from_vector(v: DVec3) -> Pose {
    Pose::from_position(vector_to_si(v))
}

/// Pose from a host transform: scaled translation plus roll/pitch/yaw
pub fn pose_from_transform(transform: &Transform) -> Pose {
    Pose::new(
        vector_to_si(transform.translation),
        rpy_from_rotation_or_fallback(transform.rotation()),
    )
}
