//! Host scene snapshot
//!
//! Everything the exporter needs from the CAD host, captured as plain data:
//! an occurrence arena, rigid groups, joints and construction points. The
//! snapshot is serde-serializable so a host (or a test) can hand it over as a
//! RON file.
//!
//! All lengths are in host units (cm), masses in kg and inertias in kg*cm^2.

mod tree;

use std::path::Path;

use glam::{DAffine3, DMat3, DVec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inertia::InertiaMatrix;

pub use tree::{OccurrenceTree, SceneError};

/// Rotation + translation (a 4x3 transform), row-major rotation block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// `rows[r][c]` is the rotation cell at row `r`, column `c`
    pub rows: [[f64; 3]; 3],
    pub translation: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: DVec3::ZERO,
    };

    /// Pure translation
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Rotation (row-major) plus translation
    pub fn new(rows: [[f64; 3]; 3], translation: DVec3) -> Self {
        Self { rows, translation }
    }

    /// Rotation block as a glam matrix
    pub fn rotation(&self) -> DMat3 {
        // glam is column-major: build from rows and transpose
        DMat3::from_cols_array_2d(&self.rows).transpose()
    }

    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_mat3_translation(self.rotation(), self.translation)
    }

    /// Map a point from the local frame into the assembly frame
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.to_affine().transform_point3(point)
    }
}

/// A leaf solid with host-reported physical properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBody {
    #[serde(default)]
    pub name: String,
    /// Mass in kg
    pub mass: f64,
    /// Center of mass in the owning occurrence's local frame (cm)
    pub center_of_mass: DVec3,
    /// Inertia in the assembly frame (kg*cm^2)
    #[serde(default)]
    pub inertia: InertiaMatrix,
}

/// A node of the occurrence tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: Uuid,
    pub name: String,
    /// Local-to-assembly transform
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub bodies: Vec<RawBody>,
    #[serde(default)]
    pub children: Vec<Uuid>,
}

/// A host-level tag grouping occurrences into one exportable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidGroup {
    /// Full tag, e.g. `EXPORT_base`
    pub name: String,
    pub occurrences: Vec<Uuid>,
    /// Optional link frame orientation (row-major); identity when absent
    #[serde(default)]
    pub orientation: Option<[[f64; 3]; 3]>,
}

/// Host joint motion kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawJointKind {
    Rigid,
    Revolute,
    Slider,
    Cylindrical,
    PinSlot,
    Planar,
    Ball,
}

/// Host joint limit range (radians for revolute, cm for slider)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawLimits {
    pub min: f64,
    pub max: f64,
}

/// A joint as reported by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJoint {
    /// Full tag, e.g. `EXPORT_shoulder`
    pub name: String,
    pub occurrence_one: Option<Uuid>,
    pub occurrence_two: Option<Uuid>,
    pub kind: RawJointKind,
    /// Rotation axis or slide direction
    #[serde(default = "default_axis")]
    pub axis: DVec3,
    #[serde(default)]
    pub limits: Option<RawLimits>,
    /// Joint geometry origin on the first occurrence (cm, assembly frame)
    #[serde(default)]
    pub origin_one: DVec3,
    /// Joint geometry origin on the second occurrence (cm, assembly frame)
    #[serde(default)]
    pub origin_two: DVec3,
}

fn default_axis() -> DVec3 {
    DVec3::Z
}

/// A named construction point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionPoint {
    pub name: String,
    /// Position in the owner's frame, or the assembly frame without an owner (cm)
    pub position: DVec3,
    #[serde(default)]
    pub owner: Option<Uuid>,
}

/// Complete host snapshot handed to the exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
    #[serde(default)]
    pub rigid_groups: Vec<RigidGroup>,
    #[serde(default)]
    pub joints: Vec<RawJoint>,
    #[serde(default)]
    pub points: Vec<ConstructionPoint>,
}

impl Scene {
    /// Load a snapshot from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| SceneError::Io(e.to_string()))?;
        Self::from_ron(&content)
    }

    /// Parse a snapshot from RON text
    pub fn from_ron(content: &str) -> Result<Self, SceneError> {
        ron::from_str(content).map_err(|e| SceneError::Deserialize(e.to_string()))
    }

    /// Serialize the snapshot to RON text
    pub fn to_ron(&self) -> Result<String, SceneError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SceneError::Serialize(e.to_string()))
    }
}
