//! Joint resolution between links
//!
//! Each exported host joint names two occurrences. An endpoint belongs to the
//! link that claimed its occurrence during body resolution, however deep it
//! sits under the group's members. Direction is fixed: the link owning the
//! first occurrence is the parent, the link owning the second is the child.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::{Annotation, AnnotationError, parse_annotation};
use crate::body::ResolvedLinks;
use crate::convert::{length_to_si, vector_to_si};
use crate::scene::{OccurrenceTree, RawJoint, RawJointKind};

/// Exported joint types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    Fixed,
    Revolute,
    Prismatic,
    Ball,
    /// Host kind with no SDF counterpart; emitted without type, axis or limits
    Unsupported,
}

impl JointType {
    pub fn from_raw(kind: RawJointKind) -> Self {
        match kind {
            RawJointKind::Rigid => JointType::Fixed,
            RawJointKind::Revolute => JointType::Revolute,
            RawJointKind::Slider => JointType::Prismatic,
            RawJointKind::Ball => JointType::Ball,
            RawJointKind::Cylindrical | RawJointKind::PinSlot | RawJointKind::Planar => {
                JointType::Unsupported
            }
        }
    }

    /// SDF `type` attribute value
    pub fn sdf_name(&self) -> &'static str {
        match self {
            JointType::Fixed => "fixed",
            JointType::Revolute => "revolute",
            JointType::Prismatic => "prismatic",
            JointType::Ball => "ball",
            JointType::Unsupported => "",
        }
    }

    pub fn has_axis(&self) -> bool {
        matches!(self, JointType::Revolute | JointType::Prismatic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Radians (revolute) or meters (prismatic)
    pub lower: f64,
    pub upper: f64,
}

/// A resolved, directed joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    pub joint_type: JointType,
    pub raw_kind: RawJointKind,
    pub parent: String,
    pub child: String,
    /// Joint origin relative to the child link frame (m)
    pub origin: DVec3,
    /// Joint origin on the parent side, assembly frame (m)
    pub anchor: DVec3,
    pub axis: Option<DVec3>,
    pub limits: Option<JointLimits>,
}

/// Which of a joint's two host occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    One,
    Two,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::One => write!(f, "first"),
            Endpoint::Two => write!(f, "second"),
        }
    }
}

/// Per-joint resolution failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Joint name: {0}")]
    Annotation(#[from] AnnotationError),
    #[error("Joint '{joint}': {endpoint} occurrence is missing")]
    MissingEndpoint { joint: String, endpoint: Endpoint },
    #[error("Joint '{joint}': {endpoint} occurrence {occurrence} is not part of any exported link")]
    UnresolvedEndpoint {
        joint: String,
        endpoint: Endpoint,
        occurrence: Uuid,
    },
    #[error("Joint '{joint}': both occurrences belong to link '{link}'")]
    SameLink { joint: String, link: String },
    #[error("Joint '{joint}' is exported more than once, keeping the first")]
    DuplicateName { joint: String },
}

impl GraphError {
    /// Joint name as far as it could be parsed
    pub fn joint(&self) -> &str {
        match self {
            GraphError::Annotation(err) => err.name(),
            GraphError::MissingEndpoint { joint, .. }
            | GraphError::UnresolvedEndpoint { joint, .. }
            | GraphError::SameLink { joint, .. }
            | GraphError::DuplicateName { joint } => joint,
        }
    }
}

/// Directed joints plus the child -> parent adjacency used by sidecars
#[derive(Debug, Clone, Default)]
pub struct JointGraph {
    pub joints: Vec<Joint>,
    pub errors: Vec<GraphError>,
    /// Child link -> (parent link, index into `joints`); one entry per child
    pub parents: BTreeMap<String, (String, usize)>,
    names: HashSet<String>,
}

impl JointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one host joint
    ///
    /// Joints whose name is not an `EXPORT_` tag are ignored. Failures are
    /// recorded in `errors` and logged; nothing is emitted for them.
    pub fn add_joint(&mut self, raw: &RawJoint, links: &ResolvedLinks, tree: &OccurrenceTree<'_>) {
        match self.resolve(raw, links, tree) {
            Ok(Some(joint)) => self.push(joint),
            Ok(None) => tracing::debug!("Ignoring joint '{}'", raw.name),
            Err(err) => {
                tracing::error!("{err}");
                self.errors.push(err);
            }
        }
    }

    fn resolve(
        &self,
        raw: &RawJoint,
        links: &ResolvedLinks,
        tree: &OccurrenceTree<'_>,
    ) -> Result<Option<Joint>, GraphError> {
        let name = match parse_annotation(&raw.name)? {
            Some(Annotation::Export { name }) => name,
            _ => return Ok(None),
        };

        if self.names.contains(&name) {
            return Err(GraphError::DuplicateName { joint: name });
        }

        let parent = endpoint_link(&name, Endpoint::One, raw.occurrence_one, tree)?;
        let child = endpoint_link(&name, Endpoint::Two, raw.occurrence_two, tree)?;
        if parent == child {
            return Err(GraphError::SameLink {
                joint: name,
                link: parent.to_string(),
            });
        }

        let (Some(parent_link), Some(child_link)) = (links.get(parent), links.get(child)) else {
            // Owned by a link whose resolution failed later on
            let (endpoint, occurrence) = if links.contains(parent) {
                (Endpoint::Two, raw.occurrence_two)
            } else {
                (Endpoint::One, raw.occurrence_one)
            };
            return Err(GraphError::UnresolvedEndpoint {
                joint: name,
                endpoint,
                occurrence: occurrence.unwrap_or_default(),
            });
        };

        let joint_type = JointType::from_raw(raw.kind);
        let (axis, limits) = match joint_type {
            JointType::Revolute => (
                Some(raw.axis.normalize_or_zero()),
                raw.limits.map(|l| JointLimits {
                    lower: l.min,
                    upper: l.max,
                }),
            ),
            JointType::Prismatic => (
                Some(raw.axis.normalize_or_zero()),
                raw.limits.map(|l| JointLimits {
                    lower: length_to_si(l.min),
                    upper: length_to_si(l.max),
                }),
            ),
            JointType::Unsupported => {
                tracing::warn!(
                    "Joint '{}': {:?} joints are not supported, exporting without type",
                    name,
                    raw.kind
                );
                (None, None)
            }
            JointType::Fixed | JointType::Ball => (None, None),
        };

        Ok(Some(Joint {
            origin: vector_to_si(raw.origin_two - child_link.reference.translation),
            anchor: vector_to_si(raw.origin_one),
            parent: parent_link.name.clone(),
            child: child_link.name.clone(),
            name,
            joint_type,
            raw_kind: raw.kind,
            axis,
            limits,
        }))
    }

    fn push(&mut self, joint: Joint) {
        tracing::info!(
            "Joint '{}' ({}): parent '{}', child '{}'",
            joint.name,
            joint.joint_type.sdf_name(),
            joint.parent,
            joint.child
        );

        let index = self.joints.len();
        if let Some((previous, _)) = self
            .parents
            .insert(joint.child.clone(), (joint.parent.clone(), index))
        {
            tracing::warn!(
                "Link '{}' has more than one parent ('{}' replaced by '{}')",
                joint.child,
                previous,
                joint.parent
            );
        }
        self.names.insert(joint.name.clone());
        self.joints.push(joint);
    }

    /// Joint recorded for `child` in the adjacency map
    pub fn parent_joint(&self, child: &str) -> Option<&Joint> {
        self.parents.get(child).map(|(_, i)| &self.joints[*i])
    }
}

fn endpoint_link<'t>(
    joint: &str,
    endpoint: Endpoint,
    occurrence: Option<Uuid>,
    tree: &'t OccurrenceTree<'_>,
) -> Result<&'t str, GraphError> {
    let id = occurrence.ok_or_else(|| GraphError::MissingEndpoint {
        joint: joint.to_string(),
        endpoint,
    })?;
    tree.owner_of(id)
        .ok_or_else(|| GraphError::UnresolvedEndpoint {
            joint: joint.to_string(),
            endpoint,
            occurrence: id,
        })
}

/// Resolve every host joint against the resolved links
pub fn build_graph(
    joints: &[RawJoint],
    links: &ResolvedLinks,
    tree: &OccurrenceTree<'_>,
) -> JointGraph {
    let mut graph = JointGraph::new();
    for raw in joints {
        graph.add_joint(raw, links, tree);
    }
    graph
}
