//! Via-points, end-effectors, markers and lighthouse sensors
//!
//! Construction points are classified once into [`AnnotatedPoint`]s carrying
//! their assembly-frame position. Via-points, end-effectors and markers are
//! then expressed relative to their link's reference translation; sensors are
//! expressed relative to the link's center of mass. All offsets are in meters.

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::{Annotation, AnnotationError, parse_annotation};
use crate::body::{Link, ResolvedLinks};
use crate::convert::vector_to_si;
use crate::export::ExportOptions;
use crate::scene::{ConstructionPoint, OccurrenceTree};

/// A construction point with a recognized annotation
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPoint {
    pub name: String,
    pub annotation: Annotation,
    /// Assembly-frame position (cm)
    pub world: DVec3,
}

/// One point along a muscle/cable path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaPoint {
    pub link: String,
    pub index: u32,
    /// Offset from the link reference translation (m)
    pub position: DVec3,
}

/// All via-points of one motor, sorted by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentGroup {
    pub motor: String,
    pub via_points: Vec<ViaPoint>,
}

impl AttachmentGroup {
    /// Contiguous runs of via-points on the same link, in index order
    ///
    /// A link that appears again after another link starts a new run.
    pub fn link_runs(&self) -> Vec<(&str, &[ViaPoint])> {
        let mut runs = Vec::new();
        let mut start = 0;
        let points = &self.via_points;
        for i in 1..=points.len() {
            if i == points.len() || points[i].link != points[start].link {
                runs.push((points[start].link.as_str(), &points[start..i]));
                start = i;
            }
        }
        runs
    }
}

/// End-effector or visual marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAttachment {
    pub link: String,
    /// Offset from the link reference translation (m)
    pub position: DVec3,
}

/// Lighthouse sensors of one link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorGroup {
    pub link: String,
    /// 0, 1, 2, ... in first-seen order of links
    pub object_id: usize,
    /// Offsets from the link center of mass (m), sorted by sensor index
    pub offsets: Vec<DVec3>,
}

/// Per-point resolution failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttachError {
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error("Point '{point}' is owned by unknown occurrence {occurrence}")]
    UnknownOwner { point: String, occurrence: Uuid },
    #[error("Point '{point}' refers to link '{link}', which was not exported")]
    UnknownLink { point: String, link: String },
    #[error("Point '{point}': motor {motor} already has a via-point with index {index}")]
    DuplicateIndex {
        point: String,
        motor: String,
        index: u32,
    },
}

impl AttachError {
    /// Name of the construction point the error is about
    pub fn point(&self) -> &str {
        match self {
            AttachError::Annotation(err) => err.name(),
            AttachError::UnknownOwner { point, .. }
            | AttachError::UnknownLink { point, .. }
            | AttachError::DuplicateIndex { point, .. } => point,
        }
    }
}

/// Everything the attachment resolver produced
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    /// One group per motor, in first-seen order
    pub groups: Vec<AttachmentGroup>,
    pub end_effectors: Vec<PointAttachment>,
    pub markers: Vec<PointAttachment>,
    pub sensors: Vec<SensorGroup>,
    pub errors: Vec<AttachError>,
}

/// Classify construction points and place them in the assembly frame
///
/// Points without a recognized tag are dropped silently; malformed names and
/// unknown owners are returned as errors.
pub fn annotate_points(
    points: &[ConstructionPoint],
    tree: &OccurrenceTree<'_>,
) -> (Vec<AnnotatedPoint>, Vec<AttachError>) {
    let mut annotated = Vec::new();
    let mut errors: Vec<AttachError> = Vec::new();

    for point in points {
        let annotation = match parse_annotation(&point.name) {
            Ok(Some(annotation)) => annotation,
            Ok(None) => continue,
            Err(err) => {
                tracing::error!("{err}");
                errors.push(err.into());
                continue;
            }
        };

        let world = match point.owner {
            None => point.position,
            Some(id) => match tree.get(id) {
                Some(owner) => owner.transform.transform_point(point.position),
                None => {
                    let err = AttachError::UnknownOwner {
                        point: point.name.clone(),
                        occurrence: id,
                    };
                    tracing::error!("{err}");
                    errors.push(err);
                    continue;
                }
            },
        };

        tracing::debug!("{} '{}' at {:?}", annotation.kind_name(), point.name, world);
        annotated.push(AnnotatedPoint {
            name: point.name.clone(),
            annotation,
            world,
        });
    }

    (annotated, errors)
}

/// `COM_<link>` positions by link name; the first point for a link wins
pub fn com_overrides(points: &[AnnotatedPoint]) -> HashMap<String, DVec3> {
    let mut overrides = HashMap::new();
    for point in points {
        if let Annotation::CenterOfMass { link } = &point.annotation {
            if overrides.contains_key(link) {
                tracing::warn!("Ignoring second center of mass '{}' for '{}'", point.name, link);
                continue;
            }
            overrides.insert(link.clone(), point.world);
        }
    }
    overrides
}

/// Resolve annotated points against the exported links
pub fn resolve_attachments(
    points: &[AnnotatedPoint],
    links: &ResolvedLinks,
    options: &ExportOptions,
) -> Attachments {
    let mut out = Attachments::default();
    let mut motors: HashMap<String, usize> = HashMap::new();
    let mut sensors: HashMap<String, usize> = HashMap::new();
    // (sensor index, offset) per sensor group, sorted at the end
    let mut sensor_points: Vec<Vec<(u32, DVec3)>> = Vec::new();

    for point in points {
        let wanted = match &point.annotation {
            Annotation::ViaPoint { .. }
            | Annotation::EndEffector { .. }
            | Annotation::VisualMarker { .. } => options.via_points_enabled(),
            Annotation::LighthouseSensor { .. } => options.export_lighthouse_sensors,
            Annotation::Export { .. } | Annotation::CenterOfMass { .. } => false,
        };
        if !wanted {
            continue;
        }

        let Some(link) = point.annotation.link().and_then(|name| links.get(name)) else {
            let err = AttachError::UnknownLink {
                point: point.name.clone(),
                link: point.annotation.link().unwrap_or_default().to_string(),
            };
            tracing::error!("{err}");
            out.errors.push(err);
            continue;
        };

        match &point.annotation {
            Annotation::ViaPoint { motor, index, .. } => {
                let slot = *motors.entry(motor.clone()).or_insert_with(|| {
                    out.groups.push(AttachmentGroup {
                        motor: motor.clone(),
                        via_points: Vec::new(),
                    });
                    out.groups.len() - 1
                });
                let group = &mut out.groups[slot];
                if group.via_points.iter().any(|v| v.index == *index) {
                    let err = AttachError::DuplicateIndex {
                        point: point.name.clone(),
                        motor: motor.clone(),
                        index: *index,
                    };
                    tracing::error!("{err}");
                    out.errors.push(err);
                    continue;
                }
                group.via_points.push(ViaPoint {
                    link: link.name.clone(),
                    index: *index,
                    position: offset_from_reference(link, point.world),
                });
            }
            Annotation::EndEffector { .. } => out.end_effectors.push(PointAttachment {
                link: link.name.clone(),
                position: offset_from_reference(link, point.world),
            }),
            Annotation::VisualMarker { .. } => out.markers.push(PointAttachment {
                link: link.name.clone(),
                position: offset_from_reference(link, point.world),
            }),
            Annotation::LighthouseSensor { index, .. } => {
                let slot = *sensors.entry(link.name.clone()).or_insert_with(|| {
                    out.sensors.push(SensorGroup {
                        link: link.name.clone(),
                        object_id: out.sensors.len(),
                        offsets: Vec::new(),
                    });
                    sensor_points.push(Vec::new());
                    out.sensors.len() - 1
                });
                sensor_points[slot].push((*index, vector_to_si(point.world - link.center_of_mass)));
            }
            Annotation::Export { .. } | Annotation::CenterOfMass { .. } => {}
        }
    }

    for group in &mut out.groups {
        group.via_points.sort_by_key(|v| v.index);
    }
    for (group, mut points) in out.sensors.iter_mut().zip(sensor_points) {
        points.sort_by_key(|(index, _)| *index);
        group.offsets = points.into_iter().map(|(_, offset)| offset).collect();
    }

    tracing::info!(
        "Attachments: {} motors, {} end-effectors, {} markers, {} sensor groups",
        out.groups.len(),
        out.end_effectors.len(),
        out.markers.len(),
        out.sensors.len()
    );

    out
}

fn offset_from_reference(link: &Link, world: DVec3) -> DVec3 {
    vector_to_si(world - link.reference.translation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ComSource;
    use crate::inertia::InertiaMatrix;
    use crate::scene::{Occurrence, Scene, Transform};
    use approx::assert_relative_eq;

    fn link(name: &str, reference: DVec3, com: DVec3) -> Link {
        Link {
            name: name.to_string(),
            total_mass: 1.0,
            center_of_mass: com,
            com_source: ComSource::Computed,
            inertia: InertiaMatrix::dummy(),
            body_count: 1,
            reference: Transform::from_translation(reference),
        }
    }

    fn point(name: &str, world: DVec3) -> AnnotatedPoint {
        AnnotatedPoint {
            name: name.to_string(),
            annotation: parse_annotation(name).unwrap().unwrap(),
            world,
        }
    }

    fn links() -> ResolvedLinks {
        [
            link("arm", DVec3::new(5.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0)),
            link("base", DVec3::ZERO, DVec3::new(0.0, 0.0, 1.0)),
        ]
        .into_iter()
        .collect()
    }

    fn via_options() -> ExportOptions {
        ExportOptions {
            export_via_points: true,
            export_lighthouse_sensors: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_via_point_relative_to_link() {
        let out = resolve_attachments(
            &[point("VP_motor3_arm_1", DVec3::new(10.0, 0.0, 0.0))],
            &links(),
            &via_options(),
        );
        assert!(out.errors.is_empty());
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].motor, "3");
        let via = &out.groups[0].via_points[0];
        assert_eq!(via.index, 1);
        assert_eq!(via.link, "arm");
        assert_relative_eq!(via.position.x, 0.05, epsilon = 1e-12);
        assert_eq!(via.position.y, 0.0);
        assert_eq!(via.position.z, 0.0);
    }

    #[test]
    fn test_via_points_sorted_numerically() {
        let out = resolve_attachments(
            &[
                point("VP_motor1_arm_10", DVec3::ZERO),
                point("VP_motor1_base_2", DVec3::ZERO),
                point("VP_motor1_arm_9", DVec3::ZERO),
                point("VP_motor0_base_1", DVec3::ZERO),
            ],
            &links(),
            &via_options(),
        );
        let indices: Vec<u32> = out.groups[0].via_points.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![2, 9, 10]);
        assert_eq!(out.groups[1].motor, "0");
    }

    #[test]
    fn test_link_runs_are_contiguous() {
        let group = AttachmentGroup {
            motor: "1".to_string(),
            via_points: ["base", "base", "arm", "base"]
                .iter()
                .enumerate()
                .map(|(i, link)| ViaPoint {
                    link: link.to_string(),
                    index: i as u32,
                    position: DVec3::ZERO,
                })
                .collect(),
        };
        let runs: Vec<(&str, usize)> = group
            .link_runs()
            .into_iter()
            .map(|(link, points)| (link, points.len()))
            .collect();
        assert_eq!(runs, vec![("base", 2), ("arm", 1), ("base", 1)]);
    }

    #[test]
    fn test_unknown_link_and_duplicate_index_are_skipped() {
        let out = resolve_attachments(
            &[
                point("VP_motor2_leg_1", DVec3::ZERO),
                point("VP_motor2_arm_1", DVec3::ZERO),
                point("VP_motor2_base_1", DVec3::new(1.0, 0.0, 0.0)),
            ],
            &links(),
            &via_options(),
        );
        assert_eq!(out.groups[0].via_points.len(), 1);
        assert_eq!(out.groups[0].via_points[0].link, "arm");
        assert!(matches!(out.errors[0], AttachError::UnknownLink { .. }));
        assert!(matches!(out.errors[1], AttachError::DuplicateIndex { index: 1, .. }));
    }

    #[test]
    fn test_end_effectors_and_markers() {
        let out = resolve_attachments(
            &[
                point("EE_arm", DVec3::new(5.0, 10.0, 0.0)),
                point("VM_base", DVec3::new(0.0, 0.0, 20.0)),
            ],
            &links(),
            &via_options(),
        );
        assert_eq!(out.end_effectors.len(), 1);
        assert_relative_eq!(out.end_effectors[0].position.y, 0.1, epsilon = 1e-12);
        assert_eq!(out.markers[0].link, "base");
        assert_relative_eq!(out.markers[0].position.z, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_sensors_relative_to_com() {
        let out = resolve_attachments(
            &[
                point("LS_base_1", DVec3::new(0.0, 0.0, 3.0)),
                point("LS_arm_0", DVec3::new(5.0, 0.0, 0.0)),
                point("LS_base_0", DVec3::new(0.0, 0.0, 2.0)),
            ],
            &links(),
            &via_options(),
        );
        assert_eq!(out.sensors.len(), 2);
        assert_eq!(out.sensors[0].link, "base");
        assert_eq!(out.sensors[0].object_id, 0);
        assert_eq!(out.sensors[1].object_id, 1);
        // base COM is at z = 1
        assert_relative_eq!(out.sensors[0].offsets[0].z, 0.01, epsilon = 1e-12);
        assert_relative_eq!(out.sensors[0].offsets[1].z, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_disabled_families_are_skipped() {
        let out = resolve_attachments(
            &[
                point("VP_motor1_arm_1", DVec3::ZERO),
                point("LS_arm_0", DVec3::ZERO),
            ],
            &links(),
            &ExportOptions::default(),
        );
        assert!(out.groups.is_empty());
        assert!(out.sensors.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_annotate_points_uses_owner_transform() {
        let owner = Occurrence {
            id: Uuid::new_v4(),
            name: "arm:1".to_string(),
            transform: Transform::from_translation(DVec3::new(5.0, 0.0, 0.0)),
            bodies: Vec::new(),
            children: Vec::new(),
        };
        let scene = Scene {
            points: vec![
                ConstructionPoint {
                    name: "VP_motor3_arm_1".to_string(),
                    position: DVec3::new(5.0, 0.0, 0.0),
                    owner: Some(owner.id),
                },
                ConstructionPoint {
                    name: "Point4".to_string(),
                    position: DVec3::ZERO,
                    owner: None,
                },
                ConstructionPoint {
                    name: "VP_motor3_arm".to_string(),
                    position: DVec3::ZERO,
                    owner: None,
                },
                ConstructionPoint {
                    name: "COM_arm".to_string(),
                    position: DVec3::new(1.0, 1.0, 1.0),
                    owner: Some(Uuid::new_v4()),
                },
            ],
            occurrences: vec![owner],
            ..Default::default()
        };
        let tree = OccurrenceTree::new(&scene).unwrap();
        let (points, errors) = annotate_points(&scene.points, &tree);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].world, DVec3::new(10.0, 0.0, 0.0));
        assert!(matches!(errors[0], AttachError::Annotation(_)));
        assert!(matches!(errors[1], AttachError::UnknownOwner { .. }));
    }

    #[test]
    fn test_first_com_override_wins() {
        let overrides = com_overrides(&[
            point("COM_base", DVec3::new(2.0, 2.0, 2.0)),
            point("COM_base", DVec3::new(9.0, 9.0, 9.0)),
            point("EE_base", DVec3::ZERO),
        ]);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides["base"], DVec3::new(2.0, 2.0, 2.0));
    }
}
