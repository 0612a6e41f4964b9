//! SDF bundle export
//!
//! Turns the resolved links, joints and attachments into the documents of a
//! Gazebo model directory. Documents are generated in memory first; writing
//! them is a separate step ([`write_bundle`]).

mod caspr;
mod format;
mod options;
mod osim;
mod sdf;
mod sensors;
mod write;
mod xml;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::attachment::Attachments;
use crate::body::ResolvedLinks;
use crate::graph::JointGraph;

pub use options::ExportOptions;
pub use sensors::SensorLayout;
pub use write::{WriteReport, write_bundle};
pub use xml::{sanitize_filename, xml_escape};

/// Everything the serializer reads; all of it final
#[derive(Debug, Clone, Copy)]
pub struct ExportModel<'a> {
    pub links: &'a ResolvedLinks,
    pub graph: &'a JointGraph,
    pub attachments: &'a Attachments,
}

/// Kind of a generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// model.sdf
    Model,
    /// model.config
    Config,
    /// caspr/<model>_cables.xml
    CasprCables,
    /// caspr/<model>_bodies.xml
    CasprBodies,
    /// muscles.osim
    OpenSimMuscles,
    /// cardsflow.xml
    Cardsflow,
    /// lighthouseSensors/<link>.yaml
    SensorLayout,
}

/// A generated document and its path relative to the model directory
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub content: String,
}

/// A document that could not be generated
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub error: ExportError,
}

/// Generated documents plus the ones that failed
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub documents: Vec<Document>,
    pub failures: Vec<DocumentFailure>,
    /// Name each written path was generated from
    owners: HashMap<PathBuf, String>,
}

impl ExportBundle {
    /// Document at a relative path
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&Document> {
        self.documents.iter().find(|d| d.path == path.as_ref())
    }

    /// All documents of one kind
    pub fn of_kind(&self, kind: DocumentKind) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(move |d| d.kind == kind)
    }

    /// Record a generated document; a path that is already taken is a failure
    fn add(
        &mut self,
        kind: DocumentKind,
        path: PathBuf,
        source: &str,
        content: Result<String, ExportError>,
    ) {
        let content = match self.owners.get(&path) {
            Some(first) => Err(ExportError::FileNameCollision {
                path: path.display().to_string(),
                first: first.clone(),
            }),
            None => content,
        };
        match content {
            Ok(content) => {
                tracing::debug!("Generated {}", path.display());
                self.owners.insert(path.clone(), source.to_string());
                self.documents.push(Document {
                    kind,
                    path,
                    content,
                });
            }
            Err(error) => {
                tracing::error!("Failed to generate {}: {}", path.display(), error);
                self.failures.push(DocumentFailure { kind, path, error });
            }
        }
    }
}

/// Export errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid export options: {0}")]
    Options(String),
    #[error("Non-finite value in {0}")]
    NonFinite(String),
    #[error("Link not found: {0}")]
    LinkNotFound(String),
    #[error("Name '{0}' does not give a usable file name")]
    InvalidFileName(String),
    #[error("{path} is already used by '{first}'")]
    FileNameCollision { path: String, first: String },
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Mesh file name for a link, relative to the mesh directory
pub fn mesh_file_name(link: &str) -> String {
    format!("{}.stl", sanitize_filename(link))
}

/// Generate every document the options ask for
///
/// Each document is generated independently; one failing does not stop the
/// others.
pub fn serialize(model: &ExportModel<'_>, options: &ExportOptions) -> ExportBundle {
    let mut bundle = ExportBundle::default();
    let file_stem = sanitize_filename(&options.model_name);

    bundle.add(
        DocumentKind::Model,
        PathBuf::from("model.sdf"),
        &options.model_name,
        sdf::generate_model(model, options),
    );
    bundle.add(
        DocumentKind::Config,
        PathBuf::from("model.config"),
        &options.model_name,
        Ok(sdf::generate_config(options)),
    );

    if options.export_caspr {
        bundle.add(
            DocumentKind::CasprCables,
            PathBuf::from("caspr").join(format!("{file_stem}_cables.xml")),
            &options.model_name,
            caspr::generate_cables(model),
        );
        bundle.add(
            DocumentKind::CasprBodies,
            PathBuf::from("caspr").join(format!("{file_stem}_bodies.xml")),
            &options.model_name,
            caspr::generate_bodies(model),
        );
    }

    if options.export_open_sim_muscles {
        bundle.add(
            DocumentKind::OpenSimMuscles,
            PathBuf::from("muscles.osim"),
            &options.model_name,
            osim::generate_muscles(model),
        );
    }

    if options.export_cardsflow {
        bundle.add(
            DocumentKind::Cardsflow,
            PathBuf::from("cardsflow.xml"),
            &options.model_name,
            sdf::generate_cardsflow(model),
        );
    }

    if options.export_lighthouse_sensors {
        for group in &model.attachments.sensors {
            let stem = sanitize_filename(&group.link);
            let path = PathBuf::from("lighthouseSensors").join(format!("{stem}.yaml"));
            bundle.add(
                DocumentKind::SensorLayout,
                path,
                &group.link,
                sensors::generate_sensor_layout(group),
            );
        }
    }

    tracing::info!(
        "Generated {} documents ({} failed)",
        bundle.documents.len(),
        bundle.failures.len()
    );

    bundle
}

#[cfg(test)]
pub(crate) mod test_support {
    use glam::DVec3;

    use super::*;
    use crate::attachment::{AttachmentGroup, PointAttachment, SensorGroup, ViaPoint};
    use crate::body::{ComSource, Link};
    use crate::graph::{Joint, JointLimits, JointType};
    use crate::inertia::InertiaMatrix;
    use crate::scene::{RawJointKind, Transform};

    /// Owned inputs for an [`ExportModel`]
    pub struct Sample {
        pub links: ResolvedLinks,
        pub graph: JointGraph,
        pub attachments: Attachments,
    }

    impl Sample {
        pub fn model(&self) -> ExportModel<'_> {
            ExportModel {
                links: &self.links,
                graph: &self.graph,
                attachments: &self.attachments,
            }
        }
    }

    fn link(name: &str, mass: f64, com: DVec3) -> Link {
        Link {
            name: name.to_string(),
            total_mass: mass,
            center_of_mass: com,
            com_source: ComSource::Computed,
            inertia: InertiaMatrix {
                ixx: 100.0,
                iyy: 200.0,
                izz: 300.0,
                ixy: 1.0,
                iyz: 2.0,
                ixz: 3.0,
            },
            body_count: 1,
            reference: Transform::from_translation(com),
        }
    }

    fn via(link: &str, index: u32, x: f64) -> ViaPoint {
        ViaPoint {
            link: link.to_string(),
            index,
            position: DVec3::new(x, 0.0, 0.0),
        }
    }

    /// `base` -> `arm` via a revolute `shoulder`, one motor, one of each point kind
    pub fn sample() -> Sample {
        let links: ResolvedLinks = [
            link("base", 2.0, DVec3::new(0.0, 0.0, 10.0)),
            link("arm", 0.5, DVec3::new(5.0, 0.0, 20.0)),
        ]
        .into_iter()
        .collect();

        let mut graph = JointGraph::new();
        graph.joints.push(Joint {
            name: "shoulder".to_string(),
            joint_type: JointType::Revolute,
            raw_kind: RawJointKind::Revolute,
            parent: "base".to_string(),
            child: "arm".to_string(),
            origin: DVec3::new(-0.05, 0.0, 0.0),
            anchor: DVec3::new(0.0, 0.0, 0.2),
            axis: Some(DVec3::Z),
            limits: Some(JointLimits {
                lower: -1.0,
                upper: 1.0,
            }),
        });
        graph
            .parents
            .insert("arm".to_string(), ("base".to_string(), 0));

        let attachments = Attachments {
            groups: vec![AttachmentGroup {
                motor: "3".to_string(),
                via_points: vec![via("base", 0, 0.01), via("base", 1, 0.02), via("arm", 2, 0.05)],
            }],
            end_effectors: vec![PointAttachment {
                link: "arm".to_string(),
                position: DVec3::new(0.1, 0.0, 0.0),
            }],
            markers: vec![PointAttachment {
                link: "base".to_string(),
                position: DVec3::new(0.0, 0.0, 0.3),
            }],
            sensors: vec![SensorGroup {
                link: "base".to_string(),
                object_id: 0,
                offsets: vec![DVec3::new(0.01, 0.0, 0.0), DVec3::new(0.0, -0.02, 0.0)],
            }],
            errors: Vec::new(),
        };

        Sample {
            links,
            graph,
            attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample;
    use super::*;
    use crate::attachment::SensorGroup;
    use glam::DVec3;

    fn all_options() -> ExportOptions {
        ExportOptions {
            model_name: "roboy arm".to_string(),
            export_caspr: true,
            export_cardsflow: true,
            export_lighthouse_sensors: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_serialize_document_set() {
        let sample = sample();
        let bundle = serialize(&sample.model(), &all_options());

        assert!(bundle.failures.is_empty());
        let paths: Vec<String> = bundle
            .documents
            .iter()
            .map(|d| d.path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            paths,
            vec![
                "model.sdf",
                "model.config",
                "caspr/roboy_arm_cables.xml",
                "caspr/roboy_arm_bodies.xml",
                "cardsflow.xml",
                "lighthouseSensors/base.yaml",
            ]
        );
    }

    #[test]
    fn test_failure_is_local_to_document() {
        let mut sample = sample();
        sample.attachments.sensors[0].offsets[0].x = f64::NAN;
        let bundle = serialize(&sample.model(), &all_options());

        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(bundle.failures[0].kind, DocumentKind::SensorLayout);
        assert!(bundle.get("model.sdf").is_some());
        assert_eq!(bundle.of_kind(DocumentKind::CasprCables).count(), 1);
    }

    #[test]
    fn test_colliding_file_names_are_reported() {
        let mut sample = sample();
        for link in ["a b", "a_b"] {
            sample.attachments.sensors.push(SensorGroup {
                link: link.to_string(),
                object_id: sample.attachments.sensors.len(),
                offsets: vec![DVec3::X * 0.01],
            });
        }
        let bundle = serialize(&sample.model(), &all_options());

        assert_eq!(bundle.of_kind(DocumentKind::SensorLayout).count(), 2);
        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(
            bundle.failures[0].error,
            ExportError::FileNameCollision {
                path: PathBuf::from("lighthouseSensors")
                    .join("a_b.yaml")
                    .display()
                    .to_string(),
                first: "a b".to_string(),
            }
        );
    }

    #[test]
    fn test_opensim_replaces_plugin() {
        let sample = sample();
        let options = ExportOptions {
            export_open_sim_muscles: true,
            ..Default::default()
        };
        let bundle = serialize(&sample.model(), &options);
        let model = &bundle.get("model.sdf").unwrap().content;

        assert!(bundle.get("muscles.osim").is_some());
        assert!(model.contains("muscle_interface_plugin"));
        assert!(model.contains("<muscles>model://robot/muscles.osim</muscles>"));
        assert!(!model.contains("cardsflow_gazebo_plugin"));
        assert!(!model.contains("<collision"));
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let sample = sample();
        let first = serialize(&sample.model(), &all_options());
        let second = serialize(&sample.model(), &all_options());
        assert_eq!(first.documents, second.documents);
    }
}
