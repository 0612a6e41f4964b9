//! Export pipeline
//!
//! Drives a scene snapshot through link resolution, joint resolution,
//! attachment resolution and serialization. Per-unit failures are recorded in
//! an [`ExportReport`] and the run carries on; only cancellation and an empty
//! result stop it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::annotation::{Annotation, parse_annotation};
use crate::attachment::{Attachments, annotate_points, com_overrides, resolve_attachments};
use crate::body::{ResolvedLinks, claim_members, resolve_link};
use crate::cache::LinkCache;
use crate::constants::MESH_DIR;
use crate::export::{ExportBundle, ExportModel, ExportOptions, mesh_file_name, serialize};
use crate::graph::JointGraph;
use crate::host::{ExportHost, Stage};
use crate::scene::{OccurrenceTree, RigidGroup, Scene, SceneError};

/// What a report entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Link,
    Mesh,
    Joint,
    Point,
    Document,
}

impl Unit {
    fn label(&self) -> &'static str {
        match self {
            Unit::Link => "link",
            Unit::Mesh => "mesh",
            Unit::Joint => "joint",
            Unit::Point => "point",
            Unit::Document => "document",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Exported,
    /// Link taken from the link cache
    Cached,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub unit: Unit,
    pub name: String,
    pub decision: Decision,
}

/// Every per-unit decision of one run
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub entries: Vec<ReportEntry>,
}

impl ExportReport {
    fn record(&mut self, unit: Unit, name: impl Into<String>, decision: Decision) {
        self.entries.push(ReportEntry {
            unit,
            name: name.into(),
            decision,
        });
    }

    fn fail(&mut self, unit: Unit, name: impl Into<String>, message: impl ToString) {
        self.record(unit, name, Decision::Failed(message.to_string()));
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.decision, Decision::Failed(_)))
    }

    /// Number of entries of `unit` that made it into the bundle
    pub fn exported(&self, unit: Unit) -> usize {
        self.entries
            .iter()
            .filter(|e| e.unit == unit)
            .filter(|e| matches!(e.decision, Decision::Exported | Decision::Cached))
            .count()
    }

    pub fn cached(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision == Decision::Cached)
            .count()
    }

    /// End-of-run summary, one failure or skip per line
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Exported {} links ({} from cache), {} joints, {} documents",
            self.exported(Unit::Link),
            self.cached(),
            self.exported(Unit::Joint),
            self.exported(Unit::Document)
        );
        let failures = self.failures().count();
        if failures > 0 {
            let _ = write!(out, "; {} failed", failures);
        }
        for entry in &self.entries {
            let (tag, reason) = match &entry.decision {
                Decision::Failed(reason) => ("failed", reason),
                Decision::Skipped(reason) => ("skipped", reason),
                Decision::Exported | Decision::Cached => continue,
            };
            let _ = write!(
                out,
                "\n  {} {} '{}': {}",
                tag,
                entry.unit.label(),
                entry.name,
                reason
            );
        }
        out
    }
}

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub links: ResolvedLinks,
    pub graph: JointGraph,
    pub attachments: Attachments,
    pub bundle: ExportBundle,
    pub report: ExportReport,
}

impl ExportOutcome {
    pub fn model(&self) -> ExportModel<'_> {
        ExportModel {
            links: &self.links,
            graph: &self.graph,
            attachments: &self.attachments,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Export cancelled during {0:?}")]
    Cancelled(Stage),
    #[error("No link could be exported")]
    NoLinks,
    #[error("Invalid scene: {0}")]
    Scene(#[from] SceneError),
}

/// Run the whole export for one scene
///
/// With `options.cache` set, links found in `cache` by name are reused as-is
/// and newly resolved links are added to it. Nothing is written to disk here;
/// mesh files go through `host` and documents come back in the bundle.
pub fn export_scene(
    scene: &Scene,
    options: &ExportOptions,
    host: &mut dyn ExportHost,
    mut cache: Option<&mut LinkCache>,
) -> Result<ExportOutcome, PipelineError> {
    let mut tree = OccurrenceTree::new(scene)?;
    let mut report = ExportReport::default();

    let (points, point_errors) = annotate_points(&scene.points, &tree);
    for err in &point_errors {
        report.fail(Unit::Point, err.point(), err);
    }
    let overrides = com_overrides(&points);

    // Links
    let groups = export_groups(scene, &mut report);
    let mut links = ResolvedLinks::new();
    let mut mesh_owners: HashMap<PathBuf, &str> = HashMap::new();
    for (done, (name, group)) in groups.iter().enumerate() {
        if host.is_cancelled() {
            tracing::warn!("Export cancelled while resolving links");
            return Err(PipelineError::Cancelled(Stage::Links));
        }
        host.progress(Stage::Links, done, groups.len());

        if links.contains(name) {
            tracing::warn!("Rigid group '{}' exports '{}' a second time", group.name, name);
            report.record(
                Unit::Link,
                name.as_str(),
                Decision::Skipped(format!("duplicate of an earlier group (from '{}')", group.name)),
            );
            continue;
        }

        let cached = if options.cache {
            cache.as_deref().and_then(|c| c.get(name)).cloned()
        } else {
            None
        };
        let resolved = match cached {
            Some(link) => {
                tracing::info!("Link '{}' taken from cache", name);
                claim_members(name, group, &mut tree).map(|_| (link, Decision::Cached))
            }
            None => resolve_link(name, group, &mut tree, &overrides, options)
                .map(|link| (link, Decision::Exported)),
        };
        let (link, decision) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!("{err}");
                report.fail(Unit::Link, name.as_str(), err);
                continue;
            }
        };

        if options.export_meshes {
            let path = PathBuf::from(MESH_DIR).join(mesh_file_name(name));
            if let Some(first) = mesh_owners.get(&path) {
                tracing::error!(
                    "Mesh {} of '{}' is already used by '{}'",
                    path.display(),
                    name,
                    first
                );
                report.fail(
                    Unit::Mesh,
                    name.as_str(),
                    format!("{} is already used by '{}'", path.display(), first),
                );
                report.fail(Unit::Link, name.as_str(), "mesh file name collision");
                continue;
            }
            mesh_owners.insert(path.clone(), name.as_str());
            match host.export_mesh(&link, &group.occurrences, &path) {
                Ok(()) => report.record(Unit::Mesh, name.as_str(), Decision::Exported),
                Err(err) => {
                    tracing::error!("{err}");
                    report.fail(Unit::Mesh, name.as_str(), &err);
                    report.fail(Unit::Link, name.as_str(), "mesh export failed");
                    continue;
                }
            }
        }

        if options.cache && decision == Decision::Exported {
            if let Some(cache) = cache.as_deref_mut() {
                cache.insert(link.clone());
            }
        }
        report.record(Unit::Link, name.as_str(), decision);
        links.insert(link);
    }
    host.progress(Stage::Links, groups.len(), groups.len());

    if links.is_empty() {
        tracing::error!("No link could be exported");
        return Err(PipelineError::NoLinks);
    }

    // Joints
    let mut graph = JointGraph::new();
    for (done, raw) in scene.joints.iter().enumerate() {
        if host.is_cancelled() {
            tracing::warn!("Export cancelled while resolving joints");
            return Err(PipelineError::Cancelled(Stage::Joints));
        }
        host.progress(Stage::Joints, done, scene.joints.len());
        graph.add_joint(raw, &links, &tree);
    }
    host.progress(Stage::Joints, scene.joints.len(), scene.joints.len());
    for joint in &graph.joints {
        report.record(Unit::Joint, joint.name.as_str(), Decision::Exported);
    }
    for err in &graph.errors {
        report.fail(Unit::Joint, err.joint(), err);
    }

    // Attachments
    if host.is_cancelled() {
        tracing::warn!("Export cancelled before resolving attachments");
        return Err(PipelineError::Cancelled(Stage::Attachments));
    }
    host.progress(Stage::Attachments, 0, points.len());
    let attachments = resolve_attachments(&points, &links, options);
    for err in &attachments.errors {
        report.fail(Unit::Point, err.point(), err);
    }
    host.progress(Stage::Attachments, points.len(), points.len());

    // Serialize
    if host.is_cancelled() {
        tracing::warn!("Export cancelled before serialization");
        return Err(PipelineError::Cancelled(Stage::Serialize));
    }
    host.progress(Stage::Serialize, 0, 1);
    let model = ExportModel {
        links: &links,
        graph: &graph,
        attachments: &attachments,
    };
    let bundle = serialize(&model, options);
    for document in &bundle.documents {
        report.record(
            Unit::Document,
            document.path.to_string_lossy(),
            Decision::Exported,
        );
    }
    for failure in &bundle.failures {
        report.fail(
            Unit::Document,
            failure.path.to_string_lossy(),
            &failure.error,
        );
    }
    host.progress(Stage::Serialize, 1, 1);

    tracing::info!("{}", report.summary());

    Ok(ExportOutcome {
        links,
        graph,
        attachments,
        bundle,
        report,
    })
}

/// Rigid groups tagged `EXPORT_`, with their sanitized link names
fn export_groups<'s>(scene: &'s Scene, report: &mut ExportReport) -> Vec<(String, &'s RigidGroup)> {
    let mut groups = Vec::new();
    for group in &scene.rigid_groups {
        match parse_annotation(&group.name) {
            Ok(Some(Annotation::Export { name })) => groups.push((name, group)),
            Ok(_) => tracing::debug!("Rigid group '{}' is not exported", group.name),
            Err(err) => {
                tracing::error!("{err}");
                report.fail(Unit::Link, group.name.as_str(), err);
            }
        }
    }
    groups
}
