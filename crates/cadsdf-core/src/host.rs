//! Host application seam
//!
//! The exporter never touches CAD geometry itself. Mesh files, progress
//! display and user cancellation go through [`ExportHost`].

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::body::Link;

/// Pipeline stage reported through [`ExportHost::progress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Links,
    Joints,
    Attachments,
    Serialize,
}

/// Services the CAD host provides to the exporter
///
/// Calls are synchronous. `progress` must not block.
pub trait ExportHost {
    /// Write the mesh of `link` (its member occurrences) to `path`,
    /// relative to the output directory
    fn export_mesh(&mut self, link: &Link, members: &[Uuid], path: &Path)
    -> Result<(), HostError>;

    /// Whether the user asked to abort
    fn is_cancelled(&self) -> bool {
        false
    }

    fn progress(&mut self, _stage: Stage, _done: usize, _total: usize) {}
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Mesh export failed for '{link}': {message}")]
    MeshExport { link: String, message: String },
    #[error("Host query failed: {0}")]
    Query(String),
}

/// A mesh the pipeline asked for
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRequest {
    pub link: String,
    pub members: Vec<Uuid>,
    pub path: PathBuf,
}

/// Host without a CAD kernel: records mesh requests instead of writing meshes
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    pub requests: Vec<MeshRequest>,
    cancelled: bool,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl ExportHost for HeadlessHost {
    fn export_mesh(
        &mut self,
        link: &Link,
        members: &[Uuid],
        path: &Path,
    ) -> Result<(), HostError> {
        tracing::debug!("Mesh for '{}' requested at {}", link.name, path.display());
        self.requests.push(MeshRequest {
            link: link.name.clone(),
            members: members.to_vec(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn progress(&mut self, stage: Stage, done: usize, total: usize) {
        tracing::trace!("{:?}: {}/{}", stage, done, total);
    }
}
