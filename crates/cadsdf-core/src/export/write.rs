//! Persist an [`ExportBundle`] to a model directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{ExportBundle, ExportError};

/// What ended up on disk
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    /// Absolute-or-joined paths of the written documents
    pub written: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, ExportError)>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write every document under `output_dir`, creating directories as needed
///
/// A document that cannot be written is recorded and the rest still go out.
/// Of two documents with the same path only the first is written.
pub fn write_bundle(bundle: &ExportBundle, output_dir: impl AsRef<Path>) -> WriteReport {
    let output_dir = output_dir.as_ref();
    let mut report = WriteReport::default();
    let mut seen = HashMap::new();

    for document in &bundle.documents {
        let path = output_dir.join(&document.path);
        if let Some(first) = seen.get(&document.path) {
            let err = ExportError::FileNameCollision {
                path: document.path.display().to_string(),
                first: format!("{:?} document", first),
            };
            tracing::error!("Not writing {}: {}", path.display(), err);
            report.failures.push((path, err));
            continue;
        }
        seen.insert(document.path.clone(), document.kind);

        match write_document(&path, &document.content) {
            Ok(()) => {
                tracing::info!("Wrote {}", path.display());
                report.written.push(path);
            }
            Err(e) => {
                tracing::error!("Failed to write {}: {}", path.display(), e);
                report.failures.push((path, e));
            }
        }
    }

    report
}

fn write_document(path: &Path, content: &str) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::Io(e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| ExportError::Io(e.to_string()))
}
