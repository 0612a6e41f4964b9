//! Export options for SDF bundle generation

use serde::{Deserialize, Serialize};

/// Export options for SDF bundle generation
///
/// Built once per run and never mutated afterwards. Every field has a default
/// so an options file only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Model name (SDF `<model name>` and mesh URI prefix)
    pub model_name: String,
    /// Author written into model.config
    pub author_name: String,
    pub author_email: String,
    /// Free-form description written into model.config
    pub description: String,
    /// Ask the host to write one STL per link
    pub export_meshes: bool,
    /// Resolve via-points, end-effectors and markers
    pub export_via_points: bool,
    /// Emit CASPR cable and body sidecars (implies via-points)
    pub export_caspr: bool,
    /// Emit the standalone cardsflow.xml muscle document (implies via-points)
    pub export_cardsflow: bool,
    /// Emit muscles.osim and the muscle interface plugin instead of the
    /// actuation plugin (implies via-points)
    pub export_open_sim_muscles: bool,
    /// Resolve lighthouse sensors and emit one YAML document per link
    pub export_lighthouse_sensors: bool,
    /// `<self_collide>` flag written for every link
    pub self_collide: bool,
    /// Replace computed inertia with the placeholder tensor
    pub dummy_inertia: bool,
    /// Reuse links from the link cache by name
    pub cache: bool,
    /// Drop occurrence subtrees lighter than 1 g before aggregation
    pub remove_small_parts: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            model_name: "robot".to_string(),
            author_name: String::new(),
            author_email: String::new(),
            description: String::new(),
            export_meshes: true,
            export_via_points: false,
            export_caspr: false,
            export_cardsflow: false,
            export_open_sim_muscles: false,
            export_lighthouse_sensors: false,
            self_collide: false,
            dummy_inertia: false,
            cache: false,
            remove_small_parts: false,
        }
    }
}

impl ExportOptions {
    /// Load options from a RON file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, super::ExportError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| super::ExportError::Io(e.to_string()))?;
        ron::from_str(&content).map_err(|e| super::ExportError::Options(e.to_string()))
    }

    /// Whether the attachment resolver runs for via-points, end-effectors and markers
    pub fn via_points_enabled(&self) -> bool {
        self.export_via_points
            || self.export_caspr
            || self.export_cardsflow
            || self.export_open_sim_muscles
    }

    /// Whether the actuation plugin subtree goes into model.sdf
    pub fn plugin_enabled(&self) -> bool {
        self.via_points_enabled() && !self.export_open_sim_muscles
    }
}
