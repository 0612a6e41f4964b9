//! Lighthouse sensor layouts (lighthouseSensors/<link>.yaml)

use serde::{Deserialize, Serialize};

use crate::attachment::SensorGroup;
use crate::constants::MESH_DIR;

use super::format::ensure_finite;
use super::{ExportError, mesh_file_name, sanitize_filename};

/// One `lighthouseSensors/<link>.yaml` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorLayout {
    pub name: String,
    #[serde(rename = "ObjectID")]
    pub object_id: usize,
    /// Mesh path relative to the layout file
    pub mesh: String,
    /// `[i, x, y, z]` rows, offsets from the link COM in meters
    pub sensor_relative_locations: Vec<(usize, f64, f64, f64)>,
}

impl SensorLayout {
    pub fn from_group(group: &SensorGroup) -> Result<Self, ExportError> {
        if sanitize_filename(&group.link).is_empty() {
            return Err(ExportError::InvalidFileName(group.link.clone()));
        }

        let mut rows = Vec::with_capacity(group.offsets.len());
        for (i, offset) in group.offsets.iter().enumerate() {
            ensure_finite(
                &format!("sensor {} on '{}'", i, group.link),
                &offset.to_array(),
            )?;
            let [x, y, z] = offset.to_array().map(unsigned_zero);
            rows.push((i, x, y, z));
        }

        Ok(Self {
            name: group.link.clone(),
            object_id: group.object_id,
            mesh: format!("../{}/{}", MESH_DIR, mesh_file_name(&group.link)),
            sensor_relative_locations: rows,
        })
    }
}

/// Generate the sensor layout of one link
///
/// Row `i` is the sensor's position in the layout, not its annotation index.
pub fn generate_sensor_layout(group: &SensorGroup) -> Result<String, ExportError> {
    let layout = SensorLayout::from_group(group)?;
    serde_yaml::to_string(&layout).map_err(|e| ExportError::Serialize(e.to_string()))
}

fn unsigned_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn group(link: &str) -> SensorGroup {
        SensorGroup {
            link: link.to_string(),
            object_id: 2,
            offsets: vec![DVec3::new(0.01, -0.0, -0.02), DVec3::new(0.0, 0.03, 0.0)],
        }
    }

    #[test]
    fn test_layout() {
        let yaml = generate_sensor_layout(&group("thigh")).unwrap();
        assert!(yaml.starts_with("name: thigh\nObjectID: 2\nmesh: ../meshes/CAD/thigh.stl\n"));
        assert!(!yaml.contains("-0.0\n"), "{yaml}");

        let layout: SensorLayout = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            layout.sensor_relative_locations,
            vec![(0, 0.01, 0.0, -0.02), (1, 0.0, 0.03, 0.0)]
        );
    }

    #[test]
    fn test_ambiguous_names_survive() {
        for name in ["true", "12", "left arm", "a: b"] {
            let yaml = generate_sensor_layout(&group(name)).unwrap();
            let layout: SensorLayout = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(layout.name, name);
        }
        let layout = SensorLayout::from_group(&group("left arm")).unwrap();
        assert_eq!(layout.mesh, "../meshes/CAD/left_arm.stl");
    }

    #[test]
    fn test_empty_layout() {
        let mut g = group("hip");
        g.offsets.clear();
        let yaml = generate_sensor_layout(&g).unwrap();
        let layout: SensorLayout = serde_yaml::from_str(&yaml).unwrap();
        assert!(layout.sensor_relative_locations.is_empty());
    }

    #[test]
    fn test_unusable_name() {
        assert_eq!(
            generate_sensor_layout(&group("")),
            Err(ExportError::InvalidFileName(String::new()))
        );
        let mut g = group("hip");
        g.offsets.push(DVec3::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(
            generate_sensor_layout(&g),
            Err(ExportError::NonFinite(_))
        ));
    }
}
