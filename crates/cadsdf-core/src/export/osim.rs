//! OpenSim muscle document (muscles.osim)

use crate::attachment::ViaPoint;

use super::format::{ensure_finite, num, vec3};
use super::xml::{write_declaration, write_text_element, xml_escape};
use super::{ExportError, ExportModel};

/// Thelen 2003 muscle parameters, written in this order for every muscle
const MUSCLE_PARAMETERS: [(&str, f64); 15] = [
    ("max_isometric_force", 546.0),
    ("optimal_fiber_length", 0.0535),
    ("tendon_slack_length", 0.078),
    ("pennation_angle", 0.0),
    ("activation_time_constant", 0.01),
    ("deactivation_time_constant", 0.04),
    ("Vmax", 10.0),
    ("Vmax0", 5.0),
    ("FmaxTendonStrain", 0.033),
    ("FmaxMuscleStrain", 0.6),
    ("KshapeActive", 0.5),
    ("KshapePassive", 4.0),
    ("damping", 0.05),
    ("Af", 0.3),
    ("Flen", 1.8),
];

/// Generate muscles.osim
///
/// One muscle per motor. Its geometry path runs from the first via-point
/// to the last; intermediate via-points are routed by the muscle plugin.
pub fn generate_muscles(model: &ExportModel<'_>) -> Result<String, ExportError> {
    let mut xml = String::new();
    write_declaration(&mut xml);
    xml.push_str("<OpenSimDocument Version=\"30000\">\n");
    xml.push_str("  <Model>\n");
    xml.push_str("    <ForceSet>\n");
    xml.push_str("      <objects>\n");

    for group in &model.attachments.groups {
        let motor = xml_escape(&group.motor);
        xml.push_str(&format!(
            "        <Thelen2003Muscle name=\"muscle{}\">\n",
            motor
        ));
        xml.push_str("          <GeometryPath>\n");
        xml.push_str("            <PathPointSet>\n");
        xml.push_str("              <objects>\n");
        for point in path_ends(&group.via_points) {
            ensure_finite(
                &format!("motor {} via-point {}", group.motor, point.index),
                &point.position.to_array(),
            )?;
            xml.push_str(&format!(
                "                <PathPoint name=\"muscle{}_node{}\">\n",
                motor, point.index
            ));
            write_text_element(&mut xml, 18, "location", &vec3(point.position));
            write_text_element(&mut xml, 18, "body", &point.link);
            xml.push_str("                </PathPoint>\n");
        }
        xml.push_str("              </objects>\n");
        xml.push_str("            </PathPointSet>\n");
        xml.push_str("            <PathWrapSet>\n");
        xml.push_str("              <objects/>\n");
        xml.push_str("            </PathWrapSet>\n");
        xml.push_str("          </GeometryPath>\n");
        for (tag, value) in MUSCLE_PARAMETERS {
            write_text_element(&mut xml, 10, tag, &num(value));
        }
        xml.push_str("        </Thelen2003Muscle>\n");
    }

    xml.push_str("      </objects>\n");
    xml.push_str("    </ForceSet>\n");
    xml.push_str("    <BodySet name=\"\">\n");
    xml.push_str("      <objects/>\n");
    xml.push_str("    </BodySet>\n");
    xml.push_str("  </Model>\n");
    xml.push_str("</OpenSimDocument>\n");
    Ok(xml)
}

/// First and last via-point; a single point is written once
fn path_ends(points: &[ViaPoint]) -> Vec<&ViaPoint> {
    match points {
        [] => Vec::new(),
        [only] => vec![only],
        [first, .., last] => vec![first, last],
    }
}
