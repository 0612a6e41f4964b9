//! CASPR cable-robot sidecars
//!
//! `<model>_cables.xml` lists one ideal cable per motor with the same
//! attachment locations as the SDF plugin. `<model>_bodies.xml` lists one
//! rigid link per child in the joint adjacency map.

use glam::DVec3;

use crate::constants::{CABLE_FORCE_MAX, CABLE_FORCE_MIN};
use crate::convert::vector_to_si;

use super::format::{ensure_finite, num, vec3};
use super::xml::{write_declaration, write_text_element, xml_escape};
use super::{ExportError, ExportModel};

/// Generate the cable set document
pub fn generate_cables(model: &ExportModel<'_>) -> Result<String, ExportError> {
    let mut xml = String::new();
    write_declaration(&mut xml);
    xml.push_str("<!DOCTYPE cables SYSTEM \"../../../templates/cables.dtd\">\n");
    xml.push_str("<cables default_cable_set=\"WORKING\">\n");
    xml.push_str("  <cable_set id=\"WORKING\">\n");

    for (i, group) in model.attachments.groups.iter().enumerate() {
        xml.push_str(&format!(
            "    <cable_ideal name=\"cable {}\" attachment_reference=\"com\">\n",
            i
        ));
        xml.push_str("      <properties>\n");
        write_text_element(&mut xml, 8, "force_min", &num(CABLE_FORCE_MIN));
        write_text_element(&mut xml, 8, "force_max", &num(CABLE_FORCE_MAX));
        xml.push_str("      </properties>\n");
        xml.push_str("      <attachments>\n");
        for point in &group.via_points {
            ensure_finite(
                &format!("motor {} via-point {}", group.motor, point.index),
                &point.position.to_array(),
            )?;
            xml.push_str("        <attachment>\n");
            write_text_element(&mut xml, 10, "link", &point.link);
            write_text_element(&mut xml, 10, "location", &vec3(point.position));
            xml.push_str("        </attachment>\n");
        }
        xml.push_str("      </attachments>\n");
        xml.push_str("    </cable_ideal>\n");
    }

    xml.push_str("  </cable_set>\n");
    xml.push_str("</cables>\n");
    Ok(xml)
}

/// Generate the rigid body chain document
///
/// Each entry carries the child link's physical data. The COM location is
/// measured from the joint anchor; inertia is in kg*m^2.
pub fn generate_bodies(model: &ExportModel<'_>) -> Result<String, ExportError> {
    let mut xml = String::new();
    write_declaration(&mut xml);
    xml.push_str("<!DOCTYPE bodies_system SYSTEM \"../../../templates/bodies.dtd\">\n");
    xml.push_str("<bodies_system>\n");
    xml.push_str("  <links display_range=\"-0.3 0.3 0.0 1.0 -0.3 0.3\" view_angle=\"-37 32\">\n");

    for (child_name, (parent_name, index)) in &model.graph.parents {
        let joint = &model.graph.joints[*index];
        let child = model
            .links
            .get(child_name)
            .ok_or_else(|| ExportError::LinkNotFound(child_name.clone()))?;

        let com_location = vector_to_si(child.center_of_mass) - joint.anchor;
        let inertia = child.inertia.to_si();
        let (q_min, q_max) = joint
            .limits
            .map(|l| (l.lower, l.upper))
            .unwrap_or((0.0, 0.0));
        let axis = joint.axis.unwrap_or(DVec3::ZERO);
        ensure_finite(
            &format!("body '{}'", child_name),
            &[
                child.total_mass,
                com_location.x,
                com_location.y,
                com_location.z,
                inertia.ixx,
                inertia.iyy,
                inertia.izz,
                inertia.ixy,
                inertia.ixz,
                inertia.iyz,
            ],
        )?;

        xml.push_str(&format!(
            "    <link_rigid num=\"1\" name=\"{}\">\n",
            xml_escape(child_name)
        ));
        xml.push_str(&format!(
            "      <joint type=\"R_xyx\" axis=\"{}\" q_min=\"{}\" q_max=\"{}\"/>\n",
            vec3(axis),
            num(q_min),
            num(q_max)
        ));
        xml.push_str("      <physical>\n");
        write_text_element(&mut xml, 8, "mass", &num(child.total_mass));
        write_text_element(&mut xml, 8, "com_location", &vec3(com_location));
        write_text_element(&mut xml, 8, "end_location", "0 0 0");
        xml.push_str("        <inertia ref=\"com\">\n");
        for (tag, value) in [
            ("Ixx", inertia.ixx),
            ("Iyy", inertia.iyy),
            ("Izz", inertia.izz),
            ("Ixy", inertia.ixy),
            ("Ixz", inertia.ixz),
            ("Iyz", inertia.iyz),
        ] {
            write_text_element(&mut xml, 10, tag, &num(value));
        }
        xml.push_str("        </inertia>\n");
        xml.push_str("      </physical>\n");
        xml.push_str("      <parent>\n");
        write_text_element(&mut xml, 8, "num", parent_name);
        write_text_element(&mut xml, 8, "location", &vec3(joint.anchor));
        xml.push_str("      </parent>\n");
        xml.push_str("    </link_rigid>\n");
    }

    xml.push_str("  </links>\n");
    write_operational_spaces(&mut xml);
    xml.push_str("</bodies_system>\n");
    Ok(xml)
}

/// Placeholder operational space CASPR expects to be present
fn write_operational_spaces(xml: &mut String) {
    xml.push_str("  <operational_spaces default_operational_set=\"test\">\n");
    xml.push_str("    <operational_set id=\"test\">\n");
    xml.push_str("      <position marker_id=\"1\" name=\"test1\">\n");
    write_text_element(xml, 8, "link", "2");
    write_text_element(xml, 8, "offset", "0.0 0.0 0.0");
    xml.push_str("        <axes active_axes=\"x\"/>\n");
    xml.push_str("      </position>\n");
    xml.push_str("    </operational_set>\n");
    xml.push_str("  </operational_spaces>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INERTIA_TO_SI;
    use crate::export::test_support::sample;

    #[test]
    fn test_cables() {
        let sample = sample();
        let xml = generate_cables(&sample.model()).unwrap();
        assert!(xml.contains("<!DOCTYPE cables SYSTEM \"../../../templates/cables.dtd\">"));
        assert!(xml.contains("<cables default_cable_set=\"WORKING\">\n  <cable_set id=\"WORKING\">\n"));
        assert!(xml.contains("<cable_ideal name=\"cable 0\" attachment_reference=\"com\">"));
        assert!(xml.contains("<force_min>10</force_min>"));
        assert!(xml.contains("<force_max>80</force_max>"));
        assert_eq!(xml.matches("<attachment>").count(), 3);
        assert!(xml.contains(
            "          <link>arm</link>\n          <location>0.05 0 0</location>\n"
        ));
    }

    #[test]
    fn test_bodies() {
        let sample = sample();
        let xml = generate_bodies(&sample.model()).unwrap();
        assert!(xml.contains("<links display_range=\"-0.3 0.3 0.0 1.0 -0.3 0.3\" view_angle=\"-37 32\">"));
        assert!(xml.contains("<link_rigid num=\"1\" name=\"arm\">"));
        assert!(xml.contains("<joint type=\"R_xyx\" axis=\"0 0 1\" q_min=\"-1\" q_max=\"1\"/>"));
        assert!(xml.contains("<mass>0.5</mass>"));
        // arm COM (5, 0, 20) cm minus anchor (0, 0, 0.2) m
        assert!(xml.contains("<com_location>0.05 0 0</com_location>"));
        assert!(xml.contains("<end_location>0 0 0</end_location>"));
        assert!(xml.contains(&format!("<Ixz>{}</Ixz>", num(3.0 * INERTIA_TO_SI))));
        assert!(xml.contains(&format!("<Iyz>{}</Iyz>", num(2.0 * INERTIA_TO_SI))));
        assert!(xml.contains("<num>base</num>\n        <location>0 0 0.2</location>"));
        assert!(xml.contains("<position marker_id=\"1\" name=\"test1\">"));
        assert!(xml.trim_end().ends_with("</bodies_system>"));
    }

    #[test]
    fn test_bodies_missing_child_link() {
        let mut sample = sample();
        sample
            .graph
            .parents
            .insert("ghost".to_string(), ("base".to_string(), 0));
        assert!(matches!(
            generate_bodies(&sample.model()),
            Err(ExportError::LinkNotFound(_))
        ));
    }
}
