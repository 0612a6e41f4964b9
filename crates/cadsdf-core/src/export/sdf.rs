//! model.sdf, model.config and cardsflow.xml generation

use crate::attachment::AttachmentGroup;
use crate::body::Link;
use crate::constants::{
    MESH_DIR, MESH_SCALE, OSIM_PLUGIN_FILENAME, OSIM_PLUGIN_NAME, PLUGIN_FILENAME, PLUGIN_NAME,
    SDF_VERSION,
};
use crate::convert::{Pose, pose_from_transform};
use crate::graph::Joint;

use super::format::{ensure_finite, num, vec3};
use super::xml::{write_declaration, write_pose, write_text_element, xml_escape};
use super::{ExportError, ExportModel, ExportOptions, mesh_file_name};

/// Generate the SDF model document
pub fn generate_model(
    model: &ExportModel<'_>,
    options: &ExportOptions,
) -> Result<String, ExportError> {
    let mut sdf = String::new();
    write_declaration(&mut sdf);
    sdf.push_str(&format!("<sdf version=\"{}\">\n", SDF_VERSION));
    sdf.push_str(&format!(
        "  <model name=\"{}\">\n",
        xml_escape(&options.model_name)
    ));

    for link in model.links.iter() {
        write_link(&mut sdf, link, options)?;
    }

    for joint in &model.graph.joints {
        for name in [&joint.parent, &joint.child] {
            if !model.links.contains(name) {
                return Err(ExportError::LinkNotFound(name.clone()));
            }
        }
        write_joint(&mut sdf, joint)?;
    }

    if options.plugin_enabled() {
        write_plugin(&mut sdf, model)?;
    }

    if options.export_open_sim_muscles {
        sdf.push_str(&format!(
            "    <plugin filename=\"{}\" name=\"{}\"/>\n",
            OSIM_PLUGIN_FILENAME, OSIM_PLUGIN_NAME
        ));
        write_text_element(
            &mut sdf,
            4,
            "muscles",
            &format!("model://{}/muscles.osim", options.model_name),
        );
    }

    sdf.push_str("  </model>\n");
    sdf.push_str("</sdf>\n");

    Ok(sdf)
}

fn write_link(sdf: &mut String, link: &Link, options: &ExportOptions) -> Result<(), ExportError> {
    let inertia = link.inertia.to_si().to_sdf_array();
    let com = link.center_of_mass;
    ensure_finite(
        &format!("link '{}'", link.name),
        &[link.total_mass, com.x, com.y, com.z],
    )?;
    ensure_finite(&format!("link '{}' inertia", link.name), &inertia)?;

    sdf.push_str(&format!("    <link name=\"{}\">\n", xml_escape(&link.name)));
    write_text_element(sdf, 6, "self_collide", &options.self_collide.to_string());
    write_pose(sdf, &pose_from_transform(&link.reference), 6);

    // The link frame sits at the COM, so the inertial pose is zero
    sdf.push_str("      <inertial>\n");
    write_pose(sdf, &Pose::default(), 8);
    write_text_element(sdf, 8, "mass", &num(link.total_mass));
    sdf.push_str("        <inertia>\n");
    for (tag, value) in ["ixx", "ixy", "ixz", "iyy", "iyz", "izz"]
        .iter()
        .zip(inertia)
    {
        write_text_element(sdf, 10, tag, &num(value));
    }
    sdf.push_str("        </inertia>\n");
    sdf.push_str("      </inertial>\n");

    let uri = format!(
        "model://{}/{}/{}",
        options.model_name,
        MESH_DIR,
        mesh_file_name(&link.name)
    );
    if !options.export_open_sim_muscles {
        write_geometry_element(sdf, "collision", &format!("{}_collision", link.name), &uri);
    }
    write_geometry_element(sdf, "visual", &format!("{}_visual", link.name), &uri);

    sdf.push_str("    </link>\n");
    Ok(())
}

fn write_geometry_element(sdf: &mut String, tag: &str, name: &str, uri: &str) {
    sdf.push_str(&format!("      <{} name=\"{}\">\n", tag, xml_escape(name)));
    sdf.push_str("        <geometry>\n");
    sdf.push_str("          <mesh>\n");
    write_text_element(sdf, 12, "uri", uri);
    let scale = num(MESH_SCALE);
    write_text_element(sdf, 12, "scale", &format!("{scale} {scale} {scale}"));
    sdf.push_str("          </mesh>\n");
    sdf.push_str("        </geometry>\n");
    sdf.push_str(&format!("      </{}>\n", tag));
}

fn write_joint(sdf: &mut String, joint: &Joint) -> Result<(), ExportError> {
    ensure_finite(
        &format!("joint '{}' origin", joint.name),
        &joint.origin.to_array(),
    )?;

    sdf.push_str(&format!(
        "    <joint name=\"{}\" type=\"{}\">\n",
        xml_escape(&joint.name),
        joint.joint_type.sdf_name()
    ));
    write_text_element(sdf, 6, "parent", &joint.parent);
    write_text_element(sdf, 6, "child", &joint.child);
    write_pose(sdf, &Pose::from_position(joint.origin), 6);

    if let Some(axis) = joint.axis {
        sdf.push_str("      <axis>\n");
        write_text_element(sdf, 8, "xyz", &vec3(axis));
        if let Some(limits) = joint.limits {
            sdf.push_str("        <limit>\n");
            write_text_element(sdf, 10, "lower", &num(limits.lower));
            write_text_element(sdf, 10, "upper", &num(limits.upper));
            sdf.push_str("        </limit>\n");
        }
        write_text_element(sdf, 8, "use_parent_model_frame", "0");
        sdf.push_str("      </axis>\n");
    }

    sdf.push_str("    </joint>\n");
    Ok(())
}

fn write_plugin(sdf: &mut String, model: &ExportModel<'_>) -> Result<(), ExportError> {
    sdf.push_str(&format!(
        "    <plugin filename=\"{}\" name=\"{}\">\n",
        PLUGIN_FILENAME, PLUGIN_NAME
    ));
    write_muscle_tree(sdf, &model.attachments.groups, 6)?;

    for (i, ee) in model.attachments.end_effectors.iter().enumerate() {
        ensure_finite("end-effector", &ee.position.to_array())?;
        sdf.push_str(&format!(
            "      <endEffector name=\"endeffector{}\" link=\"{}\">{}</endEffector>\n",
            i,
            xml_escape(&ee.link),
            vec3(ee.position)
        ));
    }
    for marker in &model.attachments.markers {
        ensure_finite("marker", &marker.position.to_array())?;
        sdf.push_str(&format!(
            "      <marker link=\"{}\">{}</marker>\n",
            xml_escape(&marker.link),
            vec3(marker.position)
        ));
    }

    sdf.push_str("    </plugin>\n");
    Ok(())
}

/// `myoMuscle` elements, one per motor, with via-points grouped into link runs
fn write_muscle_tree(
    out: &mut String,
    groups: &[AttachmentGroup],
    indent: usize,
) -> Result<(), ExportError> {
    let pad = " ".repeat(indent);
    for group in groups {
        out.push_str(&format!(
            "{}<myoMuscle name=\"motor{}\">\n",
            pad,
            xml_escape(&group.motor)
        ));
        for (link, points) in group.link_runs() {
            out.push_str(&format!("{}  <link name=\"{}\">\n", pad, xml_escape(link)));
            for point in points {
                ensure_finite(
                    &format!("motor {} via-point {}", group.motor, point.index),
                    &point.position.to_array(),
                )?;
                out.push_str(&format!(
                    "{}    <viaPoint type=\"FIXPOINT\">{}</viaPoint>\n",
                    pad,
                    vec3(point.position)
                ));
            }
            out.push_str(&format!("{}  </link>\n", pad));
        }
        out.push_str(&format!("{}</myoMuscle>\n", pad));
    }
    Ok(())
}

/// Generate model.config
pub fn generate_config(options: &ExportOptions) -> String {
    let mut config = String::new();
    write_declaration(&mut config);
    config.push_str("<model>\n");
    write_text_element(&mut config, 2, "name", &options.model_name);
    write_text_element(&mut config, 2, "version", "1.0");
    config.push_str(&format!("  <sdf version=\"{}\">model.sdf</sdf>\n", SDF_VERSION));
    config.push_str("  <author>\n");
    write_text_element(&mut config, 4, "name", &options.author_name);
    write_text_element(&mut config, 4, "email", &options.author_email);
    config.push_str("  </author>\n");
    write_text_element(&mut config, 2, "description", &options.description);
    config.push_str("</model>\n");
    config
}

/// Generate cardsflow.xml: the plugin's muscle tree under a `<cardsflow>` root
pub fn generate_cardsflow(model: &ExportModel<'_>) -> Result<String, ExportError> {
    let mut out = String::new();
    write_declaration(&mut out);
    out.push_str("<cardsflow>\n");
    write_muscle_tree(&mut out, &model.attachments.groups, 2)?;
    out.push_str("</cardsflow>\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INERTIA_TO_SI;
    use crate::export::test_support::sample;

    fn via_options() -> ExportOptions {
        ExportOptions {
            export_via_points: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_link_element() {
        let sample = sample();
        let sdf = generate_model(&sample.model(), &ExportOptions::default()).unwrap();

        assert!(sdf.starts_with("<?xml"));
        assert!(sdf.contains("<sdf version=\"1.6\">"));
        assert!(sdf.contains("    <link name=\"base\">\n      <self_collide>false</self_collide>\n"));
        assert!(sdf.contains("      <pose frame=\"\">0 0 0.1 0 0 0</pose>\n"));
        assert!(sdf.contains("        <pose frame=\"\">0 0 0 0 0 0</pose>\n        <mass>2</mass>\n"));
        assert!(sdf.contains(&format!("<ixx>{}</ixx>", num(100.0 * INERTIA_TO_SI))));
        assert!(sdf.contains(&format!("<ixz>{}</ixz>", num(3.0 * INERTIA_TO_SI))));
        assert!(sdf.contains("<collision name=\"base_collision\">"));
        assert!(sdf.contains("<visual name=\"arm_visual\">"));
        assert!(sdf.contains("<uri>model://robot/meshes/CAD/arm.stl</uri>"));
        assert!(sdf.contains("<scale>0.001 0.001 0.001</scale>"));
        // no via-point options, no plugin
        assert!(!sdf.contains("<plugin"));
    }

    #[test]
    fn test_joint_element() {
        let sample = sample();
        let sdf = generate_model(&sample.model(), &ExportOptions::default()).unwrap();
        let expected = "    <joint name=\"shoulder\" type=\"revolute\">
      <parent>base</parent>
      <child>arm</child>
      <pose frame=\"\">-0.05 0 0 0 0 0</pose>
      <axis>
        <xyz>0 0 1</xyz>
        <limit>
          <lower>-1</lower>
          <upper>1</upper>
        </limit>
        <use_parent_model_frame>0</use_parent_model_frame>
      </axis>
    </joint>
";
        assert!(sdf.contains(expected), "{sdf}");
    }

    #[test]
    fn test_plugin_link_runs() {
        let sample = sample();
        let sdf = generate_model(&sample.model(), &via_options()).unwrap();
        let expected = "    <plugin filename=\"libcardsflow_gazebo_plugin.so\" name=\"cardsflow_gazebo_plugin\">
      <myoMuscle name=\"motor3\">
        <link name=\"base\">
          <viaPoint type=\"FIXPOINT\">0.01 0 0</viaPoint>
          <viaPoint type=\"FIXPOINT\">0.02 0 0</viaPoint>
        </link>
        <link name=\"arm\">
          <viaPoint type=\"FIXPOINT\">0.05 0 0</viaPoint>
        </link>
      </myoMuscle>
      <endEffector name=\"endeffector0\" link=\"arm\">0.1 0 0</endEffector>
      <marker link=\"base\">0 0 0.3</marker>
    </plugin>
";
        assert!(sdf.contains(expected), "{sdf}");
    }

    #[test]
    fn test_missing_joint_link_fails() {
        let mut sample = sample();
        sample.graph.joints[0].child = "ghost".to_string();
        assert_eq!(
            generate_model(&sample.model(), &ExportOptions::default()),
            Err(ExportError::LinkNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_self_collide_flag() {
        let sample = sample();
        let options = ExportOptions {
            self_collide: true,
            ..Default::default()
        };
        let sdf = generate_model(&sample.model(), &options).unwrap();
        assert_eq!(sdf.matches("<self_collide>true</self_collide>").count(), 2);
    }

    #[test]
    fn test_config() {
        let options = ExportOptions {
            model_name: "roboy".to_string(),
            author_name: "Jane".to_string(),
            description: "legs & arms".to_string(),
            ..Default::default()
        };
        let config = generate_config(&options);
        assert!(config.contains("  <name>roboy</name>\n  <version>1.0</version>\n"));
        assert!(config.contains("<sdf version=\"1.6\">model.sdf</sdf>"));
        assert!(config.contains("    <name>Jane</name>\n    <email></email>\n"));
        assert!(config.contains("<description>legs &amp; arms</description>"));
    }

    #[test]
    fn test_cardsflow_matches_plugin_tree() {
        let sample = sample();
        let cardsflow = generate_cardsflow(&sample.model()).unwrap();
        assert!(cardsflow.contains("<cardsflow>\n  <myoMuscle name=\"motor3\">\n    <link name=\"base\">\n"));
        assert!(cardsflow.contains("      <viaPoint type=\"FIXPOINT\">0.05 0 0</viaPoint>\n"));
        assert!(cardsflow.ends_with("</cardsflow>\n"));
    }
}
