//! XML writing helpers shared by the document generators

use crate::convert::Pose;

use super::format;

/// `<?xml ...?>` line used by every XML document
pub fn write_declaration(out: &mut String) {
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
}

/// `<tag>text</tag>` on its own line, `indent` spaces deep
pub fn write_text_element(out: &mut String, indent: usize, tag: &str, text: &str) {
    out.push_str(&format!(
        "{}<{}>{}</{}>\n",
        " ".repeat(indent),
        tag,
        xml_escape(text),
        tag
    ));
}

/// `<pose frame="">x y z roll pitch yaw</pose>`
pub fn write_pose(out: &mut String, pose: &Pose, indent: usize) {
    out.push_str(&format!(
        "{}<pose frame=\"\">{}</pose>\n",
        " ".repeat(indent),
        format::pose(pose)
    ));
}

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_escape() {
        assert_eq!(xml_escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("upper_arm-2"), "upper_arm-2");
        assert_eq!(sanitize_filename("../base"), "___base");
    }

    #[test]
    fn test_text_element_and_pose() {
        let mut out = String::new();
        write_text_element(&mut out, 4, "mass", "1.5");
        write_pose(&mut out, &Pose::from_position(DVec3::new(0.1, 0.0, 0.0)), 2);
        assert_eq!(
            out,
            "    <mass>1.5</mass>\n  <pose frame=\"\">0.1 0 0 0 0 0</pose>\n"
        );
    }
}
