//! Annotation naming-convention parser
//!
//! CAD entities carry their export semantics in their names. Each name is
//! split on `_` and the first field selects the kind:
//!
//! | name                          | kind                  |
//! |-------------------------------|-----------------------|
//! | `EXPORT_<name>`               | rigid group or joint  |
//! | `COM_<link>`                  | center-of-mass override |
//! | `VP_motor<id>_<link>_<index>` | via-point             |
//! | `EE_<link>`                   | end-effector          |
//! | `VM_<link>`                   | visual marker         |
//! | `LS_<link>_<index>`           | lighthouse sensor     |
//!
//! Link names may themselves contain underscores. Exported names and the link
//! fields that refer to them go through the same [`sanitize_name`], so
//! `COM_left hand` finds the link exported as `EXPORT_left hand`. Names are
//! parsed exactly once; everything downstream works on [`Annotation`].

use serde::{Deserialize, Serialize};

const EXPORT_TAG: &str = "EXPORT";
const COM_TAG: &str = "COM";
const VIA_POINT_TAG: &str = "VP";
const END_EFFECTOR_TAG: &str = "EE";
const MARKER_TAG: &str = "VM";
const SENSOR_TAG: &str = "LS";
const MOTOR_PREFIX: &str = "motor";

/// A classified annotation name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// Rigid group or joint tagged for export
    Export { name: String },
    /// Explicit center of mass for a link
    CenterOfMass { link: String },
    /// Cable/muscle via-point
    ViaPoint {
        motor: String,
        link: String,
        index: u32,
    },
    /// End-effector point
    EndEffector { link: String },
    /// Visual marker point
    VisualMarker { link: String },
    /// Lighthouse (motion capture) sensor
    LighthouseSensor { link: String, index: u32 },
}

impl Annotation {
    /// Short label for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Annotation::Export { .. } => "export",
            Annotation::CenterOfMass { .. } => "center of mass",
            Annotation::ViaPoint { .. } => "via-point",
            Annotation::EndEffector { .. } => "end-effector",
            Annotation::VisualMarker { .. } => "marker",
            Annotation::LighthouseSensor { .. } => "lighthouse sensor",
        }
    }

    /// Link this annotation refers to, if any
    pub fn link(&self) -> Option<&str> {
        match self {
            Annotation::Export { .. } => None,
            Annotation::CenterOfMass { link }
            | Annotation::ViaPoint { link, .. }
            | Annotation::EndEffector { link }
            | Annotation::VisualMarker { link }
            | Annotation::LighthouseSensor { link, .. } => Some(link),
        }
    }
}

/// Malformed annotation names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    #[error("'{name}': expected at least {expected} '_'-separated fields, found {found}")]
    TooFewFields {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("'{name}': motor field '{field}' must look like 'motor<id>'")]
    InvalidMotor { name: String, field: String },
    #[error("'{name}': index '{field}' is not a non-negative integer")]
    InvalidIndex { name: String, field: String },
    #[error("'{name}': empty name after sanitizing")]
    EmptyName { name: String },
}

impl AnnotationError {
    /// The offending annotation name
    pub fn name(&self) -> &str {
        match self {
            AnnotationError::TooFewFields { name, .. }
            | AnnotationError::InvalidMotor { name, .. }
            | AnnotationError::InvalidIndex { name, .. }
            | AnnotationError::EmptyName { name } => name,
        }
    }
}

/// Parse an annotation name
///
/// Returns `Ok(None)` for names without a recognized tag; those are simply not
/// annotations. A recognized tag with the wrong shape is an error for that one
/// name only.
pub fn parse_annotation(name: &str) -> Result<Option<Annotation>, AnnotationError> {
    let fields: Vec<&str> = name.split('_').collect();

    let annotation = match fields[0] {
        EXPORT_TAG => {
            require_fields(name, &fields, 2)?;
            Annotation::Export {
                name: cleaned_name(name, &fields[1..])?,
            }
        }
        COM_TAG => {
            require_fields(name, &fields, 2)?;
            Annotation::CenterOfMass {
                link: cleaned_name(name, &fields[1..])?,
            }
        }
        VIA_POINT_TAG => {
            require_fields(name, &fields, 4)?;
            let motor = fields[1]
                .strip_prefix(MOTOR_PREFIX)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| AnnotationError::InvalidMotor {
                    name: name.to_string(),
                    field: fields[1].to_string(),
                })?;
            let last = fields.len() - 1;
            Annotation::ViaPoint {
                motor: motor.to_string(),
                link: cleaned_name(name, &fields[2..last])?,
                index: parse_index(name, fields[last])?,
            }
        }
        END_EFFECTOR_TAG => {
            require_fields(name, &fields, 2)?;
            Annotation::EndEffector {
                link: cleaned_name(name, &fields[1..])?,
            }
        }
        MARKER_TAG => {
            require_fields(name, &fields, 2)?;
            Annotation::VisualMarker {
                link: cleaned_name(name, &fields[1..])?,
            }
        }
        SENSOR_TAG => {
            require_fields(name, &fields, 3)?;
            let last = fields.len() - 1;
            Annotation::LighthouseSensor {
                link: cleaned_name(name, &fields[1..last])?,
                index: parse_index(name, fields[last])?,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(annotation))
}

/// Remove characters that are not allowed in link names (`:` and spaces)
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| *c != ':' && *c != ' ').collect()
}

/// Rejoin the name fields and sanitize them the way link names are
fn cleaned_name(name: &str, fields: &[&str]) -> Result<String, AnnotationError> {
    let cleaned = sanitize_name(&fields.join("_"));
    if cleaned.is_empty() {
        return Err(AnnotationError::EmptyName {
            name: name.to_string(),
        });
    }
    Ok(cleaned)
}

fn require_fields(name: &str, fields: &[&str], expected: usize) -> Result<(), AnnotationError> {
    if fields.len() < expected || fields[1..].iter().all(|f| f.is_empty()) {
        return Err(AnnotationError::TooFewFields {
            name: name.to_string(),
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn parse_index(name: &str, field: &str) -> Result<u32, AnnotationError> {
    field.parse().map_err(|_| AnnotationError::InvalidIndex {
        name: name.to_string(),
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_keeps_underscores() {
        assert_eq!(
            parse_annotation("EXPORT_upper_arm").unwrap(),
            Some(Annotation::Export {
                name: "upper_arm".to_string()
            })
        );
    }

    #[test]
    fn test_export_sanitizes_name() {
        assert_eq!(
            parse_annotation("EXPORT_left hand:1").unwrap(),
            Some(Annotation::Export {
                name: "lefthand1".to_string()
            })
        );
    }

    #[test]
    fn test_link_references_sanitized_like_exports() {
        let Some(Annotation::Export { name }) = parse_annotation("EXPORT_left hand").unwrap()
        else {
            panic!("expected an export annotation");
        };
        let com = parse_annotation("COM_left hand").unwrap().unwrap();
        let via = parse_annotation("VP_motor1_left hand_0").unwrap().unwrap();
        let sensor = parse_annotation("LS_left hand:1_2").unwrap().unwrap();

        assert_eq!(name, "lefthand");
        assert_eq!(com.link(), Some("lefthand"));
        assert_eq!(via.link(), Some("lefthand"));
        assert_eq!(sensor.link(), Some("lefthand1"));
        assert!(matches!(
            parse_annotation("VP_motor1_ _0"),
            Err(AnnotationError::EmptyName { .. })
        ));
    }

    #[test]
    fn test_via_point() {
        assert_eq!(
            parse_annotation("VP_motor3_arm_1").unwrap(),
            Some(Annotation::ViaPoint {
                motor: "3".to_string(),
                link: "arm".to_string(),
                index: 1,
            })
        );
        assert_eq!(
            parse_annotation("VP_motor12_upper_arm_10").unwrap(),
            Some(Annotation::ViaPoint {
                motor: "12".to_string(),
                link: "upper_arm".to_string(),
                index: 10,
            })
        );
    }

    #[test]
    fn test_via_point_missing_index() {
        assert!(matches!(
            parse_annotation("VP_motor3_arm"),
            Err(AnnotationError::TooFewFields { expected: 4, .. })
        ));
        assert!(matches!(
            parse_annotation("VP_motor3_arm_x"),
            Err(AnnotationError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_via_point_bad_motor() {
        assert!(matches!(
            parse_annotation("VP_cable3_arm_1"),
            Err(AnnotationError::InvalidMotor { .. })
        ));
        assert!(matches!(
            parse_annotation("VP_motor_arm_1"),
            Err(AnnotationError::InvalidMotor { .. })
        ));
    }

    #[test]
    fn test_point_kinds() {
        assert_eq!(
            parse_annotation("EE_hand_tip").unwrap(),
            Some(Annotation::EndEffector {
                link: "hand_tip".to_string()
            })
        );
        assert_eq!(
            parse_annotation("VM_torso").unwrap(),
            Some(Annotation::VisualMarker {
                link: "torso".to_string()
            })
        );
        assert_eq!(
            parse_annotation("LS_upper_arm_7").unwrap(),
            Some(Annotation::LighthouseSensor {
                link: "upper_arm".to_string(),
                index: 7,
            })
        );
        assert_eq!(
            parse_annotation("COM_base").unwrap(),
            Some(Annotation::CenterOfMass {
                link: "base".to_string()
            })
        );
    }

    #[test]
    fn test_unrecognized_is_ignored() {
        assert_eq!(parse_annotation("Point12").unwrap(), None);
        assert_eq!(parse_annotation("VPX_motor1_arm_1").unwrap(), None);
        assert_eq!(parse_annotation("").unwrap(), None);
    }

    #[test]
    fn test_bare_tag_is_malformed() {
        assert!(parse_annotation("EXPORT").is_err());
        assert!(parse_annotation("EE_").is_err());
        assert!(parse_annotation("EXPORT_:").is_err());
    }
}
