//! Number formatting shared by every document
//!
//! Every document formats numbers through these functions so the same value
//! has the same text in the SDF model and in every sidecar.

use glam::DVec3;

use crate::convert::Pose;

use super::ExportError;

/// Shortest round-trip decimal text; negative zero prints as `0`
pub fn num(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

/// `x y z`
pub fn vec3(v: DVec3) -> String {
    format!("{} {} {}", num(v.x), num(v.y), num(v.z))
}

/// `x y z roll pitch yaw`
pub fn pose(p: &Pose) -> String {
    p.to_array().map(num).join(" ")
}

/// Reject NaN and infinities before they reach a document
pub fn ensure_finite(what: &str, values: &[f64]) -> Result<(), ExportError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ExportError::NonFinite(what.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Rpy;

    #[test]
    fn test_num() {
        assert_eq!(num(0.05), "0.05");
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(1.0), "1");
        assert_eq!(num(-1.5), "-1.5");
        assert_eq!(num(546.0), "546");
    }

    #[test]
    fn test_num_round_trips() {
        for value in [0.1 + 0.2, 1e-9, -123.456_789, 0.0001 * 3.0] {
            assert_eq!(num(value).parse::<f64>().unwrap(), value);
        }
    }

    #[test]
    fn test_pose_text() {
        let p = Pose::new(
            DVec3::new(0.05, 0.0, -0.0),
            Rpy {
                roll: 0.0,
                pitch: 0.5,
                yaw: 0.0,
            },
        );
        assert_eq!(pose(&p), "0.05 0 0 0 0.5 0");
        assert_eq!(vec3(DVec3::Z), "0 0 1");
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("ok", &[1.0, -2.0]).is_ok());
        assert!(matches!(
            ensure_finite("link 'base' mass", &[f64::NAN]),
            Err(ExportError::NonFinite(_))
        ));
    }
}
