//! SDF read-back
//!
//! Recovers the structural content of a generated model.sdf: model name,
//! link names with their poses and masses, and the joint list. Everything
//! else in the document is skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// A link as read back from SDF
#[derive(Debug, Clone, PartialEq)]
pub struct SdfLink {
    pub name: String,
    /// `x y z roll pitch yaw`
    pub pose: [f64; 6],
    pub mass: f64,
}

/// A joint as read back from SDF
#[derive(Debug, Clone, PartialEq)]
pub struct SdfJoint {
    pub name: String,
    pub joint_type: String,
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdfSummary {
    pub model_name: String,
    pub links: Vec<SdfLink>,
    pub joints: Vec<SdfJoint>,
}

impl SdfSummary {
    pub fn link(&self, name: &str) -> Option<&SdfLink> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn joint(&self, name: &str) -> Option<&SdfJoint> {
        self.joints.iter().find(|j| j.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadError {
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("No <model> element")]
    MissingModel,
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("Invalid number list '{0}'")]
    InvalidNumber(String),
}

/// Element currently being filled
enum Open {
    Link(SdfLink),
    Joint(SdfJoint),
}

/// Parse the structural summary of an SDF document
pub fn parse_sdf(xml: &str) -> Result<SdfSummary, ReadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut summary: Option<SdfSummary> = None;
    let mut open: Option<Open> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                match (name.as_slice(), path.len()) {
                    (b"model", 1) => {
                        summary = Some(SdfSummary {
                            model_name: attribute(e, "model", "name")?,
                            ..Default::default()
                        });
                    }
                    (b"link", 2) => {
                        open = Some(Open::Link(SdfLink {
                            name: attribute(e, "link", "name")?,
                            pose: [0.0; 6],
                            mass: 0.0,
                        }));
                    }
                    (b"joint", 2) => {
                        open = Some(Open::Joint(SdfJoint {
                            name: attribute(e, "joint", "name")?,
                            joint_type: attribute(e, "joint", "type")?,
                            parent: String::new(),
                            child: String::new(),
                        }));
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map_err(|e| ReadError::Xml(e.to_string()))?;
                let tail: Vec<&[u8]> = path.iter().skip(3).map(|p| p.as_slice()).collect();
                match (&mut open, tail.as_slice()) {
                    (Some(Open::Link(link)), [b"pose"]) => link.pose = parse_pose(&text)?,
                    (Some(Open::Link(link)), [b"inertial", b"mass"]) => {
                        link.mass = parse_number(&text)?
                    }
                    (Some(Open::Joint(joint)), [b"parent"]) => joint.parent = text.into_owned(),
                    (Some(Open::Joint(joint)), [b"child"]) => joint.child = text.into_owned(),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
                if path.len() == 2 {
                    if let (Some(summary), Some(done)) = (summary.as_mut(), open.take()) {
                        match done {
                            Open::Link(link) => summary.links.push(link),
                            Open::Joint(joint) => summary.joints.push(joint),
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ReadError::Xml(e.to_string())),
        }
        buf.clear();
    }

    summary.ok_or(ReadError::MissingModel)
}

fn attribute(
    e: &BytesStart,
    element: &'static str,
    name: &'static str,
) -> Result<String, ReadError> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return attr
                .unescape_value()
                .map(|v| v.into_owned())
                .map_err(|e| ReadError::Xml(e.to_string()));
        }
    }
    Err(ReadError::MissingAttribute {
        element,
        attribute: name,
    })
}

fn parse_number(s: &str) -> Result<f64, ReadError> {
    s.trim()
        .parse()
        .map_err(|_| ReadError::InvalidNumber(s.to_string()))
}

fn parse_pose(s: &str) -> Result<[f64; 6], ReadError> {
    let values = s
        .split_whitespace()
        .map(|p| p.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ReadError::InvalidNumber(s.to_string()))?;
    values
        .try_into()
        .map_err(|_| ReadError::InvalidNumber(s.to_string()))
}
