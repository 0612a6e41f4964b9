//! Rigid-group aggregation into links
//!
//! A link is the exported rigid unit. Its mass, center of mass and inertia are
//! accumulated from every body under the group's member occurrences, at any
//! depth. Quantities stay in host units (cm, kg, kg*cm^2) until serialization.

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SMALL_PART_MASS;
use crate::export::ExportOptions;
use crate::inertia::InertiaMatrix;
use crate::scene::{OccurrenceTree, RigidGroup, SceneError, Transform};

/// Where a link's center of mass came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComSource {
    /// Mass-weighted average of the member bodies
    Computed,
    /// Explicit `COM_<link>` construction point
    Override,
}

/// The exported rigid unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    /// Sum of member body masses (kg)
    pub total_mass: f64,
    /// Assembly-frame center of mass (cm)
    pub center_of_mass: DVec3,
    pub com_source: ComSource,
    /// Summed inertia, or the placeholder tensor (kg*cm^2)
    pub inertia: InertiaMatrix,
    /// Number of bodies that contributed to the mass
    pub body_count: usize,
    /// Link frame: translation = center of mass, rotation = identity or group-supplied
    pub reference: Transform,
}

/// Links in resolution order, unique by name
#[derive(Debug, Clone, Default)]
pub struct ResolvedLinks {
    links: Vec<Link>,
    index: HashMap<String, usize>,
}

impl ResolvedLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link; returns `false` (and keeps the existing one) on a name clash
    pub fn insert(&mut self, link: Link) -> bool {
        if self.index.contains_key(&link.name) {
            return false;
        }
        self.index.insert(link.name.clone(), self.links.len());
        self.links.push(link);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Link> {
        self.index.get(name).map(|&i| &self.links[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl FromIterator<Link> for ResolvedLinks {
    fn from_iter<I: IntoIterator<Item = Link>>(iter: I) -> Self {
        let mut links = Self::new();
        for link in iter {
            links.insert(link);
        }
        links
    }
}

/// Link resolution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("Link '{link}' has no bodies")]
    EmptyGroup { link: String },
    #[error("Link '{link}' has total mass {mass}; center of mass is undefined")]
    ZeroMass { link: String, mass: f64 },
    #[error("Link '{link}' references unknown occurrence {id}")]
    UnknownOccurrence { link: String, id: Uuid },
    #[error("Link '{link}': {message}")]
    Scene { link: String, message: String },
}

/// Arena indices of every member of a group, depth-first
pub fn member_nodes(
    link: &str,
    group: &RigidGroup,
    tree: &OccurrenceTree<'_>,
) -> Result<Vec<usize>, ResolveError> {
    tree.subtree(&group.occurrences).map_err(|e| match e {
        SceneError::UnknownOccurrence(id) => ResolveError::UnknownOccurrence {
            link: link.to_string(),
            id,
        },
        other => ResolveError::Scene {
            link: link.to_string(),
            message: other.to_string(),
        },
    })
}

/// Walk a group's member subtrees and record `link` as their owner
///
/// Returns the arena indices of every member, depth-first. Members already
/// owned by another link keep their first owner.
pub fn claim_members(
    link: &str,
    group: &RigidGroup,
    tree: &mut OccurrenceTree<'_>,
) -> Result<Vec<usize>, ResolveError> {
    let nodes = member_nodes(link, group, tree)?;
    claim_nodes(link, &nodes, tree);
    Ok(nodes)
}

fn claim_nodes(link: &str, nodes: &[usize], tree: &mut OccurrenceTree<'_>) {
    for (i, owner) in tree.claim(nodes, link) {
        tracing::warn!(
            "Occurrence '{}' is in both '{}' and '{}', keeping '{}'",
            tree.node(i).name,
            owner,
            link,
            owner
        );
    }
}

/// Aggregate one rigid group into a link
///
/// `overrides` maps link names to explicit assembly-frame centers of mass
/// (from `COM_<link>` points). With an override the weighted average is not
/// computed at all. Members are claimed for `name` only once the link is
/// known to be valid; a rejected group leaves them to later groups.
pub fn resolve_link(
    name: &str,
    group: &RigidGroup,
    tree: &mut OccurrenceTree<'_>,
    overrides: &HashMap<String, DVec3>,
    options: &ExportOptions,
) -> Result<Link, ResolveError> {
    let nodes = member_nodes(name, group, tree)?;

    let mut total_mass = 0.0;
    let mut weighted = DVec3::ZERO;
    let mut inertia = InertiaMatrix::ZERO;
    let mut body_count = 0;

    for &i in &nodes {
        // A light node implies every node below it is light too
        if options.remove_small_parts && tree.subtree_mass(i) < SMALL_PART_MASS {
            tracing::debug!("Skipping small part '{}' in '{}'", tree.node(i).name, name);
            continue;
        }
        let occurrence = tree.node(i);
        for body in &occurrence.bodies {
            total_mass += body.mass;
            weighted += occurrence.transform.transform_point(body.center_of_mass) * body.mass;
            inertia += body.inertia;
            body_count += 1;
        }
    }

    if body_count == 0 {
        return Err(ResolveError::EmptyGroup {
            link: name.to_string(),
        });
    }

    let (center_of_mass, com_source) = match overrides.get(name) {
        Some(com) => (*com, ComSource::Override),
        None => {
            if total_mass <= 0.0 {
                return Err(ResolveError::ZeroMass {
                    link: name.to_string(),
                    mass: total_mass,
                });
            }
            (weighted / total_mass, ComSource::Computed)
        }
    };

    claim_nodes(name, &nodes, tree);

    if options.dummy_inertia {
        inertia = InertiaMatrix::dummy();
    } else if !inertia.is_valid() {
        tracing::warn!("Link '{}' has a non-physical inertia tensor", name);
    }

    let rows = group.orientation.unwrap_or(Transform::IDENTITY.rows);

    tracing::info!(
        "Link '{}': {} bodies, mass {} kg, COM ({}, {}, {}) cm [{}]",
        name,
        body_count,
        total_mass,
        center_of_mass.x,
        center_of_mass.y,
        center_of_mass.z,
        match com_source {
            ComSource::Computed => "computed",
            ComSource::Override => "override",
        }
    );

    Ok(Link {
        name: name.to_string(),
        total_mass,
        center_of_mass,
        com_source,
        inertia,
        body_count,
        reference: Transform::new(rows, center_of_mass),
    })
}
