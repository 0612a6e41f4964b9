//! Occurrence arena with memoized link ownership

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::{Occurrence, Scene};

/// Arena view over the scene's occurrences
///
/// Nodes are addressed by index. Each node gets an owning-link back-reference
/// the first time a rigid group claims it; joint endpoints are resolved
/// against that memo instead of searching every group again.
#[derive(Debug, Clone)]
pub struct OccurrenceTree<'a> {
    nodes: Vec<&'a Occurrence>,
    index: HashMap<Uuid, usize>,
    owners: Vec<Option<String>>,
    /// Body mass of each node plus its descendants (kg)
    masses: Vec<f64>,
}

impl<'a> OccurrenceTree<'a> {
    /// Build the arena, rejecting duplicate ids and dangling child references
    pub fn new(scene: &'a Scene) -> Result<Self, SceneError> {
        let mut index = HashMap::with_capacity(scene.occurrences.len());
        for (i, occurrence) in scene.occurrences.iter().enumerate() {
            if index.insert(occurrence.id, i).is_some() {
                return Err(SceneError::DuplicateOccurrence(occurrence.id));
            }
        }
        for occurrence in &scene.occurrences {
            for child in &occurrence.children {
                if !index.contains_key(child) {
                    return Err(SceneError::DanglingChild {
                        parent: occurrence.id,
                        child: *child,
                    });
                }
            }
        }

        let nodes: Vec<&Occurrence> = scene.occurrences.iter().collect();
        let masses = subtree_masses(&nodes, &index);
        Ok(Self {
            owners: vec![None; nodes.len()],
            nodes,
            index,
            masses,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Arena index of an occurrence
    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: Uuid) -> Option<&'a Occurrence> {
        self.index_of(id).map(|i| self.nodes[i])
    }

    pub fn node(&self, index: usize) -> &'a Occurrence {
        self.nodes[index]
    }

    /// All nodes reachable from `roots` (roots included), depth-first
    ///
    /// Uses an explicit stack so depth is unbounded; shared children are
    /// visited once. Unknown root ids are reported back in the error.
    pub fn subtree(&self, roots: &[Uuid]) -> Result<Vec<usize>, SceneError> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::with_capacity(roots.len());

        for id in roots.iter().rev() {
            let i = self
                .index_of(*id)
                .ok_or(SceneError::UnknownOccurrence(*id))?;
            stack.push(i);
        }

        while let Some(i) = stack.pop() {
            if !visited.insert(i) {
                continue;
            }
            order.push(i);
            for child in self.nodes[i].children.iter().rev() {
                if let Some(&c) = self.index.get(child) {
                    stack.push(c);
                }
            }
        }

        Ok(order)
    }

    /// Total body mass of a node and all of its descendants (kg)
    pub fn subtree_mass(&self, index: usize) -> f64 {
        self.masses[index]
    }

    /// Record `link` as the owner of every node in `nodes`
    ///
    /// The first claim wins. Returns the nodes that were already owned by a
    /// different link.
    pub fn claim(&mut self, nodes: &[usize], link: &str) -> Vec<(usize, String)> {
        let mut conflicts = Vec::new();
        for &i in nodes {
            match &self.owners[i] {
                None => self.owners[i] = Some(link.to_string()),
                Some(owner) if owner != link => conflicts.push((i, owner.clone())),
                Some(_) => {}
            }
        }
        conflicts
    }

    /// Link owning an occurrence, if any group claimed it
    pub fn owner_of(&self, id: Uuid) -> Option<&str> {
        self.index_of(id)
            .and_then(|i| self.owners[i].as_deref())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    New,
    Open,
    Done,
}

/// Subtree mass of every node in one post-order pass
///
/// A child reached again while its own subtree is still open (a cycle)
/// contributes nothing.
fn subtree_masses(nodes: &[&Occurrence], index: &HashMap<Uuid, usize>) -> Vec<f64> {
    let mut masses: Vec<f64> = nodes
        .iter()
        .map(|o| o.bodies.iter().map(|b| b.mass).sum())
        .collect();
    let mut state = vec![Visit::New; nodes.len()];

    for root in 0..nodes.len() {
        if state[root] != Visit::New {
            continue;
        }
        let mut stack = vec![(root, false)];
        while let Some((i, expanded)) = stack.pop() {
            if expanded {
                let below: f64 = nodes[i]
                    .children
                    .iter()
                    .filter_map(|c| index.get(c))
                    .filter(|&&c| c != i && state[c] == Visit::Done)
                    .map(|&c| masses[c])
                    .sum();
                masses[i] += below;
                state[i] = Visit::Done;
                continue;
            }
            if state[i] != Visit::New {
                continue;
            }
            state[i] = Visit::Open;
            stack.push((i, true));
            for child in &nodes[i].children {
                if let Some(&c) = index.get(child) {
                    if state[c] == Visit::New {
                        stack.push((c, false));
                    }
                }
            }
        }
    }

    masses
}

/// Scene-level errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Duplicate occurrence id: {0}")]
    DuplicateOccurrence(Uuid),
    #[error("Occurrence {parent} references unknown child {child}")]
    DanglingChild { parent: Uuid, child: Uuid },
    #[error("Unknown occurrence: {0}")]
    UnknownOccurrence(Uuid),
}
