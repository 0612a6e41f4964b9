//! Link cache persisted across export runs

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::body::Link;

/// File format version
const CACHE_VERSION: u32 = 1;

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkCacheData {
    version: u32,
    links: Vec<Link>,
}

/// Previously resolved links keyed by name
///
/// Append-only: a cached link is never replaced by a newer resolution.
/// Whether a cached link still matches the CAD model is the caller's concern.
#[derive(Debug, Clone, Default)]
pub struct LinkCache {
    links: HashMap<String, Link>,
    dirty: bool,
}

impl LinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| CacheError::Io(e.to_string()))?;
        let data: LinkCacheData =
            ron::from_str(&content).map_err(|e| CacheError::Deserialize(e.to_string()))?;
        if data.version != CACHE_VERSION {
            return Err(CacheError::Version(data.version));
        }
        Ok(Self {
            links: data.links.into_iter().map(|l| (l.name.clone(), l)).collect(),
            dirty: false,
        })
    }

    /// Load a cache file, or start empty if it does not exist yet
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save to a RON file, links sorted by name
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let mut links: Vec<Link> = self.links.values().cloned().collect();
        links.sort_by(|a, b| a.name.cmp(&b.name));
        let data = LinkCacheData {
            version: CACHE_VERSION,
            links,
        };
        let content = ron::ser::to_string_pretty(&data, ron::ser::PrettyConfig::default())
            .map_err(|e| CacheError::Serialize(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| CacheError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }

    /// Add a link unless one with the same name is cached; returns whether it was added
    pub fn insert(&mut self, link: Link) -> bool {
        if self.links.contains_key(&link.name) {
            return false;
        }
        self.links.insert(link.name.clone(), link);
        self.dirty = true;
        true
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Whether links were added since loading
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Link cache errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Unsupported cache version: {0}")]
    Version(u32),
}
