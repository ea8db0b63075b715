pub mod document;
pub mod session;

pub use document::{DecodedModel, GltfError, ModelDocument};
pub use session::PendingLoad;

use crate::error::ErrorKind;
use std::collections::BTreeMap;
use std::fmt;

/// Resource identifier -> bytes, as supplied by the host between the two
/// load phases.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(id.into(), bytes)
    }

    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for ResourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, bytes)| (id, bytes.len())))
            .finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<u8>)> for ResourceMap {
    fn from_iter<I: IntoIterator<Item = (K, Vec<u8>)>>(iter: I) -> Self {
        let mut map = ResourceMap::new();
        for (id, bytes) in iter {
            map.insert(id, bytes);
        }
        map
    }
}

/// Failure of either load phase. Commit failures hand the supplied resources
/// back so the caller can retry without refetching.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to parse model: {0}")]
    Parse(#[from] GltfError),
    #[error("finish_model_load called with no pending load")]
    NoPendingLoad,
    #[error("missing required resources: {}", .missing.join(", "))]
    MissingResources {
        missing: Vec<String>,
        resources: ResourceMap,
    },
    #[error("failed to decode model: {source}")]
    Decode {
        source: GltfError,
        resources: ResourceMap,
    },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Parse(_) | LoadError::Decode { .. } => ErrorKind::Parse,
            LoadError::NoPendingLoad => ErrorKind::Misuse,
            LoadError::MissingResources { .. } => ErrorKind::IncompleteResources,
        }
    }

    /// Takes back the resource map a failed commit was given.
    pub fn into_resources(self) -> Option<ResourceMap> {
        match self {
            LoadError::MissingResources { resources, .. } | LoadError::Decode { resources, .. } => {
                Some(resources)
            }
            LoadError::Parse(_) | LoadError::NoPendingLoad => None,
        }
    }
}
