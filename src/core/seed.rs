//! Provenance-tagged batches of candidate code addresses.

use serde::{Deserialize, Serialize};

/// Ordered candidate entry points discovered from one container table.
///
/// `source` names where the addresses came from (for example `"DT_INIT"` or
/// `"exported functions"`). Zero is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedGroup {
    pub source: String,
    pub addresses: Vec<u64>,
}

impl SeedGroup {
    /// Build a group, dropping zero addresses. Returns `None` when nothing is left.
    pub fn new<I>(source: impl Into<String>, addresses: I) -> Option<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let addresses: Vec<u64> = addresses.into_iter().filter(|&a| a != 0).collect();
        if addresses.is_empty() {
            None
        } else {
            Some(Self {
                source: source.into(),
                addresses,
            })
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Flatten groups in order, keeping only the first occurrence of each address.
pub fn flatten_unique(groups: &[SeedGroup]) -> Vec<u64> {
    let mut seen = std::collections::HashSet::new();
    groups
        .iter()
        .flat_map(|g| g.addresses.iter().copied())
        .filter(|a| seen.insert(*a))
        .collect()
}
