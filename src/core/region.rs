//! Virtual-address to file-offset translation.

use serde::{Deserialize, Serialize};

/// One loadable segment or section: `byte_len` bytes of file content starting
/// at `file_offset` appear at `start_va` once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappedRegion {
    pub start_va: u64,
    pub file_offset: u64,
    pub byte_len: u64,
}

impl MappedRegion {
    pub fn new(start_va: u64, file_offset: u64, byte_len: u64) -> Self {
        Self {
            start_va,
            file_offset,
            byte_len,
        }
    }

    /// True when `va` falls inside `[start_va, start_va + byte_len)`.
    pub fn contains(&self, va: u64) -> bool {
        va >= self.start_va && va - self.start_va < self.byte_len
    }

    /// File offset of `va`, if this region holds it.
    pub fn offset_of(&self, va: u64) -> Option<u64> {
        if self.contains(va) {
            self.file_offset.checked_add(va - self.start_va)
        } else {
            None
        }
    }
}

/// Translate a virtual address to a file offset.
///
/// Regions are consulted in the order given and the first one containing
/// `va` wins. Empty regions never match. Addresses backed only by zero-fill
/// memory (or not mapped at all) yield `None`.
pub fn translate(regions: &[MappedRegion], va: u64) -> Option<u64> {
    regions
        .iter()
        .find(|r| r.contains(va))
        .and_then(|r| r.offset_of(va))
}
