//! Code buffers handed to the disassembly engine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A contiguous buffer of code bytes loaded at `start_va`.
///
/// Sections are disjoint in virtual-address space; the engine never decodes
/// across the end of one section into the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSection {
    pub name: String,
    pub start_va: u64,
    pub bytes: Bytes,
}

impl CodeSection {
    pub fn new(name: impl Into<String>, start_va: u64, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            start_va,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Exclusive end address; saturates for buffers touching the top of the space.
    pub fn end_va(&self) -> u64 {
        self.start_va.saturating_add(self.len())
    }

    pub fn contains(&self, va: u64) -> bool {
        va >= self.start_va && va - self.start_va < self.len()
    }

    /// Byte offset of `va` within the buffer.
    pub fn offset_of(&self, va: u64) -> Option<usize> {
        if self.contains(va) {
            usize::try_from(va - self.start_va).ok()
        } else {
            None
        }
    }

    pub fn overlaps(&self, other: &CodeSection) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start_va < other.end_va()
            && other.start_va < self.end_va()
    }

    pub fn summary(&self) -> SectionSummary {
        SectionSummary {
            name: self.name.clone(),
            start_va: self.start_va,
            byte_len: self.len(),
        }
    }
}

/// Index of the first section containing `va`.
pub fn section_index(sections: &[CodeSection], va: u64) -> Option<usize> {
    sections.iter().position(|s| s.contains(va))
}

/// Serializable description of a code section (without its bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub name: String,
    pub start_va: u64,
    pub byte_len: u64,
}
