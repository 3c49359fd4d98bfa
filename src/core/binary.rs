//! Container-level descriptors shared by parsers, seeding and reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Executable container formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    ELF,
    PE,
}

impl Format {
    /// Identify the container from its leading bytes.
    pub fn sniff(prefix: &[u8]) -> Option<Self> {
        if prefix.starts_with(b"\x7fELF") {
            Some(Format::ELF)
        } else if prefix.starts_with(b"MZ") {
            Some(Format::PE)
        } else {
            None
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::ELF => write!(f, "ELF"),
            Format::PE => write!(f, "PE"),
        }
    }
}

/// Byte order of multi-byte values in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "Little"),
            Endianness::Big => write!(f, "Big"),
        }
    }
}
