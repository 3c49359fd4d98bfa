//! Core PE data types and structures

use std::fmt;

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;
pub const IMAGE_DIRECTORY_ENTRY_EXCEPTION: usize = 3;
pub const IMAGE_DIRECTORY_ENTRY_TLS: usize = 9;

// Section characteristics
pub const IMAGE_SCN_CNT_CODE: u32 = 0x00000020;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x20000000;

/// Upper bound on section headers; the loader rejects more than 96.
pub const MAX_SECTIONS: u16 = 96;

/// PE parsing error types
#[derive(Debug, Clone)]
pub enum PeError {
    InvalidDosSignature,
    InvalidPeSignature,
    InvalidMagic(u16),
    TruncatedHeader { expected: usize, actual: usize },
    LimitExceeded(&'static str),
}

impl fmt::Display for PeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDosSignature => write!(f, "Invalid DOS signature"),
            Self::InvalidPeSignature => write!(f, "Invalid PE signature"),
            Self::InvalidMagic(m) => write!(f, "Invalid optional header magic: 0x{:04x}", m),
            Self::TruncatedHeader { expected, actual } => {
                write!(
                    f,
                    "Truncated header: expected {} bytes, got {}",
                    expected, actual
                )
            }
            Self::LimitExceeded(what) => write!(f, "Limit exceeded: {}", what),
        }
    }
}

impl std::error::Error for PeError {}

pub type Result<T> = std::result::Result<T, PeError>;

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Unknown,
    I386,   // 0x014c
    X86_64, // 0x8664
    Arm,    // 0x01c0
    ArmNT,  // 0x01c4
    Arm64,  // 0xaa64
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Self::I386,
            0x8664 => Self::X86_64,
            0x01c0 => Self::Arm,
            0x01c4 => Self::ArmNT,
            0xaa64 => Self::Arm64,
            0 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

impl Machine {
    /// Size of one exception-directory `RUNTIME_FUNCTION` record, when the
    /// machine uses table-based unwinding.
    pub fn runtime_function_size(&self) -> Option<usize> {
        match self {
            Machine::X86_64 => Some(12),
            Machine::Arm64 => Some(8),
            _ => None,
        }
    }
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address && rva - self.virtual_address < self.size
    }
}

/// Section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    pub fn name(&self) -> String {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..len]).to_string()
    }

    pub fn is_executable(&self) -> bool {
        (self.characteristics & (IMAGE_SCN_MEM_EXECUTE | IMAGE_SCN_CNT_CODE)) != 0
    }

    /// Number of file bytes that actually land in memory.
    pub fn mapped_len(&self) -> u32 {
        if self.virtual_size != 0 {
            self.size_of_raw_data.min(self.virtual_size)
        } else {
            self.size_of_raw_data
        }
    }
}

/// The NT header fields needed for seeding
#[derive(Debug, Clone)]
pub struct PeHeaders {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub size_of_optional_header: u16,
    pub is_pe32_plus: bool,
    pub address_of_entry_point: u32,
    pub image_base: u64,
    pub data_directories: Vec<DataDirectory>,
    /// File offset of the first section header.
    pub section_table_offset: usize,
}

impl PeHeaders {
    pub fn data_directory(&self, index: usize) -> Option<DataDirectory> {
        self.data_directories
            .get(index)
            .copied()
            .filter(|d| d.is_present())
    }

    pub fn pointer_size(&self) -> usize {
        if self.is_pe32_plus {
            8
        } else {
            4
        }
    }

    /// Absolute virtual address of an RVA, or `None` when it would pass `u64::MAX`.
    pub fn va(&self, rva: u32) -> Option<u64> {
        self.image_base.checked_add(rva as u64)
    }
}
