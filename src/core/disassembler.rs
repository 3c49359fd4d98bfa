//! Decoder capability traits and error types.
//!
//! The guided scanner never names a concrete disassembler. It asks a
//! [`DecoderFactory`] for one [`InstructionDecoder`] per code section and
//! resolves feature names through the [`FeatureCatalog`] side of the same
//! factory. Malformed bytes are reported through the decoded instruction
//! (invalid or zero length), never as an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::instruction::{DecodedInstruction, FeatureId};
use crate::core::section::CodeSection;

/// Errors raised while creating, repositioning or releasing decoders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No backend handles this architecture
    UnsupportedArchitecture(Architecture),
    /// Backend refused to initialise
    BackendInit(String),
    /// Requested position lies outside the decoder's buffer
    InvalidPosition { offset: usize, len: usize },
    /// Backend failed to tear down cleanly
    Release(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedArchitecture(arch) => {
                write!(f, "UnsupportedArchitecture: {}", arch)
            }
            DecodeError::BackendInit(msg) => write!(f, "BackendInit: {}", msg),
            DecodeError::InvalidPosition { offset, len } => {
                write!(f, "InvalidPosition: offset {:#x} in {} bytes", offset, len)
            }
            DecodeError::Release(msg) => write!(f, "Release: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoder operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Architectures the container parsers can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// x86 (32-bit)
    X86,
    /// x86-64 (64-bit)
    X86_64,
    /// ARM (32-bit)
    ARM,
    /// ARM64/AArch64 (64-bit)
    ARM64,
    /// Anything else
    Unknown,
}

impl Architecture {
    /// Address size in bits
    pub fn address_bits(&self) -> u8 {
        match self {
            Architecture::X86 | Architecture::ARM => 32,
            Architecture::X86_64 | Architecture::ARM64 | Architecture::Unknown => 64,
        }
    }

    pub fn is_64_bit(&self) -> bool {
        self.address_bits() == 64
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::ARM => write!(f, "arm"),
            Architecture::ARM64 => write!(f, "arm64"),
            Architecture::Unknown => write!(f, "unknown"),
        }
    }
}

/// Stateful, positionable decoder over one code section.
pub trait InstructionDecoder {
    /// Move to byte `offset` of the section, treating it as address `ip`.
    fn reposition(&mut self, offset: usize, ip: u64) -> DecodeResult<()>;

    /// True while bytes remain before the end of the section.
    fn can_decode(&self) -> bool;

    /// Decode the instruction at the current position and advance past it.
    fn decode(&mut self) -> DecodedInstruction;

    /// Release backend resources. Called once when the scan ends.
    fn release(&mut self) -> DecodeResult<()> {
        Ok(())
    }
}

/// Maps opaque feature ids back to backend names.
pub trait FeatureCatalog {
    fn feature_label(&self, id: FeatureId) -> Option<String>;
}

/// Creates decoders for code sections of one architecture.
pub trait DecoderFactory: FeatureCatalog {
    fn architecture(&self) -> Architecture;

    fn create<'a>(
        &self,
        section: &'a CodeSection,
    ) -> DecodeResult<Box<dyn InstructionDecoder + 'a>>;

    /// Human-readable backend name
    fn name(&self) -> &str {
        "decoder"
    }
}
