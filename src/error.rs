//! Error types for the isaprobe analysis pipeline.
//!
//! Hard errors only exist at the pipeline edge (opening files, recognising the
//! container, loading configuration). Everything that goes wrong while seeding
//! or scanning is reported as an [`Issue`](crate::core::issues::Issue) instead.

use thiserror::Error;

use crate::formats::elf::ElfError;
use crate::formats::pe::PeError;
use crate::io::error::IoError;

/// Main error type for isaprobe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The input is not a container this crate understands.
    #[error("Invalid binary format: {0}")]
    InvalidFormat(String),

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bounded reader refused or failed a read.
    #[error("Read error: {0}")]
    Read(#[from] IoError),

    #[error("ELF parse error: {0}")]
    Elf(#[from] ElfError),

    #[error("PE parse error: {0}")]
    Pe(#[from] PeError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Async runtime could not be created.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for isaprobe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Convert probe errors to PyO3 exceptions
#[cfg(feature = "python-ext")]
impl From<ProbeError> for pyo3::PyErr {
    fn from(err: ProbeError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyException, PyIOError, PyValueError};

        match err {
            ProbeError::Io(e) => PyIOError::new_err(e.to_string()),
            ProbeError::Read(e) => PyIOError::new_err(e.to_string()),
            ProbeError::InvalidFormat(msg) | ProbeError::InvalidConfig(msg) => {
                PyValueError::new_err(msg)
            }
            _ => PyException::new_err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProbeError::InvalidFormat("unknown magic".to_string());
        assert_eq!(err.to_string(), "Invalid binary format: unknown magic");

        let err = ProbeError::InvalidConfig("scan.yield_every must be nonzero".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: scan.yield_every must be nonzero"
        );
    }

    #[test]
    fn test_from_io_limits() {
        let err: ProbeError = IoError::FileTooLarge { limit: 10, found: 20 }.into();
        assert!(matches!(err, ProbeError::Read(_)));
        assert!(err.to_string().contains("20 bytes"));
    }

    #[test]
    fn test_from_elf_error() {
        let err: ProbeError = ElfError::InvalidMagic.into();
        assert_eq!(err.to_string(), "ELF parse error: Invalid ELF magic");
    }
}
