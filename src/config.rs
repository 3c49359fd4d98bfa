//! Configuration for an analysis run.
//!
//! Every limit that bounds reading, seeding or scanning lives here with a
//! default. Configurations round-trip through JSON and missing fields fall
//! back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProbeError, Result};
use crate::io::IOLimits;

/// Master configuration for the analysis pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Limits for the bounded reader.
    pub io: IoConfig,
    /// Table-size ceilings for seed collection.
    pub seeds: SeedConfig,
    /// Guided scanner limits.
    pub scan: ScanLimits,
    /// Code extraction and deadline settings.
    pub pipeline: PipelineConfig,
}

impl ProbeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.io.max_read_bytes == 0 {
            return Err(ProbeError::InvalidConfig(
                "io.max_read_bytes must be nonzero".to_string(),
            ));
        }
        if self.scan.yield_every == 0 {
            return Err(ProbeError::InvalidConfig(
                "scan.yield_every must be nonzero".to_string(),
            ));
        }
        if self.scan.max_instructions == Some(0) {
            return Err(ProbeError::InvalidConfig(
                "scan.max_instructions must be nonzero when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// I/O configuration for the bounded reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Largest input accepted (bytes).
    pub max_file_size: u64,
    /// Total bytes that may be read across the whole run.
    pub max_read_bytes: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        let limits = IOLimits::default();
        Self {
            max_file_size: limits.max_file_size,
            max_read_bytes: limits.max_read_bytes,
        }
    }
}

impl IoConfig {
    pub fn limits(&self) -> IOLimits {
        IOLimits {
            max_file_size: self.max_file_size,
            max_read_bytes: self.max_read_bytes,
        }
    }
}

/// Ceilings applied to container tables during seed collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Largest single table read (pointer arrays, symbol tables, dynamic table).
    pub max_table_bytes: u64,
    /// Largest symbol count accepted from a hash table.
    pub max_symbols: u64,
    /// TLS callback entries read before giving up on a terminator.
    pub max_tls_callbacks: u64,
    /// Exception-directory entries read.
    pub max_runtime_functions: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            max_table_bytes: 16 * 1024 * 1024,
            max_symbols: 1_000_000,
            max_tls_callbacks: 1024,
            max_runtime_functions: 200_000,
        }
    }
}

/// Limits for one guided scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanLimits {
    /// Issues kept verbatim; later ones are only counted.
    pub max_issues: usize,
    /// Instructions decoded between cooperative yields.
    pub yield_every: u64,
    /// Stop after this many instructions.
    pub max_instructions: Option<u64>,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_issues: 32,
            yield_every: 4096,
            max_instructions: None,
        }
    }
}

/// Code extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Total bytes of code buffers handed to the scanner.
    pub max_code_bytes: u64,
    /// Cancel the scan after this many milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_code_bytes: 64 * 1024 * 1024,
            timeout_ms: None,
        }
    }
}
