//! Serialisable result of one analysis run.

use serde::Serialize;

use crate::core::binary::Format;
use crate::core::disassembler::Architecture;
use crate::core::region::MappedRegion;
use crate::core::section::SectionSummary;
use crate::core::seed::SeedGroup;
use crate::error::Result;
use crate::scan::{CapabilityUsage, ScanResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub format: Format,
    pub architecture: Architecture,
    /// Decoder backend used, if the architecture had one.
    pub backend: Option<String>,
    pub regions: Vec<MappedRegion>,
    pub seed_groups: Vec<SeedGroup>,
    pub sections: Vec<SectionSummary>,
    pub scan: ScanResult,
    pub capabilities: Vec<CapabilityUsage>,
}

impl ProbeReport {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn capability(&self, name: &str) -> Option<&CapabilityUsage> {
        self.capabilities.iter().find(|c| c.capability == name)
    }

    pub fn seed_group(&self, source: &str) -> Option<&SeedGroup> {
        self.seed_groups.iter().find(|g| g.source == source)
    }
}
