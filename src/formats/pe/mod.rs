//! PE (Portable Executable) metadata
//!
//! Parses the headers, the section table and the data directory list. The
//! directories themselves are read lazily by the seed collector.

pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use crate::core::binary::Endianness;
use crate::core::disassembler::Architecture;
use crate::core::region::MappedRegion;
use crate::io::ByteSource;
use headers::{optional_header_size, parse_dos_header, parse_nt_headers, NT_FIXED_SIZE};
use sections::{mapped_regions, parse_section_headers, SECTION_HEADER_SIZE};
use tracing::debug;
pub use types::*;

/// Parsed PE headers, section table and the regions they map.
#[derive(Debug, Clone)]
pub struct PeImage {
    headers: PeHeaders,
    sections: Vec<SectionHeader>,
    regions: Vec<MappedRegion>,
}

impl PeImage {
    /// Read headers and the section table through `source`.
    pub fn read(source: &mut dyn ByteSource) -> crate::error::Result<Self> {
        let dos = source.read_at(0, 64)?;
        let e_lfanew = parse_dos_header(&dos)? as u64;

        let fixed = source.read_at(e_lfanew, NT_FIXED_SIZE as u64)?;
        let opt_len = optional_header_size(&fixed)? as u64;
        let nt = source.read_at(e_lfanew, NT_FIXED_SIZE as u64 + opt_len)?;
        let headers = parse_nt_headers(&nt, e_lfanew as usize)?;

        let table_len = headers.number_of_sections as u64 * SECTION_HEADER_SIZE as u64;
        let table = source.read_at(headers.section_table_offset as u64, table_len)?;
        let sections = parse_section_headers(&table, headers.number_of_sections)?;
        let regions = mapped_regions(&sections, headers.image_base);

        debug!(
            machine = ?headers.machine,
            pe32_plus = headers.is_pe32_plus,
            sections = sections.len(),
            regions = regions.len(),
            "Parsed PE metadata"
        );

        Ok(Self {
            headers,
            sections,
            regions,
        })
    }

    pub fn headers(&self) -> &PeHeaders {
        &self.headers
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn regions(&self) -> &[MappedRegion] {
        &self.regions
    }

    pub fn architecture(&self) -> Architecture {
        match self.headers.machine {
            Machine::I386 => Architecture::X86,
            Machine::X86_64 => Architecture::X86_64,
            Machine::Arm | Machine::ArmNT => Architecture::ARM,
            Machine::Arm64 => Architecture::ARM64,
            Machine::Unknown | Machine::Other(_) => Architecture::Unknown,
        }
    }

    pub fn endianness(&self) -> Endianness {
        Endianness::Little
    }
}
