//! ELF (Executable and Linkable Format) metadata
//!
//! Only what seeding and code extraction need is parsed: the file header, the
//! program header table and the dynamic table it points at.

pub mod dynamic;
pub mod headers;
pub mod segments;
pub mod types;
pub mod utils;

use crate::core::binary::Endianness;
use crate::core::disassembler::Architecture;
use crate::core::region::MappedRegion;
use crate::io::ByteSource;
use headers::parse_header;
use segments::SegmentTable;
use tracing::debug;
pub use types::*;

/// Parsed ELF header, program headers and the regions they map.
#[derive(Debug, Clone)]
pub struct ElfImage {
    header: ElfHeader,
    segments: SegmentTable,
    regions: Vec<MappedRegion>,
}

impl ElfImage {
    /// Read the header and program header table through `source`.
    pub fn read(source: &mut dyn ByteSource) -> crate::error::Result<Self> {
        let prefix = source.read_at(0, 64)?;
        let header = parse_header(&prefix)?;

        let table_len = header.e_phnum as u64 * header.e_phentsize as u64;
        let table = source.read_at(header.e_phoff, table_len)?;
        let segments = SegmentTable::parse(&table, &header)?;
        let regions = segments.mapped_regions();

        debug!(
            class = ?header.ident.class,
            machine = header.e_machine,
            segments = segments.headers().len(),
            regions = regions.len(),
            "Parsed ELF metadata"
        );

        Ok(Self {
            header,
            segments,
            regions,
        })
    }

    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn regions(&self) -> &[MappedRegion] {
        &self.regions
    }

    pub fn class(&self) -> ElfClass {
        self.header.ident.class
    }

    pub fn data(&self) -> ElfData {
        self.header.ident.data
    }

    pub fn architecture(&self) -> Architecture {
        match self.header.e_machine {
            EM_386 => Architecture::X86,
            EM_X86_64 => Architecture::X86_64,
            EM_ARM => Architecture::ARM,
            EM_AARCH64 => Architecture::ARM64,
            _ => Architecture::Unknown,
        }
    }

    pub fn endianness(&self) -> Endianness {
        if self.data().is_little_endian() {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }
}
