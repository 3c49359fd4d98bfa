//! Container metadata parsers.
//!
//! A [`Container`] is the minimum the pipeline needs from an executable:
//! its architecture, the mapped regions used for address translation and the
//! candidate code ranges that become [`CodeSection`](crate::core::section::CodeSection)s.

pub mod elf;
pub mod pe;

use crate::core::binary::{Endianness, Format};
use crate::core::disassembler::Architecture;
use crate::core::region::MappedRegion;
use crate::error::{ProbeError, Result};
use crate::io::ByteSource;

/// A file-backed range of executable bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRange {
    pub name: String,
    pub start_va: u64,
    pub file_offset: u64,
    pub byte_len: u64,
}

#[derive(Debug, Clone)]
pub enum Container {
    Elf(elf::ElfImage),
    Pe(pe::PeImage),
}

impl Container {
    /// Sniff the format and parse its metadata.
    pub fn read(source: &mut dyn ByteSource) -> Result<Self> {
        let magic = source.read_at(0, 4)?;
        match Format::sniff(&magic) {
            Some(Format::ELF) => Ok(Container::Elf(elf::ElfImage::read(source)?)),
            Some(Format::PE) => Ok(Container::Pe(pe::PeImage::read(source)?)),
            None => Err(ProbeError::InvalidFormat(
                "not an ELF or PE executable".to_string(),
            )),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Container::Elf(_) => Format::ELF,
            Container::Pe(_) => Format::PE,
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            Container::Elf(img) => img.architecture(),
            Container::Pe(img) => img.architecture(),
        }
    }

    pub fn endianness(&self) -> Endianness {
        match self {
            Container::Elf(img) => img.endianness(),
            Container::Pe(img) => img.endianness(),
        }
    }

    pub fn regions(&self) -> &[MappedRegion] {
        match self {
            Container::Elf(img) => img.regions(),
            Container::Pe(img) => img.regions(),
        }
    }

    /// Executable, file-backed ranges in header order.
    pub fn code_ranges(&self) -> Vec<CodeRange> {
        match self {
            Container::Elf(img) => img
                .segments()
                .headers()
                .iter()
                .enumerate()
                .filter(|(_, ph)| ph.is_load() && ph.is_executable() && ph.p_filesz > 0)
                .map(|(i, ph)| CodeRange {
                    name: format!("LOAD[{}]", i),
                    start_va: ph.p_vaddr,
                    file_offset: ph.p_offset,
                    byte_len: ph.p_filesz,
                })
                .collect(),
            Container::Pe(img) => {
                let base = img.headers().image_base;
                img.sections()
                    .iter()
                    .filter(|s| s.is_executable() && s.mapped_len() > 0)
                    .filter_map(|s| {
                        Some(CodeRange {
                            name: s.name(),
                            start_va: base.checked_add(s.virtual_address as u64)?,
                            file_offset: s.pointer_to_raw_data as u64,
                            byte_len: s.mapped_len() as u64,
                        })
                    })
                    .collect()
            }
        }
    }
}
