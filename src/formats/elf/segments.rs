//! Program header table parsing

use crate::core::region::MappedRegion;
use crate::formats::elf::types::*;
use crate::formats::elf::utils::EndianRead;

/// Parsed program headers, in file order.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    headers: Vec<ProgramHeader>,
}

impl SegmentTable {
    /// Parse `count` entries of `entsize` bytes each from the raw table bytes.
    pub fn parse(table: &[u8], header: &ElfHeader) -> Result<Self> {
        let count = header.e_phnum as usize;
        let entsize = header.e_phentsize as usize;
        if count == 0 {
            return Ok(Self::default());
        }

        let needed = count * entsize;
        if table.len() < needed {
            return Err(ElfError::Truncated {
                offset: header.e_phoff as usize,
                needed,
            });
        }

        let headers = (0..count)
            .map(|i| {
                parse_program_header(
                    table,
                    i * entsize,
                    header.ident.class,
                    header.ident.data,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { headers })
    }

    pub fn headers(&self) -> &[ProgramHeader] {
        &self.headers
    }

    /// First `PT_DYNAMIC` segment, if any.
    pub fn dynamic(&self) -> Option<&ProgramHeader> {
        self.headers.iter().find(|ph| ph.p_type == PT_DYNAMIC)
    }

    pub fn load_segments(&self) -> impl Iterator<Item = &ProgramHeader> + '_ {
        self.headers.iter().filter(|ph| ph.is_load())
    }

    /// File-backed part of each `PT_LOAD` segment, in header order.
    ///
    /// The zero-fill tail (`p_memsz` beyond `p_filesz`) has no file bytes and
    /// is left unmapped.
    pub fn mapped_regions(&self) -> Vec<MappedRegion> {
        self.load_segments()
            .filter(|ph| ph.p_filesz > 0)
            .map(|ph| MappedRegion::new(ph.p_vaddr, ph.p_offset, ph.p_filesz))
            .collect()
    }
}

/// Parse a single program header
fn parse_program_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
) -> Result<ProgramHeader> {
    match class {
        ElfClass::Elf32 => Ok(ProgramHeader {
            p_type: data.read_u32(offset, endian)?,
            p_offset: data.read_u32(offset + 4, endian)? as u64,
            p_vaddr: data.read_u32(offset + 8, endian)? as u64,
            p_filesz: data.read_u32(offset + 16, endian)? as u64,
            p_memsz: data.read_u32(offset + 20, endian)? as u64,
            p_flags: data.read_u32(offset + 24, endian)?,
        }),
        ElfClass::Elf64 => Ok(ProgramHeader {
            p_type: data.read_u32(offset, endian)?,
            p_flags: data.read_u32(offset + 4, endian)?,
            p_offset: data.read_u64(offset + 8, endian)?,
            p_vaddr: data.read_u64(offset + 16, endian)?,
            p_filesz: data.read_u64(offset + 32, endian)?,
            p_memsz: data.read_u64(offset + 40, endian)?,
        }),
    }
}
