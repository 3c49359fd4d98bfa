//! Section table parsing for PE files

use crate::core::region::MappedRegion;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

pub const SECTION_HEADER_SIZE: usize = 40;

/// Parse `count` section headers from the raw section table bytes.
pub fn parse_section_headers(table: &[u8], count: u16) -> Result<Vec<SectionHeader>> {
    let needed = count as usize * SECTION_HEADER_SIZE;
    if table.len() < needed {
        return Err(PeError::TruncatedHeader {
            expected: needed,
            actual: table.len(),
        });
    }

    Ok(table
        .chunks_exact(SECTION_HEADER_SIZE)
        .take(count as usize)
        .map(|raw| {
            let mut name = [0u8; 8];
            name.copy_from_slice(&raw[..8]);
            SectionHeader {
                name,
                virtual_size: raw.read_u32_le_at(8).unwrap_or(0),
                virtual_address: raw.read_u32_le_at(12).unwrap_or(0),
                size_of_raw_data: raw.read_u32_le_at(16).unwrap_or(0),
                pointer_to_raw_data: raw.read_u32_le_at(20).unwrap_or(0),
                characteristics: raw.read_u32_le_at(36).unwrap_or(0),
            }
        })
        .collect())
}

/// File-backed extent of each section, in table order.
pub fn mapped_regions(sections: &[SectionHeader], image_base: u64) -> Vec<MappedRegion> {
    sections
        .iter()
        .filter(|s| s.mapped_len() > 0)
        .filter_map(|s| {
            let start_va = image_base.checked_add(s.virtual_address as u64)?;
            Some(MappedRegion::new(
                start_va,
                s.pointer_to_raw_data as u64,
                s.mapped_len() as u64,
            ))
        })
        .collect()
}
