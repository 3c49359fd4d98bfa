//! DOS, COFF and optional header parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

/// Size of the PE signature plus COFF file header.
pub const NT_FIXED_SIZE: usize = 24;

/// Parse the DOS header and return `e_lfanew`.
pub fn parse_dos_header(data: &[u8]) -> Result<u32> {
    if data.len() < 64 {
        return Err(PeError::TruncatedHeader {
            expected: 64,
            actual: data.len(),
        });
    }
    if data.read_u16_le_at(0) != Some(DOS_SIGNATURE) {
        return Err(PeError::InvalidDosSignature);
    }
    data.read_u32_le_at(0x3C).ok_or(PeError::TruncatedHeader {
        expected: 64,
        actual: data.len(),
    })
}

/// Size of the optional header declared in the COFF header.
///
/// `nt` starts at the PE signature.
pub fn optional_header_size(nt: &[u8]) -> Result<u16> {
    if nt.len() < NT_FIXED_SIZE {
        return Err(PeError::TruncatedHeader {
            expected: NT_FIXED_SIZE,
            actual: nt.len(),
        });
    }
    if nt[0..4] != PE_SIGNATURE {
        return Err(PeError::InvalidPeSignature);
    }
    nt.read_u16_le_at(20).ok_or(PeError::TruncatedHeader {
        expected: NT_FIXED_SIZE,
        actual: nt.len(),
    })
}

/// Parse the NT headers. `nt` starts at the PE signature located at `e_lfanew`
/// and must include the whole optional header.
pub fn parse_nt_headers(nt: &[u8], e_lfanew: usize) -> Result<PeHeaders> {
    let size_of_optional_header = optional_header_size(nt)?;
    let opt_len = size_of_optional_header as usize;
    let opt = nt
        .read_slice_at(NT_FIXED_SIZE, opt_len)
        .ok_or(PeError::TruncatedHeader {
            expected: NT_FIXED_SIZE + opt_len,
            actual: nt.len(),
        })?;

    let machine = Machine::from(nt.read_u16_le_at(4).unwrap_or(0));
    let number_of_sections = nt.read_u16_le_at(6).unwrap_or(0);
    if number_of_sections > MAX_SECTIONS {
        return Err(PeError::LimitExceeded("number of sections"));
    }

    let truncated = || PeError::TruncatedHeader {
        expected: 24,
        actual: opt.len(),
    };
    let magic = opt.read_u16_le_at(0).ok_or_else(truncated)?;
    let (is_pe32_plus, image_base, rva_count_at, dirs_at) = match magic {
        PE32_MAGIC => (
            false,
            opt.read_u32_le_at(28).ok_or_else(truncated)? as u64,
            92,
            96,
        ),
        PE32PLUS_MAGIC => (true, opt.read_u64_le_at(24).ok_or_else(truncated)?, 108, 112),
        other => return Err(PeError::InvalidMagic(other)),
    };
    let address_of_entry_point = opt.read_u32_le_at(16).ok_or_else(truncated)?;

    // Only keep directories that are both declared and physically present.
    let declared = opt.read_u32_le_at(rva_count_at).unwrap_or(0).min(16) as usize;
    let data_directories = (0..declared)
        .map_while(|i| {
            let at = dirs_at + i * 8;
            Some(DataDirectory {
                virtual_address: opt.read_u32_le_at(at)?,
                size: opt.read_u32_le_at(at + 4)?,
            })
        })
        .collect();

    Ok(PeHeaders {
        machine,
        number_of_sections,
        size_of_optional_header,
        is_pe32_plus,
        address_of_entry_point,
        image_base,
        data_directories,
        section_table_offset: e_lfanew + NT_FIXED_SIZE + opt_len,
    })
}
