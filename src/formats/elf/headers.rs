//! ELF header parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::EndianRead;

/// Parse ELF identification bytes
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < 16 {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: 16,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    Ok(ElfIdent {
        class: ElfClass::from_u8(data[4])?,
        data: ElfData::from_u8(data[5])?,
        osabi: data[7],
    })
}

/// Parse ELF header
pub fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    let ident = parse_ident(data)?;
    let header_size = ident.class.header_size();

    if data.len() < header_size {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: header_size,
        });
    }

    let endian = ident.data;
    let e_type = data.read_u16(16, endian)?;
    let e_machine = data.read_u16(18, endian)?;

    let (e_entry, e_phoff, e_phentsize, e_phnum) = match ident.class {
        ElfClass::Elf32 => (
            data.read_u32(24, endian)? as u64,
            data.read_u32(28, endian)? as u64,
            data.read_u16(42, endian)?,
            data.read_u16(44, endian)?,
        ),
        ElfClass::Elf64 => (
            data.read_u64(24, endian)?,
            data.read_u64(32, endian)?,
            data.read_u16(54, endian)?,
            data.read_u16(56, endian)?,
        ),
    };

    let expected_phentsize = ident.class.program_header_size();
    if e_phnum > 0 && (e_phentsize as usize) < expected_phentsize {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_phentsize: expected at least {}, got {}",
            expected_phentsize, e_phentsize
        )));
    }

    Ok(ElfHeader {
        ident,
        e_type,
        e_machine,
        e_entry,
        e_phoff,
        e_phentsize,
        e_phnum,
    })
}
