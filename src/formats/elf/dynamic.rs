//! Dynamic table parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_addr, EndianRead};
use std::collections::HashMap;

/// `(tag, value)` pairs from `PT_DYNAMIC`, up to the first `DT_NULL`.
#[derive(Debug, Clone, Default)]
pub struct DynamicTable {
    entries: Vec<(i64, u64)>,
    by_tag: HashMap<i64, u64>,
}

impl DynamicTable {
    /// Parse raw dynamic bytes. A trailing partial entry is ignored.
    pub fn parse(data: &[u8], class: ElfClass, endian: ElfData) -> Result<Self> {
        let entry_size = class.dynamic_entry_size();
        let mut entries = Vec::new();
        let mut by_tag = HashMap::new();

        for offset in (0..data.len() / entry_size).map(|i| i * entry_size) {
            let d_tag = match class {
                ElfClass::Elf32 => data.read_u32(offset, endian)? as i32 as i64,
                ElfClass::Elf64 => data.read_u64(offset, endian)? as i64,
            };
            if d_tag == DT_NULL {
                break;
            }
            let d_val = read_addr(data, offset + class.pointer_size(), class, endian)?;
            entries.push((d_tag, d_val));
            // Repeated tags: the first occurrence wins.
            by_tag.entry(d_tag).or_insert(d_val);
        }

        Ok(Self { entries, by_tag })
    }

    pub fn get(&self, tag: i64) -> Option<u64> {
        self.by_tag.get(&tag).copied()
    }

    /// Value of `tag` when present and nonzero.
    pub fn nonzero(&self, tag: i64) -> Option<u64> {
        self.get(tag).filter(|&v| v != 0)
    }

    pub fn entries(&self) -> &[(i64, u64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Display name of the dynamic tags used for seeding.
pub fn tag_name(tag: i64) -> &'static str {
    match tag {
        DT_INIT => "DT_INIT",
        DT_FINI => "DT_FINI",
        DT_INIT_ARRAY => "DT_INIT_ARRAY",
        DT_FINI_ARRAY => "DT_FINI_ARRAY",
        DT_PREINIT_ARRAY => "DT_PREINIT_ARRAY",
        DT_INIT_ARRAYSZ => "DT_INIT_ARRAYSZ",
        DT_FINI_ARRAYSZ => "DT_FINI_ARRAYSZ",
        DT_PREINIT_ARRAYSZ => "DT_PREINIT_ARRAYSZ",
        DT_HASH => "DT_HASH",
        DT_GNU_HASH => "DT_GNU_HASH",
        DT_SYMTAB => "DT_SYMTAB",
        DT_SYMENT => "DT_SYMENT",
        _ => "DT_?",
    }
}
