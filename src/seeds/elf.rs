//! ELF seeds: entry point, init/fini pointers and arrays, exported functions.

use tracing::debug;

use crate::config::SeedConfig;
use crate::core::issues::IssueSink;
use crate::core::seed::SeedGroup;
use crate::formats::elf::dynamic::{tag_name, DynamicTable};
use crate::formats::elf::utils::{read_addr, EndianRead};
use crate::formats::elf::{
    ElfClass, ElfData, ElfImage, DT_FINI, DT_FINI_ARRAY, DT_FINI_ARRAYSZ, DT_GNU_HASH, DT_HASH,
    DT_INIT, DT_INIT_ARRAY, DT_INIT_ARRAYSZ, DT_PREINIT_ARRAY, DT_PREINIT_ARRAYSZ, DT_SYMENT,
    DT_SYMTAB, SHN_UNDEF, STT_FUNC,
};
use crate::io::ByteSource;

use super::{SeedProvider, SeedSet, TableReader, ENTRY_POINT, EXPORTED_FUNCTIONS};

/// (array tag, size tag) pairs in emission order.
const ARRAY_TAGS: [(i64, i64); 3] = [
    (DT_PREINIT_ARRAY, DT_PREINIT_ARRAYSZ),
    (DT_INIT_ARRAY, DT_INIT_ARRAYSZ),
    (DT_FINI_ARRAY, DT_FINI_ARRAYSZ),
];

/// Size of the GNU hash header (nbuckets, symoffset, bloom_size, bloom_shift).
const GNU_HASH_HEADER: u64 = 16;

pub struct ElfSeedProvider<'a> {
    image: &'a ElfImage,
    config: &'a SeedConfig,
}

impl<'a> ElfSeedProvider<'a> {
    pub fn new(image: &'a ElfImage, config: &'a SeedConfig) -> Self {
        Self { image, config }
    }

    fn class(&self) -> ElfClass {
        self.image.class()
    }

    fn endian(&self) -> ElfData {
        self.image.data()
    }

    fn read_dynamic(&self, reader: &mut TableReader<'_>) -> Option<DynamicTable> {
        let ph = self.image.segments().dynamic()?;
        let max = self.config.max_table_bytes;
        let len = if ph.p_filesz > max {
            reader.issues.info(format!(
                "PT_DYNAMIC: clipped from {} to the {max} byte table limit",
                ph.p_filesz
            ));
            max
        } else {
            ph.p_filesz
        };
        let data = match reader.source.read_at(ph.p_offset, len) {
            Ok(data) => data,
            Err(e) => {
                reader.issues.warn(format!("PT_DYNAMIC: {e}"));
                return None;
            }
        };
        match DynamicTable::parse(&data, self.class(), self.endian()) {
            Ok(table) => Some(table),
            Err(e) => {
                reader.issues.info(format!("PT_DYNAMIC: {e}"));
                None
            }
        }
    }

    fn collect_dynamic(&self, reader: &mut TableReader<'_>, set: &mut SeedSet) {
        let Some(dynamic) = self.read_dynamic(reader) else {
            debug!("no dynamic table");
            return;
        };

        for tag in [DT_INIT, DT_FINI] {
            if let Some(va) = dynamic.nonzero(tag) {
                set.push(SeedGroup::new(tag_name(tag), [va]));
            }
        }

        for (array_tag, size_tag) in ARRAY_TAGS {
            if let (Some(va), Some(size)) = (dynamic.nonzero(array_tag), dynamic.nonzero(size_tag)) {
                set.push(self.pointer_array(reader, tag_name(array_tag), va, size));
            }
        }

        set.push(self.exported_functions(reader, &dynamic));
    }

    fn pointer_array(
        &self,
        reader: &mut TableReader<'_>,
        label: &str,
        va: u64,
        size: u64,
    ) -> Option<SeedGroup> {
        let data = reader.read_table(label, va, size)?;
        let width = self.class().pointer_size();
        let pointers = (0..data.len() / width)
            .filter_map(|i| read_addr(&data, i * width, self.class(), self.endian()).ok());
        SeedGroup::new(label, pointers)
    }

    /// Number of dynamic symbols, from `DT_HASH` or else `DT_GNU_HASH`.
    fn symbol_count(&self, reader: &mut TableReader<'_>, dynamic: &DynamicTable) -> Option<u64> {
        if let Some(hash) = dynamic.nonzero(DT_HASH) {
            let header = reader.read_table("DT_HASH", hash, 8)?;
            return match header.read_u32(4, self.endian()) {
                Ok(nchain) => Some(nchain as u64),
                Err(e) => {
                    reader.issues.info(format!("DT_HASH: {e}"));
                    None
                }
            };
        }
        let gnu_hash = dynamic.nonzero(DT_GNU_HASH)?;
        self.gnu_hash_symbol_count(reader, gnu_hash)
    }

    /// Walk the GNU hash table: the highest bucket start, then its chain up to
    /// the terminator bit, gives one past the last hashed symbol.
    fn gnu_hash_symbol_count(&self, reader: &mut TableReader<'_>, va: u64) -> Option<u64> {
        let endian = self.endian();
        let header = reader.read_table("DT_GNU_HASH", va, GNU_HASH_HEADER)?;
        let (Ok(nbuckets), Ok(symoffset), Ok(bloom_size)) = (
            header.read_u32(0, endian),
            header.read_u32(4, endian),
            header.read_u32(8, endian),
        ) else {
            reader.issues.info("DT_GNU_HASH: truncated header");
            return None;
        };

        let bloom_bytes = bloom_size as u64 * self.class().pointer_size() as u64;
        let buckets_va = va
            .checked_add(GNU_HASH_HEADER)
            .and_then(|v| v.checked_add(bloom_bytes));
        let Some(buckets_va) = buckets_va else {
            reader.issues.info("DT_GNU_HASH: bucket array address overflows");
            return None;
        };
        let buckets = reader.read_table("DT_GNU_HASH buckets", buckets_va, nbuckets as u64 * 4)?;
        let max_bucket = (0..buckets.len() / 4)
            .filter_map(|i| buckets.read_u32(i * 4, endian).ok())
            .max()
            .unwrap_or(0);
        if max_bucket < symoffset {
            // Every bucket is empty; only the unhashed prefix exists.
            return Some(symoffset as u64);
        }

        let chain_index = (max_bucket - symoffset) as u64;
        let chain_va = buckets_va
            .checked_add(nbuckets as u64 * 4)
            .and_then(|v| v.checked_add(chain_index * 4));
        let Some(chain_va) = chain_va else {
            reader.issues.info("DT_GNU_HASH: chain address overflows");
            return None;
        };
        let remaining = self.config.max_symbols.saturating_sub(max_bucket as u64);
        let chain = reader.read_prefix("DT_GNU_HASH chain", chain_va, remaining.saturating_mul(4))?;
        for i in 0..chain.len() / 4 {
            let Ok(value) = chain.read_u32(i * 4, endian) else {
                break;
            };
            if value & 1 != 0 {
                return Some(max_bucket as u64 + i as u64 + 1);
            }
        }
        reader
            .issues
            .info("DT_GNU_HASH: chain has no terminator within readable data");
        None
    }

    fn exported_functions(
        &self,
        reader: &mut TableReader<'_>,
        dynamic: &DynamicTable,
    ) -> Option<SeedGroup> {
        let symtab = dynamic.nonzero(DT_SYMTAB)?;
        let syment = dynamic.nonzero(DT_SYMENT)?;
        let count = self.symbol_count(reader, dynamic)?;

        if count > self.config.max_symbols {
            reader.issues.info(format!(
                "dynamic symbol count {count} exceeds the limit of {}",
                self.config.max_symbols
            ));
            return None;
        }
        let record = self.class().symbol_size() as u64;
        if syment < record {
            reader
                .issues
                .info(format!("DT_SYMENT {syment} is smaller than a symbol record"));
            return None;
        }
        let Some(total) = count.checked_mul(syment) else {
            reader
                .issues
                .info(format!("dynamic symbol table size overflows ({count} x {syment})"));
            return None;
        };

        let table = reader.read_table("dynamic symbol table", symtab, total)?;
        let (stride, record) = (syment as usize, record as usize);
        let values = (0..count as usize)
            .map(|i| i * stride)
            .take_while(|&off| off + record <= table.len())
            .filter_map(|off| self.exported_function(&table[off..off + record]));
        SeedGroup::new(EXPORTED_FUNCTIONS, values)
    }

    /// `st_value` of a defined `STT_FUNC` symbol.
    fn exported_function(&self, sym: &[u8]) -> Option<u64> {
        let endian = self.endian();
        let (info, shndx, value) = match self.class() {
            ElfClass::Elf32 => (
                *sym.get(12)?,
                sym.read_u16(14, endian).ok()?,
                sym.read_u32(4, endian).ok()? as u64,
            ),
            ElfClass::Elf64 => (
                *sym.get(4)?,
                sym.read_u16(6, endian).ok()?,
                sym.read_u64(8, endian).ok()?,
            ),
        };
        (info & 0xf == STT_FUNC && shndx != SHN_UNDEF && value != 0).then_some(value)
    }
}

impl SeedProvider for ElfSeedProvider<'_> {
    fn collect(&self, source: &mut dyn ByteSource, issues: &mut IssueSink) -> SeedSet {
        let mut set = SeedSet::default();
        if self.image.regions().is_empty() {
            issues.info("no loadable segments with file data; nothing to seed");
            return set;
        }

        set.push(SeedGroup::new(ENTRY_POINT, [self.image.header().e_entry]));
        let mut reader = TableReader {
            source,
            issues,
            regions: self.image.regions(),
            config: self.config,
        };
        self.collect_dynamic(&mut reader, &mut set);
        debug!(groups = set.groups.len(), seeds = set.total(), "ELF seeds collected");
        set
    }
}
