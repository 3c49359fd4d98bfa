//! PE seeds: entry point, export address table, TLS callbacks and the
//! exception directory.

use tracing::debug;

use crate::config::SeedConfig;
use crate::core::issues::IssueSink;
use crate::core::seed::SeedGroup;
use crate::formats::pe::utils::{read_pointer_at, ReadExt};
use crate::formats::pe::{
    PeImage, IMAGE_DIRECTORY_ENTRY_EXCEPTION, IMAGE_DIRECTORY_ENTRY_EXPORT,
    IMAGE_DIRECTORY_ENTRY_TLS,
};
use crate::io::ByteSource;

use super::{SeedProvider, SeedSet, TableReader, ENTRY_POINT, EXPORTED_FUNCTIONS};

pub const TLS_CALLBACKS: &str = "TLS callbacks";
pub const RUNTIME_FUNCTIONS: &str = "runtime functions";

const EXPORT_DIRECTORY_SIZE: u64 = 40;
const EXPORT_NUMBER_OF_FUNCTIONS: usize = 0x14;
const EXPORT_ADDRESS_OF_FUNCTIONS: usize = 0x1C;

pub struct PeSeedProvider<'a> {
    image: &'a PeImage,
    config: &'a SeedConfig,
}

impl<'a> PeSeedProvider<'a> {
    pub fn new(image: &'a PeImage, config: &'a SeedConfig) -> Self {
        Self { image, config }
    }

    /// `image_base + rva`; an overflowing sum is diagnosed and dropped.
    fn va(&self, reader: &mut TableReader<'_>, what: &str, rva: u32) -> Option<u64> {
        let va = self.image.headers().va(rva);
        if va.is_none() {
            reader.issues.info(format!(
                "{what}: RVA {rva:#x} overflows image base {:#x}",
                self.image.headers().image_base
            ));
        }
        va
    }

    fn exported_functions(&self, reader: &mut TableReader<'_>) -> Option<SeedGroup> {
        let headers = self.image.headers();
        let dir = headers.data_directory(IMAGE_DIRECTORY_ENTRY_EXPORT)?;
        let dir_va = self.va(reader, "export directory", dir.virtual_address)?;
        let export = reader.read_table("export directory", dir_va, EXPORT_DIRECTORY_SIZE)?;
        let (Some(count), Some(functions_rva)) = (
            export.read_u32_le_at(EXPORT_NUMBER_OF_FUNCTIONS),
            export.read_u32_le_at(EXPORT_ADDRESS_OF_FUNCTIONS),
        ) else {
            reader.issues.info("export directory is truncated");
            return None;
        };
        if count as u64 > self.config.max_symbols {
            reader.issues.info(format!(
                "export count {count} exceeds the limit of {}",
                self.config.max_symbols
            ));
            return None;
        }

        let functions_va = self.va(reader, "export address table", functions_rva)?;
        let table = reader.read_table("export address table", functions_va, count as u64 * 4)?;
        let addresses: Vec<u64> = (0..table.len() / 4)
            .filter_map(|i| table.read_u32_le_at(i * 4))
            // Forwarders point at a string inside the export directory.
            .filter(|&rva| rva != 0 && !dir.contains_rva(rva))
            .filter_map(|rva| self.va(reader, "exported function", rva))
            .collect();
        SeedGroup::new(EXPORTED_FUNCTIONS, addresses)
    }

    fn tls_callbacks(&self, reader: &mut TableReader<'_>) -> Option<SeedGroup> {
        let headers = self.image.headers();
        let dir = headers.data_directory(IMAGE_DIRECTORY_ENTRY_TLS)?;
        let ptr = headers.pointer_size();
        // StartAddressOfRawData, EndAddressOfRawData, AddressOfIndex, AddressOfCallBacks
        let callbacks_field = 3 * ptr;
        let dir_va = self.va(reader, "TLS directory", dir.virtual_address)?;
        let tls = reader.read_table("TLS directory", dir_va, (callbacks_field + ptr) as u64)?;
        let Some(callbacks_va) = read_pointer_at(&tls, callbacks_field, ptr) else {
            reader.issues.info("TLS directory is truncated");
            return None;
        };
        if callbacks_va == 0 {
            return None;
        }

        let limit = self.config.max_tls_callbacks;
        // Room for `limit` callbacks plus the terminator.
        let span = limit.saturating_add(1).saturating_mul(ptr as u64);
        let array = reader.read_prefix("TLS callbacks", callbacks_va, span)?;
        let mut callbacks = Vec::new();
        let mut terminated = false;
        for i in 0..array.len() / ptr {
            match read_pointer_at(&array, i * ptr, ptr) {
                Some(0) | None => {
                    terminated = true;
                    break;
                }
                Some(va) if (callbacks.len() as u64) < limit => callbacks.push(va),
                Some(_) => break,
            }
        }
        if !terminated {
            reader.issues.info(format!(
                "TLS callback array at {callbacks_va:#x} has no terminator within {} entries",
                callbacks.len()
            ));
        }
        SeedGroup::new(TLS_CALLBACKS, callbacks)
    }

    fn runtime_functions(&self, reader: &mut TableReader<'_>) -> Option<SeedGroup> {
        let headers = self.image.headers();
        let dir = headers.data_directory(IMAGE_DIRECTORY_ENTRY_EXCEPTION)?;
        let Some(entry) = headers.machine.runtime_function_size() else {
            debug!(machine = ?headers.machine, "exception directory format not handled");
            return None;
        };

        let declared = dir.size as u64 / entry as u64;
        let count = if declared > self.config.max_runtime_functions {
            reader.issues.info(format!(
                "exception directory holds {declared} entries; reading the first {}",
                self.config.max_runtime_functions
            ));
            self.config.max_runtime_functions
        } else {
            declared
        };

        let dir_va = self.va(reader, "exception directory", dir.virtual_address)?;
        let table = reader.read_table(
            "exception directory",
            dir_va,
            count.saturating_mul(entry as u64),
        )?;
        let begins: Vec<u64> = (0..table.len() / entry)
            .filter_map(|i| table.read_u32_le_at(i * entry))
            .filter(|&rva| rva != 0)
            .filter_map(|rva| self.va(reader, "runtime function", rva))
            .collect();
        SeedGroup::new(RUNTIME_FUNCTIONS, begins)
    }
}

impl SeedProvider for PeSeedProvider<'_> {
    fn collect(&self, source: &mut dyn ByteSource, issues: &mut IssueSink) -> SeedSet {
        let mut set = SeedSet::default();
        if self.image.regions().is_empty() {
            issues.info("no sections with file data; nothing to seed");
            return set;
        }

        let mut reader = TableReader {
            source,
            issues,
            regions: self.image.regions(),
            config: self.config,
        };
        let entry = self.image.headers().address_of_entry_point;
        if entry != 0 {
            let va = self.va(&mut reader, ENTRY_POINT, entry);
            set.push(va.and_then(|va| SeedGroup::new(ENTRY_POINT, [va])));
        }
        set.push(self.exported_functions(&mut reader));
        set.push(self.tls_callbacks(&mut reader));
        set.push(self.runtime_functions(&mut reader));
        debug!(groups = set.groups.len(), seeds = set.total(), "PE seeds collected");
        set
    }
}
