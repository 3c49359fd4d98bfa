//! Seed collection: candidate code addresses read from container metadata.
//!
//! Each container format has one [`SeedProvider`]. Providers never fail;
//! anything malformed, unmapped or oversized becomes a diagnostic in the
//! shared [`IssueSink`] and the affected table contributes nothing.

pub mod elf;
pub mod pe;

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::config::SeedConfig;
use crate::core::issues::IssueSink;
use crate::core::region::{translate, MappedRegion};
use crate::core::seed::SeedGroup;
use crate::formats::Container;
use crate::io::ByteSource;

pub use elf::ElfSeedProvider;
pub use pe::PeSeedProvider;

/// Label of the container entry-point group.
pub const ENTRY_POINT: &str = "entry point";
/// Label of the exported-function group.
pub const EXPORTED_FUNCTIONS: &str = "exported functions";

/// Ordered seed groups produced by one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSet {
    pub groups: Vec<SeedGroup>,
}

impl SeedSet {
    /// Append a group; `None` (nothing nonzero was found) is skipped.
    pub fn push(&mut self, group: Option<SeedGroup>) {
        if let Some(group) = group {
            debug!(source = %group.source, count = group.len(), "seed group");
            self.groups.push(group);
        }
    }

    /// Addresses across all groups, duplicates included.
    pub fn total(&self) -> usize {
        self.groups.iter().map(SeedGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(|g| g.source.as_str())
    }
}

/// Reads seeding tables for one container format.
pub trait SeedProvider {
    fn collect(&self, source: &mut dyn ByteSource, issues: &mut IssueSink) -> SeedSet;
}

/// The closed set of providers, selected by container format.
pub enum SeedProviderKind<'a> {
    Elf(ElfSeedProvider<'a>),
    Pe(PeSeedProvider<'a>),
}

impl<'a> SeedProviderKind<'a> {
    pub fn for_container(container: &'a Container, config: &'a SeedConfig) -> Self {
        match container {
            Container::Elf(img) => SeedProviderKind::Elf(ElfSeedProvider::new(img, config)),
            Container::Pe(img) => SeedProviderKind::Pe(PeSeedProvider::new(img, config)),
        }
    }
}

impl SeedProvider for SeedProviderKind<'_> {
    fn collect(&self, source: &mut dyn ByteSource, issues: &mut IssueSink) -> SeedSet {
        match self {
            SeedProviderKind::Elf(p) => p.collect(source, issues),
            SeedProviderKind::Pe(p) => p.collect(source, issues),
        }
    }
}

/// Bounded, diagnosed table reads by virtual address.
pub(crate) struct TableReader<'a> {
    pub source: &'a mut dyn ByteSource,
    pub issues: &'a mut IssueSink,
    pub regions: &'a [MappedRegion],
    pub config: &'a SeedConfig,
}

impl TableReader<'_> {
    /// Read a table of `size` bytes at `va`.
    ///
    /// Unmapped addresses are rejected. A table that runs past the end of the
    /// file is clipped with a warning, and one over `max_table_bytes` is
    /// clipped to that limit with an info diagnostic.
    pub fn read_table(&mut self, what: &str, va: u64, size: u64) -> Option<Bytes> {
        let offset = self.file_offset(what, va)?;
        let available = self.source.available_from(offset);
        let mut len = size;
        if len > available {
            self.issues.warn(format!(
                "{what} declares {size} bytes but only {available} are available"
            ));
            len = available;
        }
        let max = self.config.max_table_bytes;
        if len > max {
            self.issues.info(format!(
                "{what}: clipped from {len} to the {max} byte table limit"
            ));
            len = max;
        }
        self.read_raw(what, offset, len)
    }

    /// Read up to `size` bytes at `va`, silently clipped to the file.
    ///
    /// For tables whose extent is found by scanning (terminators, hash chains).
    pub fn read_prefix(&mut self, what: &str, va: u64, size: u64) -> Option<Bytes> {
        let offset = self.file_offset(what, va)?;
        let len = size
            .min(self.config.max_table_bytes)
            .min(self.source.available_from(offset));
        self.read_raw(what, offset, len)
    }

    pub fn file_offset(&mut self, what: &str, va: u64) -> Option<u64> {
        let offset = translate(self.regions, va);
        if offset.is_none() {
            self.issues
                .info(format!("{what}: address {va:#x} is not backed by file data"));
        }
        offset
    }

    fn read_raw(&mut self, what: &str, offset: u64, len: u64) -> Option<Bytes> {
        match self.source.read_at(offset, len) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.issues.warn(format!("{what}: {e}"));
                None
            }
        }
    }
}
