//! Bounded byte access for container parsing and seed collection.
//!
//! All reads made while parsing headers, collecting seeds and building code
//! buffers go through a [`ByteSource`]. Two implementations are provided: a
//! memory-mapped [`SafeReader`] for files on disk and a [`SliceSource`] for
//! buffers already in memory. Both enforce the same [`IOLimits`].

pub mod error;

use crate::io::error::{IoError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Defines the resource limits for I/O operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IOLimits {
    /// The absolute maximum file size that can be opened.
    pub max_file_size: u64,
    /// The maximum total number of bytes that can be read across all operations.
    pub max_read_bytes: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024,  // 512MB
            max_read_bytes: 256 * 1024 * 1024, // 256MB
        }
    }
}

/// Random-access, budgeted view of an input's bytes.
///
/// Reads past the end are clipped rather than rejected: a read that starts at
/// or beyond the end yields an empty buffer, one that straddles it yields the
/// available prefix. Only the bytes actually returned count against the
/// read budget.
pub trait ByteSource {
    /// Total size of the underlying input in bytes.
    fn size(&self) -> u64;

    /// Read up to `len` bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes>;

    /// Bytes available from `offset` to the end of the input.
    fn available_from(&self, offset: u64) -> u64 {
        self.size().saturating_sub(offset)
    }
}

/// Shared budget and clipping logic used by both sources.
#[derive(Debug, Clone)]
struct ReadBudget {
    limits: IOLimits,
    bytes_read: u64,
}

impl ReadBudget {
    fn new(limits: IOLimits) -> Self {
        Self {
            limits,
            bytes_read: 0,
        }
    }

    /// Returns the clipped `[start, end)` window for a read, or an error when
    /// the clipped length would exceed the budget.
    fn window(&self, size: u64, offset: u64, len: u64) -> Result<Option<(usize, usize)>> {
        if offset >= size || len == 0 {
            return Ok(None);
        }
        let end = offset.saturating_add(len).min(size);
        if self.bytes_read.saturating_add(end - offset) > self.limits.max_read_bytes {
            return Err(IoError::ReadLimitExceeded {
                limit: self.limits.max_read_bytes,
                current: self.bytes_read,
            });
        }
        let start = usize::try_from(offset).map_err(|_| IoError::Unrepresentable { offset, len })?;
        let end = usize::try_from(end).map_err(|_| IoError::Unrepresentable { offset, len })?;
        Ok(Some((start, end)))
    }

    fn charge(&mut self, actual: usize) {
        self.bytes_read += actual as u64;
    }
}

/// A safe, bounded file reader that uses memory-mapping for efficient access.
pub struct SafeReader {
    path: PathBuf,
    // None when the file size is zero; memmap cannot map empty files.
    mmap: Option<Mmap>,
    budget: ReadBudget,
    file_size: u64,
}

impl SafeReader {
    /// Opens a file, memory-maps it, and wraps it in a `SafeReader`.
    ///
    /// This function will fail if the file size exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "Opening file for bounded reading"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "File is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let mmap = if file_size == 0 {
            None
        } else {
            // Safety: the map is read-only and backed by a regular file we just opened.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            budget: ReadBudget::new(limits),
            file_size,
        })
    }

    /// Returns the total number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.budget.bytes_read
    }

    /// Returns the `IOLimits` enforced by this reader.
    pub fn limits(&self) -> &IOLimits {
        &self.budget.limits
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for SafeReader {
    fn size(&self) -> u64 {
        self.file_size
    }

    fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        let window = match self.budget.window(self.file_size, offset, len) {
            Ok(w) => w,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    current_read = self.budget.bytes_read,
                    requested = len,
                    limit = self.budget.limits.max_read_bytes,
                    "Read limit exceeded"
                );
                return Err(e);
            }
        };
        let (Some((start, end)), Some(map)) = (window, self.mmap.as_ref()) else {
            return Ok(Bytes::new());
        };
        let end = end.min(map.len());
        if start >= end {
            return Ok(Bytes::new());
        }

        let out = Bytes::copy_from_slice(&map[start..end]);
        self.budget.charge(out.len());

        trace!(
            path = %self.path.display(),
            offset = start,
            len = out.len(),
            total_read = self.budget.bytes_read,
            "Performed read"
        );

        Ok(out)
    }
}

/// In-memory byte source with the same budget semantics as [`SafeReader`].
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Bytes,
    budget: ReadBudget,
}

impl SliceSource {
    pub fn new(data: impl Into<Bytes>, limits: IOLimits) -> Result<Self> {
        let data = data.into();
        let found = data.len() as u64;
        if found > limits.max_file_size {
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found,
            });
        }
        Ok(Self {
            data,
            budget: ReadBudget::new(limits),
        })
    }

    pub fn bytes_read(&self) -> u64 {
        self.budget.bytes_read
    }
}

impl ByteSource for SliceSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        let Some((start, end)) = self.budget.window(self.size(), offset, len)? else {
            return Ok(Bytes::new());
        };
        // Cheap: shares the backing allocation.
        let out = self.data.slice(start..end);
        self.budget.charge(out.len());
        Ok(out)
    }
}
