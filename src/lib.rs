//! Seed-guided disassembly of ELF and PE executables for CPU feature sampling.
//!
//! Seeds (entry points, init/fini tables, exports, TLS callbacks, unwind
//! records) are read from container metadata, then a guided linear sweep
//! decodes only code reachable from them and counts the instruction-set
//! extensions it meets.

pub mod analysis;
pub mod config;
pub mod core;
pub mod disasm;
pub mod error;
pub mod formats;
pub mod io;
pub mod logging;
pub mod scan;
pub mod seeds;

#[cfg(feature = "python-ext")]
pub mod python_bindings;

pub use analysis::{analyze_bytes, analyze_path, analyze_path_blocking, ProbeReport};
pub use config::ProbeConfig;
pub use error::{ProbeError, Result};

#[cfg(feature = "python-ext")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python-ext")]
#[pymodule]
fn isaprobe(m: &Bound<'_, PyModule>) -> PyResult<()> {
    python_bindings::register_probe_bindings(m)
}
