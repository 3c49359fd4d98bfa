//! End-to-end analysis: container parsing, seeding, code extraction,
//! guided scanning and capability roll-up.

pub mod pipeline;
pub mod report;

pub use pipeline::{analyze_bytes, analyze_path, analyze_path_blocking, analyze_source};
pub use report::ProbeReport;
