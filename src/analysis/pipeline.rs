//! File or buffer in, [`ProbeReport`] out.
//!
//! All reads (headers, seed tables, code bytes) happen before the scan
//! starts; the scan itself only touches the in-memory code sections.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, Instrument};

use crate::config::{PipelineConfig, ProbeConfig};
use crate::core::disassembler::DecoderFactory;
use crate::core::issues::IssueSink;
use crate::core::section::CodeSection;
use crate::disasm;
use crate::error::{ProbeError, Result};
use crate::formats::Container;
use crate::io::{ByteSource, SafeReader, SliceSource};
use crate::scan::{aggregate, CancelToken, GuidedScanner, ScanResult};
use crate::seeds::{SeedProvider, SeedProviderKind};

use super::report::ProbeReport;

/// Analyse an input already wrapped in a [`ByteSource`].
pub async fn analyze_source(
    source: &mut dyn ByteSource,
    config: &ProbeConfig,
    cancel: CancelToken,
) -> Result<ProbeReport> {
    config.validate()?;
    let container = Container::read(source)?;
    let architecture = container.architecture();
    info!(format = %container.format(), %architecture, size = source.size(), "analysing");

    let mut issues = IssueSink::new(config.scan.max_issues);
    let seeds = SeedProviderKind::for_container(&container, &config.seeds).collect(source, &mut issues);
    let sections = load_code_sections(source, &container, &config.pipeline, &mut issues);
    debug!(
        seed_groups = seeds.groups.len(),
        seeds = seeds.total(),
        sections = sections.len(),
        "inputs ready"
    );

    let cancel = match config.pipeline.timeout_ms {
        Some(ms) => cancel.with_deadline(Duration::from_millis(ms)),
        None => cancel,
    };

    let (backend, scan, capabilities) =
        match disasm::for_arch_with(architecture, container.endianness(), None) {
            Ok(backend) => {
                let scan = GuidedScanner::new(&backend)
                    .with_limits(config.scan.clone())
                    .with_cancel(cancel)
                    .run(&sections, &seeds.groups, &mut issues)
                    .await;
                let capabilities = aggregate(&scan, &backend);
                (Some(backend.name().to_string()), scan, capabilities)
            }
            Err(e) => {
                issues.info(format!("no decoder for {architecture}: {e}"));
                (None, ScanResult::empty(&issues), Vec::new())
            }
        };

    Ok(ProbeReport {
        format: container.format(),
        architecture,
        backend,
        regions: container.regions().to_vec(),
        seed_groups: seeds.groups,
        sections: sections.iter().map(CodeSection::summary).collect(),
        scan,
        capabilities,
    })
}

pub async fn analyze_bytes(
    data: impl Into<Bytes>,
    config: &ProbeConfig,
    cancel: CancelToken,
) -> Result<ProbeReport> {
    let mut source = SliceSource::new(data, config.io.limits())?;
    analyze_source(&mut source, config, cancel).await
}

pub async fn analyze_path<P: AsRef<Path>>(
    path: P,
    config: &ProbeConfig,
    cancel: CancelToken,
) -> Result<ProbeReport> {
    let path = path.as_ref();
    let mut source = SafeReader::open(path, config.io.limits())?;
    analyze_source(&mut source, config, cancel)
        .instrument(crate::span_trace!("analyze_path", path = %path.display()))
        .await
}

/// [`analyze_path`] on a fresh current-thread runtime.
pub fn analyze_path_blocking<P: AsRef<Path>>(path: P, config: &ProbeConfig) -> Result<ProbeReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| ProbeError::Runtime(e.to_string()))?;
    runtime.block_on(analyze_path(path, config, CancelToken::new()))
}

/// Read the container's executable ranges into code sections.
///
/// Ranges are clipped to the file and to `max_code_bytes` in total. A range
/// overlapping an earlier section is dropped so sections stay disjoint.
fn load_code_sections(
    source: &mut dyn ByteSource,
    container: &Container,
    config: &PipelineConfig,
    issues: &mut IssueSink,
) -> Vec<CodeSection> {
    let mut sections: Vec<CodeSection> = Vec::new();
    let mut remaining = config.max_code_bytes;

    for range in container.code_ranges() {
        let available = source.available_from(range.file_offset);
        let mut len = range.byte_len;
        if len > available {
            issues.warn(format!(
                "{} declares {} bytes but only {available} are available",
                range.name, range.byte_len
            ));
            len = available;
        }
        if len > remaining {
            issues.info(format!(
                "{}: clipped from {len} to {remaining} bytes by the code size limit",
                range.name
            ));
            len = remaining;
        }
        if len == 0 {
            continue;
        }

        let bytes = match source.read_at(range.file_offset, len) {
            Ok(bytes) => bytes,
            Err(e) => {
                issues.warn(format!("{}: {e}", range.name));
                continue;
            }
        };
        let section = CodeSection::new(range.name, range.start_va, bytes);
        if let Some(earlier) = sections.iter().find(|s| s.overlaps(&section)) {
            issues.info(format!(
                "{} at {:#x} overlaps {}; dropped",
                section.name, section.start_va, earlier.name
            ));
            continue;
        }
        remaining -= section.len();
        sections.push(section);
    }
    sections
}
