//! Guided linear-sweep disassembly.
//!
//! Decoding starts only at seed addresses and at near-branch targets found
//! along the way. Each work item runs a linear block that ends at an
//! unconditional transfer, a decode anomaly, an already-decoded address or
//! the end of its code section. Every address is decoded at most once.
//!
//! ```no_run
//! # use isaprobe::core::disassembler::Architecture;
//! # use isaprobe::core::binary::Endianness;
//! # use isaprobe::core::issues::IssueSink;
//! # use isaprobe::scan::{CancelToken, GuidedScanner};
//! # async fn demo(sections: Vec<isaprobe::core::section::CodeSection>, seeds: Vec<isaprobe::core::seed::SeedGroup>) {
//! let backend = isaprobe::disasm::for_arch(Architecture::X86_64, Endianness::Little).unwrap();
//! let mut issues = IssueSink::default();
//! let result = GuidedScanner::new(&backend)
//!     .with_cancel(CancelToken::new())
//!     .run(&sections, &seeds, &mut issues)
//!     .await;
//! println!("{} instructions", result.instruction_count);
//! # }
//! ```

pub mod cancel;
pub mod features;
pub mod worklist;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::config::ScanLimits;
use crate::core::disassembler::DecoderFactory;
use crate::core::instruction::{FeatureId, FlowKind};
use crate::core::issues::{Issue, IssueSink};
use crate::core::section::{section_index, CodeSection};
use crate::core::seed::{flatten_unique, SeedGroup};

pub use cancel::CancelToken;
pub use features::{aggregate, capability_for, CapabilityUsage, FeatureUsage};
use worklist::Traversal;

/// Cumulative counters handed to the progress callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub instructions: u64,
    pub bytes_decoded: u64,
    pub invalid_instructions: u64,
    /// Work items still on the stack.
    pub pending: usize,
}

/// Why a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The work stack drained.
    Completed,
    /// The cancel token fired; counters are partial.
    Cancelled,
    /// `max_instructions` was reached.
    BudgetExhausted,
}

/// Final counters and diagnostics of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub bytes_decoded: u64,
    pub instruction_count: u64,
    pub invalid_instruction_count: u64,
    pub feature_counts: BTreeMap<FeatureId, u64>,
    pub issues: Vec<Issue>,
    pub termination: Termination,
}

impl ScanResult {
    /// A result with no decoding, carrying the issues reported so far.
    pub fn empty(issues: &IssueSink) -> Self {
        Self {
            bytes_decoded: 0,
            instruction_count: 0,
            invalid_instruction_count: 0,
            feature_counts: BTreeMap::new(),
            issues: issues.snapshot(),
            termination: Termination::Completed,
        }
    }

    pub fn feature_count(&self, id: FeatureId) -> u64 {
        self.feature_counts.get(&id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    bytes_decoded: u64,
    instructions: u64,
    invalid: u64,
    features: BTreeMap<FeatureId, u64>,
}

type ProgressFn<'a> = Box<dyn FnMut(&ScanProgress) + 'a>;

/// Configures and runs one guided scan.
pub struct GuidedScanner<'a> {
    factory: &'a dyn DecoderFactory,
    limits: ScanLimits,
    cancel: CancelToken,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> GuidedScanner<'a> {
    pub fn new(factory: &'a dyn DecoderFactory) -> Self {
        Self {
            factory,
            limits: ScanLimits::default(),
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called with cumulative counters every `yield_every` instructions.
    pub fn with_progress(mut self, progress: impl FnMut(&ScanProgress) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Scan `sections` starting from `seeds`.
    ///
    /// Sections must not overlap. Diagnostics go to `issues`, whose snapshot
    /// (including anything reported before the scan) ends up in the result.
    pub async fn run(
        &mut self,
        sections: &[CodeSection],
        seeds: &[SeedGroup],
        issues: &mut IssueSink,
    ) -> ScanResult {
        let span = info_span!(
            "guided_scan",
            backend = self.factory.name(),
            sections = sections.len(),
            seeds = seeds.len()
        );
        self.scan(sections, seeds, issues).instrument(span).await
    }

    async fn scan(
        &mut self,
        sections: &[CodeSection],
        seeds: &[SeedGroup],
        issues: &mut IssueSink,
    ) -> ScanResult {
        let total_bytes = sections
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.len()));
        let yield_every = self.limits.yield_every.max(1);

        let mut decoders: Vec<_> = sections
            .iter()
            .map(|section| match self.factory.create(section) {
                Ok(decoder) => Some(decoder),
                Err(e) => {
                    issues.info(format!(
                        "section {} at {:#x}: no decoder: {e}",
                        section.name, section.start_va
                    ));
                    None
                }
            })
            .collect();

        let mut traversal = Traversal::from_seeds(&flatten_unique(seeds));
        let mut counters = Counters::default();
        let mut termination = Termination::Completed;

        'work: while let Some(start) = traversal.pop() {
            if self.cancel.is_cancelled() {
                termination = Termination::Cancelled;
                break;
            }
            let Some(index) = section_index(sections, start) else {
                trace!("{:#x} is outside every code section", start);
                continue;
            };
            let section = &sections[index];
            let (Some(decoder), Some(offset)) = (decoders[index].as_mut(), section.offset_of(start))
            else {
                continue;
            };
            if let Err(e) = decoder.reposition(offset, start) {
                issues.info(format!("cannot start decoding at {start:#x}: {e}"));
                continue;
            }
            debug!(section = %section.name, "block at {:#x}", start);

            while decoder.can_decode() {
                if self.cancel.is_cancelled() {
                    termination = Termination::Cancelled;
                    break 'work;
                }

                let insn = decoder.decode();
                if !traversal.mark_visited(insn.address) {
                    break;
                }
                if insn.length == 0 {
                    counters.invalid += 1;
                    issues.info(format!("zero-length decode at {:#x}", insn.address));
                    break;
                }
                counters.bytes_decoded = counters
                    .bytes_decoded
                    .saturating_add(insn.length as u64)
                    .min(total_bytes);
                if insn.is_invalid
                    || (insn.flow == FlowKind::Exception && !insn.is_intentional_trap)
                {
                    counters.invalid += 1;
                    issues.info(format!("invalid instruction at {:#x}", insn.address));
                    break;
                }

                counters.instructions += 1;
                if !insn.is_intentional_trap {
                    for &feature in &insn.features {
                        *counters.features.entry(feature).or_insert(0) += 1;
                    }
                }

                let stop = match insn.flow {
                    FlowKind::UnconditionalBranch => {
                        if let Some(target) = insn.near_branch_target {
                            traversal.schedule(target);
                        }
                        true
                    }
                    FlowKind::ConditionalBranch
                    | FlowKind::Call
                    | FlowKind::IndirectCall
                    | FlowKind::Transactional => {
                        if let Some(target) = insn.near_branch_target {
                            traversal.schedule(target);
                        }
                        false
                    }
                    FlowKind::IndirectBranch | FlowKind::Return | FlowKind::Interrupt => true,
                    FlowKind::Next | FlowKind::Exception => false,
                };

                if let Some(max) = self.limits.max_instructions {
                    if counters.instructions >= max {
                        issues.info(format!("instruction budget of {max} reached"));
                        termination = Termination::BudgetExhausted;
                        break 'work;
                    }
                }

                if counters.instructions % yield_every == 0 {
                    self.report(&counters, traversal.pending());
                    tokio::task::yield_now().await;
                    if self.cancel.is_cancelled() {
                        termination = Termination::Cancelled;
                        break 'work;
                    }
                }

                if stop {
                    break;
                }
                let Some(next) = insn.address.checked_add(insn.length as u64) else {
                    break;
                };
                if section_index(sections, next) != Some(index) {
                    break;
                }
            }
        }

        for (decoder, section) in decoders.iter_mut().zip(sections) {
            if let Some(decoder) = decoder {
                if let Err(e) = decoder.release() {
                    warn!(section = %section.name, error = %e, "decoder release failed");
                }
            }
        }

        info!(
            instructions = counters.instructions,
            bytes = counters.bytes_decoded,
            invalid = counters.invalid,
            features = counters.features.len(),
            visited = traversal.visited(),
            ?termination,
            "guided scan finished"
        );

        ScanResult {
            bytes_decoded: counters.bytes_decoded,
            instruction_count: counters.instructions,
            invalid_instruction_count: counters.invalid,
            feature_counts: counters.features,
            issues: issues.snapshot(),
            termination,
        }
    }

    fn report(&mut self, counters: &Counters, pending: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress(&ScanProgress {
                instructions: counters.instructions,
                bytes_decoded: counters.bytes_decoded,
                invalid_instructions: counters.invalid,
                pending,
            });
        }
    }
}
