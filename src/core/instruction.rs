//! Decoder-neutral view of one decoded instruction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque instruction-set extension tag, named by the backend's feature catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How control leaves an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    /// Falls through to the next instruction.
    Next,
    UnconditionalBranch,
    ConditionalBranch,
    Call,
    IndirectCall,
    IndirectBranch,
    Return,
    /// Software interrupt or system call.
    Interrupt,
    /// Transactional memory begin/abort/end.
    Transactional,
    /// Raises an exception (undefined opcode and friends).
    Exception,
}

/// One instruction as reported by a decoder adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub address: u64,
    /// Zero when the decoder could not make progress.
    pub length: usize,
    pub next_address: u64,
    pub flow: FlowKind,
    /// Statically known near-branch target, if any.
    pub near_branch_target: Option<u64>,
    pub is_invalid: bool,
    /// The architecture's deliberate "undefined instruction" trap (x86 `UD2`).
    pub is_intentional_trap: bool,
    pub features: Vec<FeatureId>,
}

impl DecodedInstruction {
    /// An undecodable run of `length` bytes at `address`.
    pub fn invalid(address: u64, length: usize) -> Self {
        Self {
            address,
            length,
            next_address: address.wrapping_add(length as u64),
            flow: FlowKind::Exception,
            near_branch_target: None,
            is_invalid: true,
            is_intentional_trap: false,
            features: Vec::new(),
        }
    }

    pub fn is_near_branch(&self) -> bool {
        self.near_branch_target.is_some()
    }
}
