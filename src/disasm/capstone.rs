//! capstone adapter for AArch64.
//!
//! Control flow comes from the mnemonic plus capstone's generic instruction
//! groups. Architecture-specific groups (ids from 128 up, e.g. `neon`,
//! `crypto`, `sve`) are reported as features.

use capstone::arch::arm64::Arm64OperandType;
use capstone::prelude::*;
use capstone::{Arch, Capstone, Endian, Mode, NO_EXTRA_MODE};

use crate::core::binary::Endianness;
use crate::core::disassembler::{
    Architecture, DecodeError, DecodeResult, DecoderFactory, FeatureCatalog, InstructionDecoder,
};
use crate::core::instruction::{DecodedInstruction, FeatureId, FlowKind};
use crate::core::section::CodeSection;

// Generic capstone group ids (cs_group_type).
const GROUP_JUMP: u8 = 1;
const GROUP_CALL: u8 = 2;
const GROUP_RET: u8 = 3;
const GROUP_INT: u8 = 4;
const GROUP_IRET: u8 = 5;
/// Groups at or above this id are architecture feature groups.
const FIRST_ARCH_GROUP: u8 = 128;

const ARM64_INSN_LEN: usize = 4;

fn cs_arch_mode(arch: Architecture, end: Endianness) -> Option<(Arch, Mode, Option<Endian>)> {
    let endian = if matches!(end, Endianness::Big) {
        Endian::Big
    } else {
        Endian::Little
    };
    match arch {
        Architecture::ARM64 => Some((Arch::ARM64, Mode::Arm, Some(endian))),
        _ => None,
    }
}

fn open(arch: Architecture, endianness: Endianness) -> DecodeResult<Capstone> {
    let (a, m, endian) =
        cs_arch_mode(arch, endianness).ok_or(DecodeError::UnsupportedArchitecture(arch))?;
    let mut cs = Capstone::new_raw(a, m, NO_EXTRA_MODE, endian)
        .map_err(|e| DecodeError::BackendInit(e.to_string()))?;
    // Groups and operands live in the detail block.
    cs.set_detail(true)
        .map_err(|e| DecodeError::BackendInit(e.to_string()))?;
    Ok(cs)
}

pub struct CapstoneDecoderFactory {
    // Kept for feature-group names.
    cs: Capstone,
    arch: Architecture,
    endianness: Endianness,
}

impl CapstoneDecoderFactory {
    pub fn new(arch: Architecture, endianness: Endianness) -> DecodeResult<Self> {
        Ok(Self {
            cs: open(arch, endianness)?,
            arch,
            endianness,
        })
    }
}

impl FeatureCatalog for CapstoneDecoderFactory {
    fn feature_label(&self, id: FeatureId) -> Option<String> {
        let group = u8::try_from(id.0).ok()?;
        self.cs.group_name(InsnGroupId(group))
    }
}

impl DecoderFactory for CapstoneDecoderFactory {
    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn create<'a>(
        &self,
        section: &'a CodeSection,
    ) -> DecodeResult<Box<dyn InstructionDecoder + 'a>> {
        Ok(Box::new(CapstoneSectionDecoder {
            cs: open(self.arch, self.endianness)?,
            bytes: &section.bytes,
            position: 0,
            ip: section.start_va,
        }))
    }

    fn name(&self) -> &str {
        "capstone"
    }
}

pub struct CapstoneSectionDecoder<'a> {
    cs: Capstone,
    bytes: &'a [u8],
    position: usize,
    ip: u64,
}

impl CapstoneSectionDecoder<'_> {
    fn decode_at_position(&self) -> Option<DecodedInstruction> {
        let code = self.bytes.get(self.position..)?;
        let insns = self.cs.disasm_count(code, self.ip, 1).ok()?;
        let insn = insns.iter().next()?;
        let length = insn.bytes().len();
        let mnemonic = insn.mnemonic().unwrap_or("").to_ascii_lowercase();
        let detail = self.cs.insn_detail(insn).ok()?;

        let groups: Vec<u8> = detail.groups().iter().map(|g| g.0).collect();
        let target = detail.arch_detail().arm64().and_then(|a| {
            a.operands()
                .filter_map(|op| match op.op_type {
                    Arm64OperandType::Imm(i) => Some(i as u64),
                    _ => None,
                })
                .last()
        });

        let flow = classify(&mnemonic, &groups);
        let near_branch_target = match flow {
            FlowKind::UnconditionalBranch | FlowKind::ConditionalBranch | FlowKind::Call => target,
            _ => None,
        };
        let features = groups
            .iter()
            .filter(|&&g| g >= FIRST_ARCH_GROUP)
            .map(|&g| FeatureId(g as u32))
            .collect();

        Some(DecodedInstruction {
            address: insn.address(),
            length,
            next_address: insn.address().wrapping_add(length as u64),
            flow,
            near_branch_target,
            is_invalid: false,
            is_intentional_trap: false,
            features,
        })
    }
}

impl InstructionDecoder for CapstoneSectionDecoder<'_> {
    fn reposition(&mut self, offset: usize, ip: u64) -> DecodeResult<()> {
        if offset > self.bytes.len() {
            return Err(DecodeError::InvalidPosition {
                offset,
                len: self.bytes.len(),
            });
        }
        self.position = offset;
        self.ip = ip;
        Ok(())
    }

    fn can_decode(&self) -> bool {
        self.position < self.bytes.len()
    }

    fn decode(&mut self) -> DecodedInstruction {
        let insn = self.decode_at_position().unwrap_or_else(|| {
            // Fixed-width ISA: skip one slot (or whatever is left).
            let remaining = self.bytes.len().saturating_sub(self.position);
            DecodedInstruction::invalid(self.ip, remaining.min(ARM64_INSN_LEN))
        });
        self.position += insn.length;
        self.ip = self.ip.wrapping_add(insn.length as u64);
        insn
    }
}

/// Map an AArch64 mnemonic and its generic groups to a flow kind.
fn classify(mnemonic: &str, groups: &[u8]) -> FlowKind {
    let has = |g: u8| groups.contains(&g);
    match mnemonic {
        "b" => FlowKind::UnconditionalBranch,
        "bl" => FlowKind::Call,
        "blr" | "blraa" | "blrab" | "blraaz" | "blrabz" => FlowKind::IndirectCall,
        "br" | "braa" | "brab" | "braaz" | "brabz" => FlowKind::IndirectBranch,
        "ret" | "retaa" | "retab" | "eret" | "eretaa" | "eretab" => FlowKind::Return,
        "cbz" | "cbnz" | "tbz" | "tbnz" => FlowKind::ConditionalBranch,
        "svc" | "hvc" | "smc" | "brk" | "hlt" => FlowKind::Interrupt,
        m if m.starts_with("b.") => FlowKind::ConditionalBranch,
        _ if has(GROUP_RET) || has(GROUP_IRET) => FlowKind::Return,
        _ if has(GROUP_INT) => FlowKind::Interrupt,
        _ if has(GROUP_CALL) => FlowKind::IndirectCall,
        _ if has(GROUP_JUMP) => FlowKind::IndirectBranch,
        _ => FlowKind::Next,
    }
}
