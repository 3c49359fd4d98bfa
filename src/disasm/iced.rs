//! iced-x86 adapter for x86 and x86-64.

use iced_x86::{Code, CpuidFeature, Decoder, DecoderOptions, FlowControl, Instruction, OpKind};
use once_cell::sync::Lazy;

use crate::core::disassembler::{
    Architecture, DecodeError, DecodeResult, DecoderFactory, FeatureCatalog, InstructionDecoder,
};
use crate::core::instruction::{DecodedInstruction, FeatureId, FlowKind};
use crate::core::section::CodeSection;

/// `CpuidFeature` names indexed by discriminant.
static CPUID_LABELS: Lazy<Vec<String>> =
    Lazy::new(|| CpuidFeature::values().map(|f| format!("{:?}", f)).collect());

pub struct IcedDecoderFactory {
    bitness: u32,
    arch: Architecture,
}

impl IcedDecoderFactory {
    pub fn new(arch: Architecture) -> DecodeResult<Self> {
        let bitness = match arch {
            Architecture::X86 => 32,
            Architecture::X86_64 => 64,
            other => return Err(DecodeError::UnsupportedArchitecture(other)),
        };
        Ok(Self { bitness, arch })
    }
}

impl FeatureCatalog for IcedDecoderFactory {
    fn feature_label(&self, id: FeatureId) -> Option<String> {
        CPUID_LABELS.get(id.0 as usize).cloned()
    }
}

impl DecoderFactory for IcedDecoderFactory {
    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn create<'a>(
        &self,
        section: &'a CodeSection,
    ) -> DecodeResult<Box<dyn InstructionDecoder + 'a>> {
        let decoder = Decoder::try_with_ip(
            self.bitness,
            &section.bytes,
            section.start_va,
            DecoderOptions::NONE,
        )
        .map_err(|e| DecodeError::BackendInit(e.to_string()))?;
        Ok(Box::new(IcedSectionDecoder {
            decoder,
            len: section.bytes.len(),
        }))
    }

    fn name(&self) -> &str {
        "iced-x86"
    }
}

pub struct IcedSectionDecoder<'a> {
    decoder: Decoder<'a>,
    len: usize,
}

impl InstructionDecoder for IcedSectionDecoder<'_> {
    fn reposition(&mut self, offset: usize, ip: u64) -> DecodeResult<()> {
        self.decoder
            .set_position(offset)
            .map_err(|_| DecodeError::InvalidPosition {
                offset,
                len: self.len,
            })?;
        self.decoder.set_ip(ip);
        Ok(())
    }

    fn can_decode(&self) -> bool {
        self.decoder.can_decode()
    }

    fn decode(&mut self) -> DecodedInstruction {
        let instr = self.decoder.decode();
        convert(&instr)
    }
}

#[allow(unreachable_patterns)]
fn flow_kind(flow: FlowControl) -> FlowKind {
    match flow {
        FlowControl::Next => FlowKind::Next,
        FlowControl::UnconditionalBranch => FlowKind::UnconditionalBranch,
        FlowControl::IndirectBranch => FlowKind::IndirectBranch,
        FlowControl::ConditionalBranch => FlowKind::ConditionalBranch,
        FlowControl::Return => FlowKind::Return,
        FlowControl::Call => FlowKind::Call,
        FlowControl::IndirectCall => FlowKind::IndirectCall,
        FlowControl::Interrupt => FlowKind::Interrupt,
        FlowControl::XbeginXabortXend => FlowKind::Transactional,
        FlowControl::Exception => FlowKind::Exception,
        _ => FlowKind::Next,
    }
}

fn convert(instr: &Instruction) -> DecodedInstruction {
    let near_branch_target = match instr.op0_kind() {
        OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => {
            Some(instr.near_branch_target())
        }
        _ => None,
    };
    let is_invalid = instr.is_invalid();
    let features = if is_invalid {
        Vec::new()
    } else {
        instr
            .cpuid_features()
            .iter()
            .map(|&f| FeatureId(f as u32))
            .collect()
    };

    DecodedInstruction {
        address: instr.ip(),
        length: instr.len(),
        next_address: instr.next_ip(),
        flow: flow_kind(instr.flow_control()),
        near_branch_target,
        is_invalid,
        is_intentional_trap: instr.code() == Code::Ud2,
        features,
    }
}
