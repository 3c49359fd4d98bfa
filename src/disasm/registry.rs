use crate::core::binary::Endianness;
use crate::core::disassembler::{
    Architecture, DecodeError, DecodeResult, DecoderFactory, FeatureCatalog, InstructionDecoder,
};
use crate::core::instruction::FeatureId;
use crate::core::section::CodeSection;

use super::capstone::CapstoneDecoderFactory;
use super::iced::IcedDecoderFactory;

pub enum Backend {
    Iced(IcedDecoderFactory),
    Cap(CapstoneDecoderFactory),
}

impl FeatureCatalog for Backend {
    fn feature_label(&self, id: FeatureId) -> Option<String> {
        match self {
            Backend::Iced(d) => d.feature_label(id),
            Backend::Cap(d) => d.feature_label(id),
        }
    }
}

impl DecoderFactory for Backend {
    fn architecture(&self) -> Architecture {
        match self {
            Backend::Iced(d) => d.architecture(),
            Backend::Cap(d) => d.architecture(),
        }
    }

    fn create<'a>(
        &self,
        section: &'a CodeSection,
    ) -> DecodeResult<Box<dyn InstructionDecoder + 'a>> {
        match self {
            Backend::Iced(d) => d.create(section),
            Backend::Cap(d) => d.create(section),
        }
    }

    fn name(&self) -> &str {
        match self {
            Backend::Iced(d) => d.name(),
            Backend::Cap(d) => d.name(),
        }
    }
}

/// Select a decoder backend for the given architecture.
pub fn for_arch(arch: Architecture, endianness: Endianness) -> Option<Backend> {
    for_arch_with(arch, endianness, None).ok()
}

/// Preferred backend kind for explicit selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Iced,
    Capstone,
}

/// Explicit backend selector. Returns an error if the backend cannot support the arch.
pub fn for_arch_with(
    arch: Architecture,
    endianness: Endianness,
    prefer: Option<BackendKind>,
) -> Result<Backend, DecodeError> {
    let kind = match prefer {
        Some(kind) => kind,
        None => match arch {
            Architecture::X86 | Architecture::X86_64 => BackendKind::Iced,
            Architecture::ARM64 => BackendKind::Capstone,
            other => return Err(DecodeError::UnsupportedArchitecture(other)),
        },
    };
    match kind {
        BackendKind::Iced => IcedDecoderFactory::new(arch).map(Backend::Iced),
        BackendKind::Capstone => CapstoneDecoderFactory::new(arch, endianness).map(Backend::Cap),
    }
}
