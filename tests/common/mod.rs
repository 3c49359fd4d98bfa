//! Shared helpers for integration tests: synthetic ELF64/PE32+ images and a
//! scripted decoder.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use isaprobe::core::disassembler::{
    Architecture, DecodeError, DecodeResult, DecoderFactory, FeatureCatalog, InstructionDecoder,
};
use isaprobe::core::instruction::{DecodedInstruction, FeatureId, FlowKind};
use isaprobe::core::section::CodeSection;

pub fn put(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

pub fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    put(buf, at, &value.to_le_bytes());
}

pub fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    put(buf, at, &value.to_le_bytes());
}

/// Synthetic little-endian ELF64 images.
pub mod elf {
    use super::*;

    pub const EM_X86_64: u16 = 62;
    pub const EM_ARM: u16 = 40;
    pub const EM_AARCH64: u16 = 183;

    pub const PT_LOAD: u32 = 1;
    pub const PT_DYNAMIC: u32 = 2;
    pub const PF_X: u32 = 1;
    pub const PF_R: u32 = 4;

    /// Load address of file offset zero in [`image`].
    pub const BASE: u64 = 0x40_0000;
    /// File offset of the dynamic table in [`image`].
    pub const DYNAMIC_OFFSET: usize = 0x200;

    #[derive(Debug, Clone, Copy)]
    pub struct Phdr {
        pub p_type: u32,
        pub flags: u32,
        pub offset: u64,
        pub vaddr: u64,
        pub filesz: u64,
    }

    /// Header plus program headers written into a zeroed file of `file_len` bytes.
    pub fn raw(machine: u16, entry: u64, phdrs: &[Phdr], file_len: usize) -> Vec<u8> {
        let mut out = vec![0u8; file_len];
        put(&mut out, 0, b"\x7fELF");
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // ELFDATA2LSB
        out[6] = 1;
        put(&mut out, 16, &2u16.to_le_bytes());
        put(&mut out, 18, &machine.to_le_bytes());
        put_u32(&mut out, 20, 1);
        put_u64(&mut out, 24, entry);
        put_u64(&mut out, 32, 64);
        put(&mut out, 52, &64u16.to_le_bytes());
        put(&mut out, 54, &56u16.to_le_bytes());
        put(&mut out, 56, &(phdrs.len() as u16).to_le_bytes());
        for (i, ph) in phdrs.iter().enumerate() {
            let at = 64 + i * 56;
            put_u32(&mut out, at, ph.p_type);
            put_u32(&mut out, at + 4, ph.flags);
            put_u64(&mut out, at + 8, ph.offset);
            put_u64(&mut out, at + 16, ph.vaddr);
            put_u64(&mut out, at + 24, ph.vaddr);
            put_u64(&mut out, at + 32, ph.filesz);
            put_u64(&mut out, at + 40, ph.filesz);
        }
        out
    }

    /// One R+X `PT_LOAD` mapping the whole file at [`BASE`] and a
    /// `PT_DYNAMIC` at [`DYNAMIC_OFFSET`] holding `dynamic` plus `DT_NULL`.
    pub fn image(machine: u16, entry: u64, dynamic: &[(i64, u64)], file_len: usize) -> Vec<u8> {
        let table = dynamic_table(dynamic);
        let phdrs = [
            Phdr {
                p_type: PT_LOAD,
                flags: PF_R | PF_X,
                offset: 0,
                vaddr: BASE,
                filesz: file_len as u64,
            },
            Phdr {
                p_type: PT_DYNAMIC,
                flags: PF_R,
                offset: DYNAMIC_OFFSET as u64,
                vaddr: BASE + DYNAMIC_OFFSET as u64,
                filesz: table.len() as u64,
            },
        ];
        let mut out = raw(machine, entry, &phdrs, file_len);
        put(&mut out, DYNAMIC_OFFSET, &table);
        out
    }

    pub fn dynamic_table(entries: &[(i64, u64)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (tag, value) in entries.iter().chain(std::iter::once(&(0, 0))) {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// An `Elf64_Sym` record.
    pub fn symbol(info: u8, shndx: u16, value: u64) -> [u8; 24] {
        let mut sym = [0u8; 24];
        sym[4] = info;
        sym[6..8].copy_from_slice(&shndx.to_le_bytes());
        sym[8..16].copy_from_slice(&value.to_le_bytes());
        sym
    }

    pub fn offset_of(va: u64) -> usize {
        (va - BASE) as usize
    }
}

/// Synthetic PE32+ images with one `.text` section holding everything.
pub mod pe {
    use super::*;

    pub const IMAGE_BASE: u64 = 0x1_4000_0000;
    pub const TEXT_RVA: u32 = 0x1000;
    pub const TEXT_RAW: u32 = 0x400;
    pub const TEXT_SIZE: u32 = 0x1000;

    pub const MACHINE_AMD64: u16 = 0x8664;
    pub const DIR_EXPORT: usize = 0;
    pub const DIR_EXCEPTION: usize = 3;
    pub const DIR_TLS: usize = 9;

    const E_LFANEW: usize = 0x80;
    const OPT: usize = E_LFANEW + 24;
    const OPT_SIZE: usize = 0xF0;

    /// `dirs` are `(index, rva, size)` data directory entries.
    pub fn image(entry_rva: u32, dirs: &[(usize, u32, u32)]) -> Vec<u8> {
        let mut out = vec![0u8; (TEXT_RAW + TEXT_SIZE) as usize];
        put(&mut out, 0, b"MZ");
        put_u32(&mut out, 0x3C, E_LFANEW as u32);

        put(&mut out, E_LFANEW, b"PE\0\0");
        put(&mut out, E_LFANEW + 4, &MACHINE_AMD64.to_le_bytes());
        put(&mut out, E_LFANEW + 6, &1u16.to_le_bytes());
        put(&mut out, E_LFANEW + 20, &(OPT_SIZE as u16).to_le_bytes());

        put(&mut out, OPT, &0x20Bu16.to_le_bytes());
        put_u32(&mut out, OPT + 16, entry_rva);
        put_u64(&mut out, OPT + 24, IMAGE_BASE);
        put_u32(&mut out, OPT + 108, 16);
        for &(index, rva, size) in dirs {
            put_u32(&mut out, OPT + 112 + index * 8, rva);
            put_u32(&mut out, OPT + 112 + index * 8 + 4, size);
        }

        let section = OPT + OPT_SIZE;
        put(&mut out, section, b".text");
        put_u32(&mut out, section + 8, TEXT_SIZE);
        put_u32(&mut out, section + 12, TEXT_RVA);
        put_u32(&mut out, section + 16, TEXT_SIZE);
        put_u32(&mut out, section + 20, TEXT_RAW);
        put_u32(&mut out, section + 36, 0x6000_0020);
        out
    }

    pub fn set_image_base(data: &mut [u8], base: u64) {
        put_u64(data, OPT + 24, base);
    }

    pub fn offset_of(rva: u32) -> usize {
        (rva - TEXT_RVA + TEXT_RAW) as usize
    }

    pub fn va(rva: u32) -> u64 {
        IMAGE_BASE + rva as u64
    }
}

/// Template for a scripted instruction; address fields are filled on decode.
pub fn insn(flow: FlowKind, length: usize) -> DecodedInstruction {
    DecodedInstruction {
        address: 0,
        length,
        next_address: 0,
        flow,
        near_branch_target: None,
        is_invalid: false,
        is_intentional_trap: false,
        features: Vec::new(),
    }
}

pub fn op(length: usize) -> DecodedInstruction {
    insn(FlowKind::Next, length)
}

pub fn branch(flow: FlowKind, length: usize, target: u64) -> DecodedInstruction {
    DecodedInstruction {
        near_branch_target: Some(target),
        ..insn(flow, length)
    }
}

pub fn ret() -> DecodedInstruction {
    insn(FlowKind::Return, 1)
}

/// The architecture's deliberate undefined-instruction trap.
pub fn trap(length: usize, ids: &[u32]) -> DecodedInstruction {
    DecodedInstruction {
        is_intentional_trap: true,
        ..with_features(insn(FlowKind::Exception, length), ids)
    }
}

pub fn with_features(mut insn: DecodedInstruction, ids: &[u32]) -> DecodedInstruction {
    insn.features = ids.iter().map(|&id| FeatureId(id)).collect();
    insn
}

/// Decoder factory that replays a fixed address → instruction script.
///
/// Addresses missing from the script decode as one invalid byte. Every
/// decode is appended to `log`.
#[derive(Default)]
pub struct ScriptedFactory {
    pub script: HashMap<u64, DecodedInstruction>,
    pub log: Rc<RefCell<Vec<u64>>>,
    /// Sections with this name get no decoder.
    pub refuse_section: Option<String>,
    pub fail_release: bool,
}

impl ScriptedFactory {
    pub fn new(script: impl IntoIterator<Item = (u64, DecodedInstruction)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn decoded(&self) -> Vec<u64> {
        self.log.borrow().clone()
    }
}

impl FeatureCatalog for ScriptedFactory {
    fn feature_label(&self, id: FeatureId) -> Option<String> {
        Some(format!("F{}", id.0))
    }
}

impl DecoderFactory for ScriptedFactory {
    fn architecture(&self) -> Architecture {
        Architecture::X86_64
    }

    fn create<'a>(
        &self,
        section: &'a CodeSection,
    ) -> DecodeResult<Box<dyn InstructionDecoder + 'a>> {
        if self.refuse_section.as_deref() == Some(section.name.as_str()) {
            return Err(DecodeError::BackendInit("refused".to_string()));
        }
        Ok(Box::new(ScriptedDecoder {
            script: self.script.clone(),
            log: Rc::clone(&self.log),
            start: section.start_va,
            len: section.bytes.len(),
            offset: 0,
            fail_release: self.fail_release,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedDecoder {
    script: HashMap<u64, DecodedInstruction>,
    log: Rc<RefCell<Vec<u64>>>,
    start: u64,
    len: usize,
    offset: usize,
    fail_release: bool,
}

impl InstructionDecoder for ScriptedDecoder {
    fn reposition(&mut self, offset: usize, _ip: u64) -> DecodeResult<()> {
        if offset > self.len {
            return Err(DecodeError::InvalidPosition {
                offset,
                len: self.len,
            });
        }
        self.offset = offset;
        Ok(())
    }

    fn can_decode(&self) -> bool {
        self.offset < self.len
    }

    fn decode(&mut self) -> DecodedInstruction {
        let address = self.start + self.offset as u64;
        self.log.borrow_mut().push(address);
        let mut insn = self
            .script
            .get(&address)
            .cloned()
            .unwrap_or_else(|| DecodedInstruction::invalid(address, 1));
        insn.address = address;
        insn.next_address = address + insn.length as u64;
        self.offset += insn.length;
        insn
    }

    fn release(&mut self) -> DecodeResult<()> {
        if self.fail_release {
            Err(DecodeError::Release("scripted".to_string()))
        } else {
            Ok(())
        }
    }
}
