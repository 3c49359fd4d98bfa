//! Decoder backends and backend selection.
//!
//! - iced-x86 for x86 and x86-64
//! - capstone for AArch64

pub mod capstone;
pub mod iced;
pub mod registry;

pub use registry::{for_arch, for_arch_with, Backend, BackendKind};
