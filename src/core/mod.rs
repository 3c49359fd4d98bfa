//! Core data types for isaprobe.
//!
//! These are the values passed between the container parsers, the seed
//! collectors and the guided scanner: mapped regions and their address
//! translation, seed groups, code sections, decoded instructions and the
//! decoder capability traits, plus the shared diagnostic sink.

pub mod binary;
pub mod disassembler;
pub mod instruction;
pub mod issues;
pub mod region;
pub mod section;
pub mod seed;
