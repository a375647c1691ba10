//! Core of the world map script toolchain: the opcode and constant tables,
//! the binary container codec, the disassembler that folds stack bytecode
//! into textual assembly, and the grammar-driven assembler that lowers it
//! back. The CLI driver and the archive/text collaborators live in the
//! `terraform` crate.

pub mod assembler;
pub mod constants;
pub mod container;
pub mod disassembler;
pub mod error;
pub mod opcode;
pub mod parser;

pub use error::{Result, ScriptError};
