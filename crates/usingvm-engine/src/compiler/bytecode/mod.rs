//! UsingVM Bytecode Definitions
//!
//! This module provides the instruction set, module format, constant pool,
//! verifier and disassembler for the UsingVM.

pub mod constants;
pub mod disasm;
pub mod encoder;
pub mod module;
pub mod opcode;
pub mod verify;

pub use constants::ConstantPool;
pub use disasm::{decode_instructions, disassemble, listing, listing_json, Instruction};
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use module::{Function, FunctionKind, Module, ModuleError};
pub use opcode::{Opcode, ResourceFieldKind, UsingHint};
pub use verify::{verify_module, VerifyError};
