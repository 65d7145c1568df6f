//! Virtual machine execution

mod core;
mod execution;
pub mod opcodes;
mod vm_facade;

pub use self::core::Interpreter;
pub use execution::{ExecutionResult, OpcodeResult};
pub use vm_facade::{Vm, VmOptions, VmStats};
