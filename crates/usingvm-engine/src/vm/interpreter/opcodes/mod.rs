//! Opcode handler modules for the VM interpreter
//!
//! Each module implements a category of opcode handlers as methods on `Interpreter`.

pub mod arithmetic;
pub mod calls;
pub mod comparison;
pub mod constants;
pub mod control_flow;
pub mod disposal;
pub mod exceptions;
pub mod iteration;
pub mod stack;
pub mod suspension;
pub mod variables;
