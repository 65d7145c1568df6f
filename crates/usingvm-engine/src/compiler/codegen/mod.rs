//! Bytecode generation
//!
//! [`BytecodeEmitter`] owns one function's code buffer; the structured
//! emitters in [`control`] and [`using`] drive it.

pub mod control;
pub mod emitter;
pub mod using;

pub use control::{
    emit_rethrow_if_closing, emit_throw_if_exception, ConditionKind, IfEmitter, TryEmitter, TryKind,
    WhileEmitter,
};
pub use emitter::{BytecodeEmitter, JumpPatch, TryStartPatch, NO_HANDLER};
pub use using::{DisposalCompletion, UsingEmitter};
