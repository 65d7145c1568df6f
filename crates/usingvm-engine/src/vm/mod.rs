//! UsingVM runtime
//!
//! This module provides the machinery that executes compiled modules:
//! - Values, plain objects, promises and list iterators
//! - Disposable resource registration and dispose capabilities
//! - The suspendable bytecode interpreter
//! - A cooperative scheduler for async functions and generators

pub mod completion;
pub mod disposal;
pub mod frame;
pub mod interpreter;
pub mod iterator;
pub mod object;
pub mod promise;
pub mod scheduler;
pub mod stack;
pub mod value;

pub use completion::Completion;
pub use disposal::{create_disposable_resource, get_dispose_method, DisposableResource, DisposeCapability};
pub use frame::{ExceptionHandler, Frame};
pub use interpreter::{ExecutionResult, Interpreter, OpcodeResult, Vm, VmOptions, VmStats};
pub use iterator::IteratorRef;
pub use object::{ObjectRef, PropertyKey, WellKnownSymbol};
pub use promise::{Promise, PromiseState};
pub use scheduler::{ResumeMode, Scheduler, SuspendReason, Task, TaskId, TaskState, TaskStatus};
pub use stack::Stack;
pub use value::{ErrorKind, ErrorObject, NativeFunction, Value};

use crate::compiler::bytecode::VerifyError;

/// VM execution errors
///
/// These are faults of the machine or the host, never guest exceptions:
/// a guest `throw` surfaces as [`TaskStatus::Threw`].
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Invalid opcode
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// Operand or instruction runs past the end of the code
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Module failed verification on load
    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// No function with this name in the module
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Unknown task
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Generator operation on a task that is not a generator
    #[error("{0} is not a generator")]
    NotAGenerator(TaskId),

    /// Generator resumed while it is already running or awaiting
    #[error("{0} is already running")]
    TaskBusy(TaskId),

    /// Instruction budget exhausted
    #[error("Step budget of {0} instructions exceeded")]
    StepBudgetExceeded(u64),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
