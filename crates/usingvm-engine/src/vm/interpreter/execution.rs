//! Execution result types for the suspendable interpreter
//!
//! The interpreter runs one task until it completes, throws, suspends or
//! fails. Guest exceptions (`Threw`) are distinct from machine faults
//! (`Failed`).

use crate::vm::scheduler::SuspendReason;
use crate::vm::value::Value;
use crate::vm::VmError;

/// Result of running a task
///
/// - `Completed`: the function returned
/// - `Threw`: an exception escaped the function
/// - `Suspended`: the task is waiting; its frame holds the resume point
/// - `Failed`: the VM itself hit an error
#[derive(Debug)]
pub enum ExecutionResult {
    /// Task completed successfully with a return value
    Completed(Value),

    /// An uncaught exception escaped the task
    Threw(Value),

    /// Task is suspended waiting for something
    Suspended(SuspendReason),

    /// Task failed with an error
    Failed(VmError),
}

impl ExecutionResult {
    /// Create a completed result with a value
    pub fn completed(value: Value) -> Self {
        ExecutionResult::Completed(value)
    }

    /// Create a suspended result
    pub fn suspended(reason: SuspendReason) -> Self {
        ExecutionResult::Suspended(reason)
    }

    /// Create a failed result
    pub fn failed(error: VmError) -> Self {
        ExecutionResult::Failed(error)
    }
}

/// Result of executing a single opcode
///
/// Handlers return `Result<OpcodeResult, VmError>`; the error arm is a
/// machine fault and stops the task.
#[derive(Debug)]
pub enum OpcodeResult {
    /// Continue to next instruction
    Continue,

    /// Return from the function with a value
    Return(Value),

    /// Suspend the task with the given reason
    Suspend(SuspendReason),

    /// Throw a guest exception from the current instruction
    Throw(Value),
}
