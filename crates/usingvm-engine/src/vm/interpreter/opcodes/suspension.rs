//! Suspension opcode handlers: Await, Yield
//!
//! Both hand their operand through the frame's return-value slot before
//! suspending; the scheduler pushes the resumed value when the task
//! continues. Code that must preserve a pending return value across an
//! await saves and restores the slot itself.

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::scheduler::SuspendReason;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_suspension_ops(
        &mut self,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        let value = frame.stack.pop()?;
        frame.rval = value.clone();
        let reason = match opcode {
            Opcode::Await => SuspendReason::Await(value),
            Opcode::Yield => SuspendReason::Yield(value),
            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        };
        Ok(OpcodeResult::Suspend(reason))
    }
}
