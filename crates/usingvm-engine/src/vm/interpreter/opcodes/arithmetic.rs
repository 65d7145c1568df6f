//! Counter opcode handlers: Inc, Dec

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_arithmetic_ops(
        &mut self,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        let value = frame.stack.pop()?;
        let n = value
            .as_int()
            .ok_or_else(|| VmError::TypeError(format!("{} expects an integer", opcode.name())))?;
        let result = match opcode {
            Opcode::Inc => n.wrapping_add(1),
            Opcode::Dec => n.wrapping_sub(1),
            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        };
        frame.stack.push(Value::Int(result))?;
        Ok(OpcodeResult::Continue)
    }
}
