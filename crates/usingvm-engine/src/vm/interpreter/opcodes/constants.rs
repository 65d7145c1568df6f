//! Constant opcode handlers: ConstUndefined, ConstNull, ConstTrue, ConstFalse, ConstI32, ConstStr

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_constant_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        let value = match opcode {
            Opcode::ConstUndefined => Value::Undefined,
            Opcode::ConstNull => Value::Null,
            Opcode::ConstTrue => Value::Bool(true),
            Opcode::ConstFalse => Value::Bool(false),
            Opcode::ConstI32 => Value::Int(Self::read_i32(code, ip)?),
            Opcode::ConstStr => {
                let index = Self::read_u32(code, ip)?;
                let s = frame
                    .module
                    .constants
                    .get_string(index)
                    .ok_or_else(|| VmError::RuntimeError(format!("Invalid string constant {}", index)))?;
                Value::str(s)
            }
            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        };
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }
}
