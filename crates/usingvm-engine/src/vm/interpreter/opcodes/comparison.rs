//! Logic opcode handlers: Not, And, Ige, IsNullish, IsClosing

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_comparison_ops(
        &mut self,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        let stack = &mut frame.stack;
        let result = match opcode {
            Opcode::Not => !stack.pop()?.is_truthy(),
            Opcode::And => {
                let b = stack.pop()?;
                let a = stack.pop()?;
                a.is_truthy() && b.is_truthy()
            }
            Opcode::Ige => {
                let b = stack.pop()?;
                let a = stack.pop()?;
                match (a.as_int(), b.as_int()) {
                    (Some(a), Some(b)) => a >= b,
                    _ => {
                        return Err(VmError::TypeError(format!(
                            "IGE expects integers, got {} and {}",
                            a.type_name(),
                            b.type_name()
                        )))
                    }
                }
            }
            Opcode::IsNullish => stack.pop()?.is_nullish(),
            Opcode::IsClosing => matches!(stack.pop()?, Value::GeneratorClosing),
            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        };
        stack.push(Value::Bool(result))?;
        Ok(OpcodeResult::Continue)
    }
}
