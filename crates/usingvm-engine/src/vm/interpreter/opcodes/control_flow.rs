//! Control flow opcode handlers: Jmp, JmpIfFalse, JmpIfTrue, RetRval

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_control_flow_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        match opcode {
            Opcode::Jmp => {
                let offset = Self::read_i32(code, ip)?;
                *ip = Self::jump_target(code, *ip, offset)?;
            }

            Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                let offset = Self::read_i32(code, ip)?;
                let cond = frame.stack.pop()?;
                if cond.is_truthy() == (opcode == Opcode::JmpIfTrue) {
                    *ip = Self::jump_target(code, *ip, offset)?;
                }
            }

            Opcode::RetRval => return Ok(OpcodeResult::Return(frame.rval.clone())),

            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        }
        Ok(OpcodeResult::Continue)
    }
}
