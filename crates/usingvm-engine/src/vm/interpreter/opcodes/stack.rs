//! Stack manipulation opcode handlers: Nop, Pop, PopN, Dup, Dup2, DupAt, Swap, Pick, Unpick

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_stack_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        let stack = &mut frame.stack;
        match opcode {
            Opcode::Nop => {}

            Opcode::Pop => {
                stack.pop()?;
            }

            Opcode::PopN => {
                let count = Self::read_u8(code, ip)?;
                for _ in 0..count {
                    stack.pop()?;
                }
            }

            Opcode::Dup => {
                let value = stack.peek()?.clone();
                stack.push(value)?;
            }

            Opcode::Dup2 => {
                let a = stack.peek_at(1)?.clone();
                let b = stack.peek()?.clone();
                stack.push(a)?;
                stack.push(b)?;
            }

            Opcode::DupAt => {
                let depth = Self::read_u8(code, ip)? as usize;
                let value = stack.peek_at(depth)?.clone();
                stack.push(value)?;
            }

            Opcode::Swap => stack.swap()?,

            Opcode::Pick => {
                let depth = Self::read_u8(code, ip)? as usize;
                stack.pick(depth)?;
            }

            Opcode::Unpick => {
                let depth = Self::read_u8(code, ip)? as usize;
                stack.unpick(depth)?;
            }

            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        }
        Ok(OpcodeResult::Continue)
    }
}
