//! Exception handling opcode handlers: Throw, TryStart, EndTry

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::{ExceptionHandler, Frame};
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_exception_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        match opcode {
            Opcode::Throw => {
                let exception = frame.stack.pop()?;
                return Ok(OpcodeResult::Throw(exception));
            }

            Opcode::TryStart => {
                let catch_rel = Self::read_i32(code, ip)?;
                let finally_rel = Self::read_i32(code, ip)?;
                let resolve = |rel: i32| -> VmResult<Option<usize>> {
                    if rel < 0 {
                        Ok(None)
                    } else {
                        Self::jump_target(code, *ip, rel).map(Some)
                    }
                };
                let handler = ExceptionHandler {
                    catch_offset: resolve(catch_rel)?,
                    finally_offset: resolve(finally_rel)?,
                    stack_size: frame.stack.depth(),
                };
                frame.handlers.push(handler);
            }

            Opcode::EndTry => {
                frame
                    .handlers
                    .pop()
                    .ok_or_else(|| VmError::RuntimeError("END_TRY without a handler".to_string()))?;
            }

            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        }
        Ok(OpcodeResult::Continue)
    }
}
