//! Variable opcode handlers: LoadLocal, StoreLocal, LoadGlobal, GetRval, SetRval

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_variable_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        match opcode {
            Opcode::LoadLocal => {
                let index = Self::read_u16(code, ip)? as usize;
                let value = frame
                    .locals
                    .get(index)
                    .cloned()
                    .ok_or_else(|| VmError::RuntimeError(format!("Invalid local {}", index)))?;
                frame.stack.push(value)?;
            }

            Opcode::StoreLocal => {
                let index = Self::read_u16(code, ip)? as usize;
                let value = frame.stack.pop()?;
                let slot = frame
                    .locals
                    .get_mut(index)
                    .ok_or_else(|| VmError::RuntimeError(format!("Invalid local {}", index)))?;
                *slot = value;
            }

            Opcode::LoadGlobal => {
                let index = Self::read_u32(code, ip)?;
                let name = frame
                    .module
                    .constants
                    .get_string(index)
                    .ok_or_else(|| VmError::RuntimeError(format!("Invalid string constant {}", index)))?;
                match self.globals.get(name) {
                    Some(value) => frame.stack.push(value.clone())?,
                    None => {
                        return Ok(OpcodeResult::Throw(Value::reference_error(format!(
                            "{} is not defined",
                            name
                        ))))
                    }
                }
            }

            Opcode::GetRval => {
                let value = frame.rval.clone();
                frame.stack.push(value)?;
            }

            Opcode::SetRval => {
                frame.rval = frame.stack.pop()?;
            }

            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        }
        Ok(OpcodeResult::Continue)
    }
}
