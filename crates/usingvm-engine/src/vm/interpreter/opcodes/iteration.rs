//! List and iterator opcode handlers: GetElem, GetIterator, IterNext, IterClose

use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::iterator::IteratorRef;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_iteration_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        let stack = &mut frame.stack;
        match opcode {
            Opcode::GetElem => {
                let index = stack.pop()?;
                let list = stack.pop()?;
                let (Value::List(items), Some(index)) = (&list, index.as_int()) else {
                    return Err(VmError::TypeError(format!(
                        "GET_ELEM expects a list and an integer, got {} and {}",
                        list.type_name(),
                        index.type_name()
                    )));
                };
                let element = usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default();
                stack.push(element)?;
            }

            Opcode::GetIterator => {
                let iterable = stack.pop()?;
                let iterator = match iterable {
                    Value::List(items) => IteratorRef::from_values(items.as_ref().clone()),
                    Value::Iterator(it) => it,
                    other => {
                        return Ok(OpcodeResult::Throw(Value::type_error(format!(
                            "{} is not iterable",
                            other.type_name()
                        ))))
                    }
                };
                stack.push(Value::Iterator(iterator))?;
            }

            Opcode::IterNext => {
                let Value::Iterator(iterator) = stack.peek()?.clone() else {
                    return Err(VmError::TypeError("ITER_NEXT expects an iterator".to_string()));
                };
                match iterator.next() {
                    Some(value) => {
                        stack.push(value)?;
                        stack.push(Value::Bool(false))?;
                    }
                    None => {
                        stack.push(Value::Undefined)?;
                        stack.push(Value::Bool(true))?;
                    }
                }
            }

            Opcode::IterClose => {
                let on_throw = Self::read_u8(code, ip)? == 1;
                let Value::Iterator(iterator) = stack.pop()? else {
                    return Err(VmError::TypeError("ITER_CLOSE expects an iterator".to_string()));
                };
                log::trace!("closing iterator (throw completion: {})", on_throw);
                // A throw completion wins over an error from closing.
                if let Err(exception) = iterator.close() {
                    if !on_throw {
                        return Ok(OpcodeResult::Throw(exception));
                    }
                }
            }

            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        }
        Ok(OpcodeResult::Continue)
    }
}
