//! Call opcode handler

use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::value::Value;
use crate::vm::VmResult;

impl<'a> Interpreter<'a> {
    /// `CALL argc`: `callee this arg0..argN -> result`
    ///
    /// Only host functions are callable. A host function that fails throws
    /// its error value at the call site.
    pub(in crate::vm::interpreter) fn exec_call_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
    ) -> VmResult<OpcodeResult> {
        let argc = Self::read_u8(code, ip)? as usize;
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(frame.stack.pop()?);
        }
        args.reverse();
        let this = frame.stack.pop()?;
        let callee = frame.stack.pop()?;

        let Value::Function(function) = callee else {
            return Ok(OpcodeResult::Throw(Value::type_error(format!(
                "{} is not a function",
                callee.type_name()
            ))));
        };

        log::trace!("call {} with {} argument(s)", function.name(), argc);
        match function.call(&this, &args) {
            Ok(result) => {
                frame.stack.push(result)?;
                Ok(OpcodeResult::Continue)
            }
            Err(exception) => Ok(OpcodeResult::Throw(exception)),
        }
    }
}
