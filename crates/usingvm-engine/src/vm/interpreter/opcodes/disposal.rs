//! Resource disposal opcode handlers
//!
//! PushDisposeScope, PopDisposeScope, AddDisposable, TakeDisposeCapability,
//! ResourceField, ChainDisposeError

use crate::compiler::bytecode::{Opcode, ResourceFieldKind, UsingHint};
use crate::vm::completion::Completion;
use crate::vm::disposal::{create_disposable_resource, DisposeCapability};
use crate::vm::frame::Frame;
use crate::vm::interpreter::execution::OpcodeResult;
use crate::vm::interpreter::Interpreter;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};
use std::sync::Arc;

impl<'a> Interpreter<'a> {
    pub(in crate::vm::interpreter) fn exec_disposal_ops(
        &mut self,
        frame: &mut Frame,
        ip: &mut usize,
        code: &[u8],
        opcode: Opcode,
    ) -> VmResult<OpcodeResult> {
        match opcode {
            Opcode::PushDisposeScope => {
                frame.dispose_scopes.push(DisposeCapability::new());
            }

            Opcode::PopDisposeScope => {
                let capability = frame
                    .dispose_scopes
                    .pop()
                    .ok_or_else(|| VmError::RuntimeError("No dispose scope to pop".to_string()))?;
                if !capability.is_empty() {
                    log::warn!("dispose scope popped with {} undisposed resource(s)", capability.len());
                }
            }

            Opcode::AddDisposable => {
                let byte = Self::read_u8(code, ip)?;
                let hint = UsingHint::from_u8(byte)
                    .ok_or_else(|| VmError::RuntimeError(format!("Invalid using hint {}", byte)))?;
                let value = frame.stack.pop()?;
                let resource = match create_disposable_resource(value, hint) {
                    Ok(resource) => resource,
                    Err(exception) => return Ok(OpcodeResult::Throw(exception)),
                };
                let capability = frame
                    .dispose_scopes
                    .last_mut()
                    .ok_or_else(|| VmError::RuntimeError("No dispose scope to register with".to_string()))?;
                if let Some(resource) = resource {
                    log::trace!("registered {:?} resource #{}", hint, capability.len());
                    capability.add(resource);
                }
            }

            Opcode::TakeDisposeCapability => {
                let capability = frame
                    .dispose_scopes
                    .last_mut()
                    .ok_or_else(|| VmError::RuntimeError("No dispose scope to drain".to_string()))?;
                let resources: Vec<Value> = capability
                    .take()
                    .into_iter()
                    .map(|r| Value::Resource(Arc::new(r)))
                    .collect();
                let count = i32::try_from(resources.len())
                    .map_err(|_| VmError::RuntimeError("Too many resources in one scope".to_string()))?;
                frame.stack.push(Value::list(resources))?;
                frame.stack.push(Value::Int(count))?;
            }

            Opcode::ResourceField => {
                let byte = Self::read_u8(code, ip)?;
                let field = ResourceFieldKind::from_u8(byte)
                    .ok_or_else(|| VmError::RuntimeError(format!("Invalid resource field {}", byte)))?;
                let Value::Resource(resource) = frame.stack.pop()? else {
                    return Err(VmError::TypeError("RESOURCE_FIELD expects a resource record".to_string()));
                };
                let value = match field {
                    ResourceFieldKind::Value => resource.value.clone(),
                    ResourceFieldKind::Hint => Value::Int(resource.hint as i32),
                    ResourceFieldKind::Method => resource.method.clone().unwrap_or_default(),
                };
                frame.stack.push(value)?;
            }

            Opcode::ChainDisposeError => {
                let unwrap_generator_closing = Self::read_u8(code, ip)? == 1;
                let throwing = frame.stack.pop()?;
                let pending = frame.stack.pop()?;
                let error = frame.stack.pop()?;
                let completion = Completion::from_pending(throwing.is_truthy(), pending, unwrap_generator_closing);
                log::trace!("dispose method threw {} under {:?}", error, completion);
                frame.stack.push(completion.chain(error))?;
            }

            _ => return Err(VmError::InvalidOpcode(opcode.to_u8())),
        }
        Ok(OpcodeResult::Continue)
    }
}
