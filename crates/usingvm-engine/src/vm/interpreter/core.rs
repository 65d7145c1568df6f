//! Task interpreter that can suspend and resume
//!
//! The interpreter executes one task until it completes, throws, suspends or
//! fails. All execution state (instruction pointer, operand stack, locals,
//! handlers and dispose capabilities) lives in the task's frame, so a task
//! suspended at `AWAIT` or `YIELD` continues exactly where it stopped.

use super::execution::{ExecutionResult, OpcodeResult};
use crate::compiler::bytecode::Opcode;
use crate::vm::frame::Frame;
use crate::vm::scheduler::{ResumeMode, Task};
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Where a thrown exception ended up
enum Unwind {
    /// Routed to the handler at this offset
    Handler(usize),
    /// Escaped the function
    Escaped(ExecutionResult),
}

/// Task interpreter
///
/// Holds references to VM-wide state; the task owns everything else.
pub struct Interpreter<'a> {
    /// Host globals
    pub(in crate::vm::interpreter) globals: &'a FxHashMap<String, Value>,

    /// Instructions executed so far across the VM
    steps: &'a mut u64,

    /// Instruction limit, if any
    step_budget: Option<u64>,
}

impl<'a> Interpreter<'a> {
    /// Create a new task interpreter
    pub fn new(globals: &'a FxHashMap<String, Value>, steps: &'a mut u64, step_budget: Option<u64>) -> Self {
        Self {
            globals,
            steps,
            step_budget,
        }
    }

    /// Run `task` until it completes, throws, suspends or fails
    pub fn run(&mut self, task: &Task, mode: ResumeMode) -> ExecutionResult {
        let mut guard = task.frame().lock();
        let frame: &mut Frame = &mut guard;
        let module = Arc::clone(&frame.module);
        let Some(function) = module.functions.get(frame.function_index) else {
            return ExecutionResult::failed(VmError::FunctionNotFound(format!(
                "#{}",
                frame.function_index
            )));
        };
        let code: &[u8] = &function.code;
        let mut ip = frame.ip;

        log::trace!("{} ({}) resumes at {} with {:?}", task.id(), task.name(), ip, mode);
        match mode {
            ResumeMode::Start => {}
            ResumeMode::Next(value) => {
                if let Err(e) = frame.stack.push(value) {
                    return ExecutionResult::failed(e);
                }
            }
            ResumeMode::Throw(exception) => match Self::unwind(frame, exception) {
                Unwind::Handler(target) => ip = target,
                Unwind::Escaped(result) => return result,
            },
            ResumeMode::Return(value) => {
                frame.rval = value;
                match Self::unwind(frame, Value::GeneratorClosing) {
                    Unwind::Handler(target) => ip = target,
                    Unwind::Escaped(result) => return result,
                }
            }
        }

        loop {
            if let Some(budget) = self.step_budget {
                if *self.steps >= budget {
                    frame.ip = ip;
                    return ExecutionResult::failed(VmError::StepBudgetExceeded(budget));
                }
            }
            *self.steps += 1;

            let offset = ip;
            let byte = match Self::read_u8(code, &mut ip) {
                Ok(b) => b,
                Err(e) => return ExecutionResult::failed(e),
            };
            let Some(opcode) = Opcode::from_u8(byte) else {
                return ExecutionResult::failed(VmError::InvalidOpcode(byte));
            };
            log::trace!("{:>5}: {}", offset, opcode.name());

            let result = match opcode {
                Opcode::Nop
                | Opcode::Pop
                | Opcode::PopN
                | Opcode::Dup
                | Opcode::Dup2
                | Opcode::DupAt
                | Opcode::Swap
                | Opcode::Pick
                | Opcode::Unpick => self.exec_stack_ops(frame, &mut ip, code, opcode),

                Opcode::ConstUndefined
                | Opcode::ConstNull
                | Opcode::ConstTrue
                | Opcode::ConstFalse
                | Opcode::ConstI32
                | Opcode::ConstStr => self.exec_constant_ops(frame, &mut ip, code, opcode),

                Opcode::LoadLocal
                | Opcode::StoreLocal
                | Opcode::LoadGlobal
                | Opcode::GetRval
                | Opcode::SetRval => self.exec_variable_ops(frame, &mut ip, code, opcode),

                Opcode::Not | Opcode::And | Opcode::Ige | Opcode::IsNullish | Opcode::IsClosing => {
                    self.exec_comparison_ops(frame, opcode)
                }

                Opcode::Inc | Opcode::Dec => self.exec_arithmetic_ops(frame, opcode),

                Opcode::Jmp | Opcode::JmpIfFalse | Opcode::JmpIfTrue | Opcode::RetRval => {
                    self.exec_control_flow_ops(frame, &mut ip, code, opcode)
                }

                Opcode::Call => self.exec_call_ops(frame, &mut ip, code),

                Opcode::GetElem | Opcode::GetIterator | Opcode::IterNext | Opcode::IterClose => {
                    self.exec_iteration_ops(frame, &mut ip, code, opcode)
                }

                Opcode::PushDisposeScope
                | Opcode::PopDisposeScope
                | Opcode::AddDisposable
                | Opcode::TakeDisposeCapability
                | Opcode::ResourceField
                | Opcode::ChainDisposeError => self.exec_disposal_ops(frame, &mut ip, code, opcode),

                Opcode::Await | Opcode::Yield => self.exec_suspension_ops(frame, opcode),

                Opcode::Throw | Opcode::TryStart | Opcode::EndTry => {
                    self.exec_exception_ops(frame, &mut ip, code, opcode)
                }
            };

            match result {
                Ok(OpcodeResult::Continue) => {}
                Ok(OpcodeResult::Throw(exception)) => {
                    log::trace!("{:>5}: throw {}", offset, exception);
                    match Self::unwind(frame, exception) {
                        Unwind::Handler(target) => ip = target,
                        Unwind::Escaped(result) => {
                            frame.ip = ip;
                            return result;
                        }
                    }
                }
                Ok(OpcodeResult::Suspend(reason)) => {
                    frame.ip = ip;
                    return ExecutionResult::suspended(reason);
                }
                Ok(OpcodeResult::Return(value)) => {
                    frame.ip = ip;
                    return ExecutionResult::completed(value);
                }
                Err(e) => {
                    frame.ip = offset;
                    return ExecutionResult::failed(e);
                }
            }
        }
    }

    /// Route `exception` to the innermost handler
    ///
    /// A catch block is entered with `[EXC]` on the stack, a finally block
    /// with `[EXC true]`, both above the depth recorded by `TRY_START`. The
    /// generator-closing signal escaping the function completes it with the
    /// frame's return value.
    fn unwind(frame: &mut Frame, exception: Value) -> Unwind {
        while let Some(handler) = frame.handlers.pop() {
            frame.stack.truncate(handler.stack_size);
            if let Some(target) = handler.catch_offset {
                return match frame.stack.push(exception) {
                    Ok(()) => Unwind::Handler(target),
                    Err(e) => Unwind::Escaped(ExecutionResult::failed(e)),
                };
            }
            if let Some(target) = handler.finally_offset {
                let pushed = frame
                    .stack
                    .push(exception)
                    .and_then(|()| frame.stack.push(Value::Bool(true)));
                return match pushed {
                    Ok(()) => Unwind::Handler(target),
                    Err(e) => Unwind::Escaped(ExecutionResult::failed(e)),
                };
            }
        }

        match exception {
            Value::GeneratorClosing => Unwind::Escaped(ExecutionResult::completed(frame.rval.clone())),
            exception => Unwind::Escaped(ExecutionResult::Threw(exception)),
        }
    }

    // ===== Operand Decoding =====

    #[inline]
    pub(in crate::vm::interpreter) fn read_u8(code: &[u8], ip: &mut usize) -> VmResult<u8> {
        let value = *code.get(*ip).ok_or(VmError::UnexpectedEnd(*ip))?;
        *ip += 1;
        Ok(value)
    }

    #[inline]
    pub(in crate::vm::interpreter) fn read_u16(code: &[u8], ip: &mut usize) -> VmResult<u16> {
        let bytes = code.get(*ip..*ip + 2).ok_or(VmError::UnexpectedEnd(*ip))?;
        let value = u16::from_le_bytes([bytes[0], bytes[1]]);
        *ip += 2;
        Ok(value)
    }

    #[inline]
    pub(in crate::vm::interpreter) fn read_u32(code: &[u8], ip: &mut usize) -> VmResult<u32> {
        let bytes = code.get(*ip..*ip + 4).ok_or(VmError::UnexpectedEnd(*ip))?;
        let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        *ip += 4;
        Ok(value)
    }

    #[inline]
    pub(in crate::vm::interpreter) fn read_i32(code: &[u8], ip: &mut usize) -> VmResult<i32> {
        let bytes = code.get(*ip..*ip + 4).ok_or(VmError::UnexpectedEnd(*ip))?;
        let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        *ip += 4;
        Ok(value)
    }

    /// Resolve a jump offset relative to `ip` (the end of the instruction)
    pub(in crate::vm::interpreter) fn jump_target(code: &[u8], ip: usize, offset: i32) -> VmResult<usize> {
        let target = ip as i64 + offset as i64;
        if target < 0 || target > code.len() as i64 {
            return Err(VmError::RuntimeError(format!(
                "Jump target {} out of bounds at offset {}",
                target, ip
            )));
        }
        Ok(target as usize)
    }
}
