//! Activation records

use super::disposal::DisposeCapability;
use super::stack::Stack;
use super::value::Value;
use crate::compiler::bytecode::{Function, Module};
use std::sync::Arc;

/// Exception handler installed by `TRY_START`
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// Absolute offset of the catch block
    pub catch_offset: Option<usize>,
    /// Absolute offset of the finally block
    pub finally_offset: Option<usize>,
    /// Operand stack depth when the handler was installed
    pub stack_size: usize,
}

/// Execution state of one function activation
///
/// Tasks run a single frame; the frame survives suspension so execution
/// resumes at `ip` with its stack, locals and handlers intact.
#[derive(Debug)]
pub struct Frame {
    /// Module holding the function
    pub module: Arc<Module>,
    /// Index of the function in the module
    pub function_index: usize,
    /// Next instruction
    pub ip: usize,
    /// Operand stack
    pub stack: Stack,
    /// Local slots (parameters first)
    pub locals: Vec<Value>,
    /// Return-value slot
    pub rval: Value,
    /// Installed exception handlers, innermost last
    pub handlers: Vec<ExceptionHandler>,
    /// Dispose capabilities of the entered disposable scopes, innermost last
    pub dispose_scopes: Vec<DisposeCapability>,
}

impl Frame {
    /// Create a frame for `module.functions[function_index]` with `args`
    /// bound to the parameter slots; extra arguments are dropped
    pub fn new(module: Arc<Module>, function_index: usize, args: Vec<Value>, max_stack_size: usize) -> Self {
        let (param_count, local_count) = module
            .functions
            .get(function_index)
            .map_or((0, 0), |f| (f.param_count, f.local_count));
        let mut locals = args;
        locals.truncate(param_count);
        locals.resize(local_count.max(param_count), Value::Undefined);
        Self {
            module,
            function_index,
            ip: 0,
            stack: Stack::with_max_size(max_stack_size),
            locals,
            rval: Value::Undefined,
            handlers: Vec::new(),
            dispose_scopes: Vec::new(),
        }
    }

    /// The executing function
    pub fn function(&self) -> &Function {
        &self.module.functions[self.function_index]
    }
}
