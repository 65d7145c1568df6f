//! UsingVM Engine
//!
//! A bytecode compiler and virtual machine for explicit resource management:
//! `using` and `await using` declarations, with LIFO disposal, error
//! suppression chains and async disposal.
//!
//! - **Compiler**: builder AST lowering, disposal code generation, the
//!   bytecode format, verifier and disassembler (`compiler` module)
//! - **VM**: values, disposal registration, suspendable interpreter and a
//!   cooperative scheduler for async functions and generators (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use usingvm_engine::{compile_module, Expr, FunctionDecl, FunctionKind, Stmt, Vm};
//!
//! let main = FunctionDecl::new(
//!     "main",
//!     FunctionKind::Normal,
//!     vec![
//!         Stmt::using("res", Expr::call_global("open", vec![])),
//!         Stmt::ret(Expr::Int(42)),
//!     ],
//! );
//! let module = compile_module("demo", &[main]).unwrap();
//!
//! let mut vm = Vm::new();
//! vm.register_native("open", |_, _| Ok(make_resource()));
//! let module = vm.load(module).unwrap();
//! let status = vm.run(&module, "main", vec![]).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Compiler module: lowering, code generation and bytecode
pub mod compiler;

/// VM module: interpreter, scheduler and runtime
pub mod vm;

// ============================================================================
// Re-exports from Compiler
// ============================================================================

pub use compiler::bytecode::{
    disassemble, listing, listing_json, verify_module, BytecodeReader, BytecodeWriter, ConstantPool,
    DecodeError, Function, FunctionKind, Instruction, Module, ModuleError, Opcode, ResourceFieldKind,
    UsingHint, VerifyError,
};
pub use compiler::codegen::{BytecodeEmitter, DisposalCompletion, UsingEmitter};
pub use compiler::{compile_function, compile_module, CompileError, CompileResult, Expr, FunctionDecl, Stmt};

// ============================================================================
// Re-exports from VM
// ============================================================================

pub use vm::{
    // Values and object model
    ErrorKind, ErrorObject, IteratorRef, NativeFunction, ObjectRef, Promise, PromiseState, PropertyKey,
    Value, WellKnownSymbol,
    // Disposal
    Completion, DisposableResource, DisposeCapability,
    // VM and execution
    Vm, VmError, VmOptions, VmResult, VmStats,
    // Scheduler
    ResumeMode, TaskId, TaskState, TaskStatus,
};
