//! Compiler: builder AST lowering, code generation and the bytecode format

pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod lower;

pub use error::{CompileError, CompileResult};
pub use lower::{compile_function, compile_module, Expr, FunctionDecl, Stmt};
