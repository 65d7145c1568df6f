//! Expression lowering

use super::ast::Expr;
use super::FunctionLowerer;
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::{CompileError, CompileResult};

impl<'m> FunctionLowerer<'m> {
    /// Lower an expression, leaving its value on the stack
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::Undefined => self.bce.emit(Opcode::ConstUndefined),
            Expr::Null => self.bce.emit(Opcode::ConstNull),
            Expr::Bool(true) => self.bce.emit(Opcode::ConstTrue),
            Expr::Bool(false) => self.bce.emit(Opcode::ConstFalse),
            Expr::Int(value) => self.bce.emit_const_i32(*value),
            Expr::Str(value) => self.bce.emit_const_str(value),
            Expr::Local(name) => {
                let slot = self.lookup(name)?;
                self.bce.emit_load_local(slot)
            }
            Expr::Global(name) => self.bce.emit_load_global(name),
            Expr::Call { callee, args } => {
                let argc = u8::try_from(args.len()).map_err(|_| CompileError::TooManyArguments)?;
                self.lower_expr(callee)?;
                self.bce.emit(Opcode::ConstUndefined)?;
                for arg in args {
                    self.lower_expr(arg)?;
                }
                self.bce.emit_u8(Opcode::Call, argc)
            }
            Expr::Await(operand) => {
                self.lower_expr(operand)?;
                self.bce.emit_await()
            }
            Expr::Yield(operand) => {
                self.lower_expr(operand)?;
                self.bce.emit_yield()
            }
        }
    }
}
