//! Statement lowering

use super::ast::{Expr, Stmt};
use super::{emit_control_exit, Control, FunctionLowerer, LoopControl};
use crate::compiler::bytecode::{Opcode, UsingHint};
use crate::compiler::codegen::{
    emit_rethrow_if_closing, ConditionKind, IfEmitter, TryEmitter, TryKind, UsingEmitter, WhileEmitter,
};
use crate::compiler::error::{CompileError, CompileResult};
use rustc_hash::FxHashMap;

/// Which way a jump leaves its target loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    Break,
    Continue,
}

impl<'m> FunctionLowerer<'m> {
    /// Lower a block in a fresh lexical scope
    ///
    /// A block that declares disposables directly gets the disposal wrapper.
    pub(super) fn lower_block(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        self.scopes.push(FxHashMap::default());
        let disposable = stmts.iter().any(|s| matches!(s, Stmt::Using { .. }));

        if disposable {
            let mut using = UsingEmitter::new();
            using.prepare_for_disposable_scope_body(&mut self.bce)?;
            self.controls.push(Control::Disposable(using));
            for stmt in stmts {
                self.lower_stmt(stmt)?;
            }
            match self.controls.pop() {
                Some(Control::Disposable(mut using)) => using.emit_end(&mut self.bce)?,
                _ => return Err(CompileError::internal("disposable scope lost its emitter")),
            }
        } else {
            for stmt in stmts {
                self.lower_stmt(stmt)?;
            }
        }

        self.scopes.pop();
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                self.bce.emit(Opcode::Pop)
            }
            Stmt::Let { name, init } => {
                self.lower_expr(init)?;
                let slot = self.declare(name)?;
                self.bce.emit_store_local(slot)
            }
            Stmt::Using { name, hint, init } => self.lower_using(name, *hint, init),
            Stmt::Block(stmts) => self.lower_block(stmts),
            Stmt::If { cond, then, otherwise } => self.lower_if(cond, then, otherwise),
            Stmt::While { label, cond, body } => self.lower_while(label.as_deref(), cond, body),
            Stmt::ForOf {
                label,
                binding,
                using,
                iterable,
                body,
            } => self.lower_for_of(label.as_deref(), binding, *using, iterable, body),
            Stmt::TryCatch { body, param, handler } => self.lower_try_catch(body, param.as_deref(), handler),
            Stmt::Throw(expr) => {
                self.lower_expr(expr)?;
                self.bce.emit(Opcode::Throw)
            }
            Stmt::Return(expr) => self.lower_return(expr.as_ref()),
            Stmt::Break(label) => self.lower_jump(JumpKind::Break, label.as_deref()),
            Stmt::Continue(label) => self.lower_jump(JumpKind::Continue, label.as_deref()),
        }
    }

    fn lower_using(&mut self, name: &str, hint: UsingHint, init: &Expr) -> CompileResult<()> {
        self.lower_expr(init)?;
        match self.controls.last_mut() {
            Some(Control::Disposable(using)) => using.prepare_for_assignment(&mut self.bce, hint)?,
            _ => return Err(CompileError::internal("using declaration outside its disposable scope")),
        }
        let slot = self.declare(name)?;
        self.bce.emit_store_local(slot)
    }

    fn lower_if(&mut self, cond: &Expr, then: &[Stmt], otherwise: &[Stmt]) -> CompileResult<()> {
        self.lower_expr(cond)?;
        let mut ife = IfEmitter::new();
        if otherwise.is_empty() {
            ife.emit_then(&mut self.bce, ConditionKind::Positive)?;
            self.lower_block(then)?;
        } else {
            ife.emit_then_else(&mut self.bce, ConditionKind::Positive)?;
            self.lower_block(then)?;
            ife.emit_else(&mut self.bce)?;
            self.lower_block(otherwise)?;
        }
        ife.emit_end(&mut self.bce)
    }

    fn lower_while(&mut self, label: Option<&str>, cond: &Expr, body: &[Stmt]) -> CompileResult<()> {
        let exit_depth = self.bce.stack_depth();
        let mut we = WhileEmitter::new();
        we.emit_cond(&mut self.bce);
        self.lower_expr(cond)?;
        we.emit_body(&mut self.bce)?;

        self.controls.push(Control::Loop(LoopControl {
            label: label.map(str::to_string),
            for_of: false,
            continue_target: we.continue_target(),
            breaks: Vec::new(),
            exit_depth,
        }));
        self.lower_block(body)?;
        let control = self.controls.pop();

        we.emit_end(&mut self.bce)?;
        self.patch_breaks(control)
    }

    /// ```text
    ///   <iterable> GET_ITERATOR          ; [ITER]
    /// head:
    ///   ITER_NEXT JMP_IF_TRUE done       ; [ITER VALUE]
    ///   STORE_LOCAL binding              ; [ITER]
    ///   TRY_START catch=C
    ///   [PUSH_DISPOSE_SCOPE, register binding]
    ///   <body>
    ///   [dispose loop: Normal, throw if exception, POP_DISPOSE_SCOPE]
    ///   END_TRY JMP next
    /// C:                                 ; [ITER EXC]
    ///   [dispose loop: Throw, POP, POP_DISPOSE_SCOPE]
    ///   SWAP ITER_CLOSE(throw) THROW
    /// next:
    ///   JMP head
    /// done:                              ; [ITER VALUE]
    ///   POP POP
    /// ```
    fn lower_for_of(
        &mut self,
        label: Option<&str>,
        binding: &str,
        using: Option<UsingHint>,
        iterable: &Expr,
        body: &[Stmt],
    ) -> CompileResult<()> {
        let exit_depth = self.bce.stack_depth();
        self.lower_expr(iterable)?;
        self.bce.emit(Opcode::GetIterator)?;

        let head = self.bce.offset();
        self.bce.emit(Opcode::IterNext)?;
        let done = self.bce.emit_jump(Opcode::JmpIfTrue)?;

        self.scopes.push(FxHashMap::default());
        let slot = self.declare(binding)?;
        self.bce.emit_store_local(slot)?;

        self.controls.push(Control::Loop(LoopControl {
            label: label.map(str::to_string),
            for_of: true,
            continue_target: head,
            breaks: Vec::new(),
            exit_depth,
        }));

        let mut te = TryEmitter::new(TryKind::TryCatch);
        te.emit_try(&mut self.bce)?;
        let iteration_using = match using {
            Some(hint) => {
                let mut emitter = UsingEmitter::new();
                self.bce.enter_disposable_scope()?;
                self.bce.emit_load_local(slot)?;
                emitter.prepare_for_assignment(&mut self.bce, hint)?;
                self.bce.emit(Opcode::Pop)?;
                Some(emitter)
            }
            None => None,
        };

        self.controls.push(Control::ForOfIteration(iteration_using));
        self.lower_block(body)?;
        let mut iteration_using = match self.controls.pop() {
            Some(Control::ForOfIteration(using)) => using,
            _ => return Err(CompileError::internal("for-of iteration lost its region")),
        };

        if let Some(emitter) = iteration_using.as_mut() {
            emitter.prepare_for_for_of_loop_iteration(&mut self.bce)?;
            self.bce.emit_leave_disposable_scope()?;
        }

        te.emit_catch(&mut self.bce)?; // [ITER EXC]
        if let Some(emitter) = iteration_using.as_mut() {
            emitter.prepare_for_for_of_iterator_close_on_throw(&mut self.bce)?;
            self.bce.exit_disposable_scope()?;
        }
        self.bce.emit(Opcode::Swap)?;
        self.bce.emit_u8(Opcode::IterClose, 1)?;
        self.bce.emit(Opcode::Throw)?;
        te.emit_end(&mut self.bce)?;

        self.bce.emit_jump_to(Opcode::Jmp, head)?;
        let control = self.controls.pop();
        self.scopes.pop();

        self.bce.patch_to_here(done)?;
        self.bce.set_stack_depth(exit_depth + 2);
        self.bce.emit_pop_n(2)?;
        self.patch_breaks(control)
    }

    fn lower_try_catch(&mut self, body: &[Stmt], param: Option<&str>, handler: &[Stmt]) -> CompileResult<()> {
        let mut te = TryEmitter::new(TryKind::TryCatch);
        te.emit_try(&mut self.bce)?;
        self.controls.push(Control::TryCatch);
        self.lower_block(body)?;
        self.controls.pop();

        te.emit_catch(&mut self.bce)?; // [EXC]
        if self.bce.kind().is_generator() {
            emit_rethrow_if_closing(&mut self.bce)?;
        }
        self.scopes.push(FxHashMap::default());
        match param {
            Some(name) => {
                let slot = self.declare(name)?;
                self.bce.emit_store_local(slot)?;
            }
            None => self.bce.emit(Opcode::Pop)?,
        }
        self.lower_block(handler)?;
        self.scopes.pop();
        te.emit_end(&mut self.bce)
    }

    fn lower_return(&mut self, expr: Option<&Expr>) -> CompileResult<()> {
        match expr {
            Some(expr) => self.lower_expr(expr)?,
            None => self.bce.emit(Opcode::ConstUndefined)?,
        }
        self.bce.emit(Opcode::SetRval)?;

        let depth = self.bce.stack_depth();
        for control in self.controls.iter_mut().rev() {
            emit_control_exit(&mut self.bce, control)?;
        }
        self.bce.emit(Opcode::RetRval)?;
        self.bce.set_stack_depth(depth);
        Ok(())
    }

    fn lower_jump(&mut self, kind: JumpKind, label: Option<&str>) -> CompileResult<()> {
        let target = self
            .controls
            .iter()
            .rposition(|c| match c {
                Control::Loop(l) => label.is_none() || l.label.as_deref() == label,
                _ => false,
            })
            .ok_or_else(|| match (label, kind) {
                (Some(label), _) => CompileError::UndefinedLabel {
                    label: label.to_string(),
                },
                (None, JumpKind::Break) => CompileError::InvalidBreak,
                (None, JumpKind::Continue) => CompileError::InvalidContinue,
            })?;

        let depth = self.bce.stack_depth();
        let (inner, outer) = self.controls.split_at_mut(target + 1);
        for control in outer.iter_mut().rev() {
            emit_control_exit(&mut self.bce, control)?;
        }

        let Some(Control::Loop(target)) = inner.last_mut() else {
            return Err(CompileError::internal("jump target is not a loop"));
        };
        match kind {
            JumpKind::Continue => self.bce.emit_jump_to(Opcode::Jmp, target.continue_target)?,
            JumpKind::Break => {
                if target.for_of {
                    self.bce.emit_u8(Opcode::IterClose, 0)?;
                }
                if self.bce.stack_depth() != target.exit_depth {
                    return Err(CompileError::internal("break leaves values on the stack"));
                }
                let patch = self.bce.emit_jump(Opcode::Jmp)?;
                target.breaks.push(patch);
            }
        }

        self.bce.set_stack_depth(depth);
        Ok(())
    }

    fn patch_breaks(&mut self, control: Option<Control>) -> CompileResult<()> {
        match control {
            Some(Control::Loop(l)) => {
                for patch in l.breaks {
                    self.bce.patch_to_here(patch)?;
                }
                Ok(())
            }
            _ => Err(CompileError::internal("loop region lost")),
        }
    }
}
