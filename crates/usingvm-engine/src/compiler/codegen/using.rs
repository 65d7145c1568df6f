//! Code generation for `using` / `await using` scopes
//!
//! A scope that declares disposables is wrapped like this:
//!
//! ```text
//!   PUSH_DISPOSE_SCOPE
//!   TRY_START finally=F
//!   <body>                         ; AddDisposable per declaration
//!   <dispose loop: Normal>         ; [EXC THROWING]
//!   <throw if exception>
//!   END_TRY
//!   CONST_UNDEFINED CONST_FALSE
//! F:                               ; [EXC THROWING]
//!   SWAP
//!   <dispose loop: Throw>          ; [THROWING EXC' THROWING']
//!   POP SWAP                       ; [EXC' THROWING]
//!   POP_DISPOSE_SCOPE
//!   <throw if exception>
//! ```
//!
//! Every exit from the scope therefore runs exactly one pass over the
//! scope's resources: the explicit Normal pass at the end of the body (or
//! before a `break`/`continue`/`return`), or the Throw pass in the finally
//! when the body threw. Each pass drains the capability, so the finally pass
//! that follows a normal exit finds nothing left to dispose.

use super::control::{
    emit_throw_if_exception, ConditionKind, IfEmitter, TryEmitter, TryKind, WhileEmitter,
};
use super::emitter::BytecodeEmitter;
use crate::compiler::bytecode::{Opcode, ResourceFieldKind, UsingHint};
use crate::compiler::error::{CompileError, CompileResult};

/// Completion a disposal pass is seeded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposalCompletion {
    /// No pending exception; the stack holds nothing for the pass
    Normal,
    /// A pending exception is on top of the stack
    Throw,
}

/// Frame slots holding the state of a disposal pass
#[derive(Debug, Clone, Copy)]
struct PassSlots {
    throwing: u16,
    exception: u16,
    resources: u16,
    index: u16,
    resource: u16,
    needs_await: u16,
    has_awaited: u16,
    rval: u16,
}

impl PassSlots {
    fn alloc(bce: &mut BytecodeEmitter<'_>) -> CompileResult<Self> {
        Ok(Self {
            throwing: bce.alloc_local()?,
            exception: bce.alloc_local()?,
            resources: bce.alloc_local()?,
            index: bce.alloc_local()?,
            resource: bce.alloc_local()?,
            needs_await: bce.alloc_local()?,
            has_awaited: bce.alloc_local()?,
            rval: bce.alloc_local()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UsingState {
    Start,
    Body,
    End,
}

/// Emitter for one disposable scope
pub struct UsingEmitter {
    has_await_using: bool,
    state: UsingState,
    try_emitter: Option<TryEmitter>,
    slots: Option<PassSlots>,
}

impl Default for UsingEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl UsingEmitter {
    /// Create an emitter for a scope that has disposables
    pub fn new() -> Self {
        Self {
            has_await_using: false,
            state: UsingState::Start,
            try_emitter: None,
            slots: None,
        }
    }

    /// Whether an `await using` declaration has been registered in this scope
    pub fn has_await_using(&self) -> bool {
        self.has_await_using
    }

    fn slots(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<PassSlots> {
        match self.slots {
            Some(slots) => Ok(slots),
            None => {
                let slots = PassSlots::alloc(bce)?;
                self.slots = Some(slots);
                Ok(slots)
            }
        }
    }

    /// Enter the scope and open the protected region around its body
    pub fn prepare_for_disposable_scope_body(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert_eq!(self.state, UsingState::Start);
        bce.enter_disposable_scope()?;
        let mut te = TryEmitter::new(TryKind::TryFinally);
        te.emit_try(bce)?;
        self.try_emitter = Some(te);
        self.state = UsingState::Body;
        Ok(())
    }

    /// Register the value on top of the stack: `[VAL] -> [VAL]`
    pub fn prepare_for_assignment(&mut self, bce: &mut BytecodeEmitter<'_>, hint: UsingHint) -> CompileResult<()> {
        if hint == UsingHint::Async {
            if !bce.kind().is_async() {
                return Err(CompileError::AwaitUsingOutsideAsync {
                    function: bce.name().to_string(),
                });
            }
            self.has_await_using = true;
        }
        bce.emit(Opcode::Dup)?;
        bce.emit_u8(Opcode::AddDisposable, hint as u8)
    }

    /// End of a for-of iteration body: dispose, then rethrow a disposal error
    pub fn prepare_for_for_of_loop_iteration(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        self.emit_dispose_loop(bce, DisposalCompletion::Normal)?;
        emit_throw_if_exception(bce)
    }

    /// An iteration body threw: `[.. EXC] -> [.. EXC']`, disposing before
    /// the iterator is closed
    pub fn prepare_for_for_of_iterator_close_on_throw(
        &mut self,
        bce: &mut BytecodeEmitter<'_>,
    ) -> CompileResult<()> {
        self.emit_dispose_loop(bce, DisposalCompletion::Throw)?;
        bce.emit(Opcode::Pop)
    }

    /// `break`, `continue` or `return` leaves the scope
    pub fn emit_non_local_jump(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        self.emit_dispose_loop(bce, DisposalCompletion::Normal)?;
        emit_throw_if_exception(bce)
    }

    /// Close the body and emit the finally that disposes on abrupt exit
    pub fn emit_end(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert_eq!(self.state, UsingState::Body);
        let mut te = self
            .try_emitter
            .take()
            .ok_or_else(|| CompileError::internal("disposable scope closed before its body"))?;

        self.emit_dispose_loop(bce, DisposalCompletion::Normal)?;
        emit_throw_if_exception(bce)?;

        te.emit_finally(bce)?; // [EXC THROWING]
        bce.emit(Opcode::Swap)?; // [THROWING EXC]
        self.emit_dispose_loop(bce, DisposalCompletion::Throw)?; // [THROWING EXC' THROWING']
        bce.emit(Opcode::Pop)?;
        bce.emit(Opcode::Swap)?; // [EXC' THROWING]
        bce.exit_disposable_scope()?;
        te.emit_end(bce)?;

        self.state = UsingState::End;
        Ok(())
    }

    /// Emit one disposal pass over the innermost capability
    ///
    /// Stack: `[EXC]` (Throw) or `[]` (Normal) -> `[EXC THROWING]`
    pub fn emit_dispose_loop(
        &mut self,
        bce: &mut BytecodeEmitter<'_>,
        initial: DisposalCompletion,
    ) -> CompileResult<()> {
        let s = self.slots(bce)?;
        let unwrap_generator_closing = initial == DisposalCompletion::Throw && bce.kind().is_generator();
        log::debug!(
            "{}: dispose loop ({:?}, await={}, generator-closing={})",
            bce.name(),
            initial,
            self.has_await_using,
            unwrap_generator_closing
        );

        if self.has_await_using {
            // Await hands its operand through the return-value slot.
            bce.emit(Opcode::GetRval)?;
            bce.emit_store_local(s.rval)?;
            bce.emit(Opcode::ConstFalse)?;
            bce.emit_store_local(s.needs_await)?;
            bce.emit(Opcode::ConstFalse)?;
            bce.emit_store_local(s.has_awaited)?;
        }

        match initial {
            DisposalCompletion::Throw => {
                bce.emit_store_local(s.exception)?;
                bce.emit(Opcode::ConstTrue)?;
            }
            DisposalCompletion::Normal => {
                bce.emit(Opcode::ConstUndefined)?;
                bce.emit_store_local(s.exception)?;
                bce.emit(Opcode::ConstFalse)?;
            }
        }
        bce.emit_store_local(s.throwing)?;

        bce.emit(Opcode::TakeDisposeCapability)?; // [RESOURCES COUNT]
        bce.emit(Opcode::Dec)?;
        bce.emit_store_local(s.index)?;
        bce.emit_store_local(s.resources)?;

        let mut we = WhileEmitter::new();
        we.emit_cond(bce);
        bce.emit_load_local(s.index)?;
        bce.emit_const_i32(0)?;
        bce.emit(Opcode::Ige)?;
        we.emit_body(bce)?;

        bce.emit_load_local(s.resources)?;
        bce.emit_load_local(s.index)?;
        bce.emit(Opcode::GetElem)?;
        bce.emit_store_local(s.resource)?;

        if self.has_await_using {
            self.emit_await_before_sync(bce, s)?;
        }

        self.emit_resource_field(bce, s, ResourceFieldKind::Method)?;
        bce.emit(Opcode::IsNullish)?;
        let mut ife = IfEmitter::new();
        if self.has_await_using {
            ife.emit_then_else(bce, ConditionKind::Negative)?;
            self.emit_call_dispose(bce, s, unwrap_generator_closing)?;
            ife.emit_else(bce)?;
            // Method-less record: `await using x = null`.
            bce.emit(Opcode::ConstTrue)?;
            bce.emit_store_local(s.needs_await)?;
        } else {
            ife.emit_then(bce, ConditionKind::Negative)?;
            self.emit_call_dispose(bce, s, unwrap_generator_closing)?;
        }
        ife.emit_end(bce)?;

        bce.emit_load_local(s.index)?;
        bce.emit(Opcode::Dec)?;
        bce.emit_store_local(s.index)?;
        we.emit_end(bce)?;

        if self.has_await_using {
            bce.emit_load_local(s.needs_await)?;
            bce.emit_load_local(s.has_awaited)?;
            bce.emit(Opcode::Not)?;
            bce.emit(Opcode::And)?;
            let mut ife = IfEmitter::new();
            ife.emit_then(bce, ConditionKind::Positive)?;
            self.emit_await_undefined(bce)?;
            ife.emit_end(bce)?;
        }

        // Drop the drained records.
        bce.emit(Opcode::ConstUndefined)?;
        bce.emit_store_local(s.resources)?;
        bce.emit(Opcode::ConstUndefined)?;
        bce.emit_store_local(s.resource)?;

        bce.emit_load_local(s.exception)?;
        bce.emit_load_local(s.throwing)?;

        if self.has_await_using {
            bce.emit_load_local(s.rval)?;
            bce.emit(Opcode::SetRval)?;
        }
        Ok(())
    }

    fn emit_resource_field(
        &self,
        bce: &mut BytecodeEmitter<'_>,
        s: PassSlots,
        field: ResourceFieldKind,
    ) -> CompileResult<()> {
        bce.emit_load_local(s.resource)?;
        bce.emit_u8(Opcode::ResourceField, field as u8)
    }

    fn emit_await_undefined(&self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        bce.emit(Opcode::ConstUndefined)?;
        bce.emit_await()?;
        bce.emit(Opcode::Pop)
    }

    /// A sync record reached after a method-less async record, with no
    /// await since: suspend once before disposing it.
    fn emit_await_before_sync(&self, bce: &mut BytecodeEmitter<'_>, s: PassSlots) -> CompileResult<()> {
        self.emit_resource_field(bce, s, ResourceFieldKind::Hint)?;
        bce.emit(Opcode::Not)?; // IS-SYNC
        bce.emit_load_local(s.needs_await)?;
        bce.emit(Opcode::And)?;
        bce.emit_load_local(s.has_awaited)?;
        bce.emit(Opcode::Not)?;
        bce.emit(Opcode::And)?;

        let mut ife = IfEmitter::new();
        ife.emit_then(bce, ConditionKind::Positive)?;
        self.emit_await_undefined(bce)?;
        bce.emit(Opcode::ConstFalse)?;
        bce.emit_store_local(s.needs_await)?;
        ife.emit_end(bce)
    }

    /// Call the record's method; a throw is folded into the pass exception
    fn emit_call_dispose(
        &self,
        bce: &mut BytecodeEmitter<'_>,
        s: PassSlots,
        unwrap_generator_closing: bool,
    ) -> CompileResult<()> {
        let mut te = TryEmitter::new(TryKind::TryCatch);
        te.emit_try(bce)?;

        self.emit_resource_field(bce, s, ResourceFieldKind::Method)?;
        self.emit_resource_field(bce, s, ResourceFieldKind::Value)?;
        bce.emit_u8(Opcode::Call, 0)?; // [RESULT]

        if self.has_await_using {
            self.emit_resource_field(bce, s, ResourceFieldKind::Hint)?; // IS-ASYNC
            let mut ife = IfEmitter::new();
            ife.emit_then(bce, ConditionKind::Positive)?;
            bce.emit(Opcode::ConstTrue)?;
            bce.emit_store_local(s.has_awaited)?;
            bce.emit_await()?; // [RESOLVED]
            ife.emit_end(bce)?;
        }
        bce.emit(Opcode::Pop)?;

        te.emit_catch(bce)?; // [EXC2]
        bce.emit_load_local(s.exception)?;
        bce.emit_load_local(s.throwing)?;
        bce.emit_u8(Opcode::ChainDisposeError, unwrap_generator_closing as u8)?;
        bce.emit_store_local(s.exception)?;
        bce.emit(Opcode::ConstTrue)?;
        bce.emit_store_local(s.throwing)?;
        te.emit_end(bce)
    }
}
