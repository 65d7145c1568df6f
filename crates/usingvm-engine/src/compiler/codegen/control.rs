//! Structured control-flow emitters
//!
//! Small state machines that emit the jumps of `if`, `while` and
//! `try`/`catch`/`finally` shapes and check that every path leaves the
//! operand stack at the depth it started with.

use super::emitter::{BytecodeEmitter, JumpPatch, TryStartPatch};
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::{CompileError, CompileResult};

// ============================================================================
// IfEmitter
// ============================================================================

/// How the condition on top of the stack selects the `then` branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// `then` runs when the condition is truthy
    Positive,
    /// `then` runs when the condition is falsy
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IfState {
    Start,
    Then,
    ThenElse,
    Else,
    End,
}

/// Emits `if (cond) { then } [else { else }]`
///
/// ```text
///   [cond]            emit_then / emit_then_else
///   JMP_IF_FALSE else
///   <then>            emit_else
///   JMP end
/// else:
///   <else>            emit_end
/// end:
/// ```
pub struct IfEmitter {
    state: IfState,
    jump_around_then: Option<JumpPatch>,
    jump_to_end: Option<JumpPatch>,
    depth_at_then: u32,
}

impl Default for IfEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl IfEmitter {
    /// Create an emitter; the condition is expected on the stack
    pub fn new() -> Self {
        Self {
            state: IfState::Start,
            jump_around_then: None,
            jump_to_end: None,
            depth_at_then: 0,
        }
    }

    fn emit_branch(&mut self, bce: &mut BytecodeEmitter<'_>, kind: ConditionKind) -> CompileResult<()> {
        let op = match kind {
            ConditionKind::Positive => Opcode::JmpIfFalse,
            ConditionKind::Negative => Opcode::JmpIfTrue,
        };
        self.jump_around_then = Some(bce.emit_jump(op)?);
        self.depth_at_then = bce.stack_depth();
        Ok(())
    }

    /// Start a `then` branch with no `else`
    pub fn emit_then(&mut self, bce: &mut BytecodeEmitter<'_>, kind: ConditionKind) -> CompileResult<()> {
        debug_assert_eq!(self.state, IfState::Start);
        self.emit_branch(bce, kind)?;
        self.state = IfState::Then;
        Ok(())
    }

    /// Start a `then` branch that is followed by an `else`
    pub fn emit_then_else(
        &mut self,
        bce: &mut BytecodeEmitter<'_>,
        kind: ConditionKind,
    ) -> CompileResult<()> {
        debug_assert_eq!(self.state, IfState::Start);
        self.emit_branch(bce, kind)?;
        self.state = IfState::ThenElse;
        Ok(())
    }

    /// Close `then` and start `else`
    pub fn emit_else(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert_eq!(self.state, IfState::ThenElse);
        self.check_depth(bce)?;
        self.jump_to_end = Some(bce.emit_jump(Opcode::Jmp)?);
        if let Some(patch) = self.jump_around_then.take() {
            bce.patch_to_here(patch)?;
        }
        bce.set_stack_depth(self.depth_at_then);
        self.state = IfState::Else;
        Ok(())
    }

    /// Close the statement
    pub fn emit_end(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert!(matches!(self.state, IfState::Then | IfState::Else));
        self.check_depth(bce)?;
        for patch in [self.jump_around_then.take(), self.jump_to_end.take()]
            .into_iter()
            .flatten()
        {
            bce.patch_to_here(patch)?;
        }
        self.state = IfState::End;
        Ok(())
    }

    fn check_depth(&self, bce: &BytecodeEmitter<'_>) -> CompileResult<()> {
        if bce.stack_depth() != self.depth_at_then {
            return Err(CompileError::internal(format!(
                "unbalanced if branch: depth {} != {}",
                bce.stack_depth(),
                self.depth_at_then
            )));
        }
        Ok(())
    }
}

// ============================================================================
// WhileEmitter
// ============================================================================

/// Emits `while (cond) { body }`
///
/// ```text
/// head:
///   <cond>            emit_cond
///   JMP_IF_FALSE end  emit_body
///   <body>
///   JMP head          emit_end
/// end:
/// ```
pub struct WhileEmitter {
    head: usize,
    exit: Option<JumpPatch>,
    depth: u32,
}

impl Default for WhileEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl WhileEmitter {
    /// Create an emitter
    pub fn new() -> Self {
        Self {
            head: 0,
            exit: None,
            depth: 0,
        }
    }

    /// Bind the loop head; the condition is emitted next
    pub fn emit_cond(&mut self, bce: &mut BytecodeEmitter<'_>) {
        self.head = bce.offset();
        self.depth = bce.stack_depth();
    }

    /// Consume the condition and start the body
    pub fn emit_body(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        self.exit = Some(bce.emit_jump(Opcode::JmpIfFalse)?);
        Ok(())
    }

    /// Target of `continue`
    pub fn continue_target(&self) -> usize {
        self.head
    }

    /// Jump back to the head and bind the exit
    pub fn emit_end(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        if bce.stack_depth() != self.depth {
            return Err(CompileError::internal("unbalanced loop body"));
        }
        bce.emit_jump_to(Opcode::Jmp, self.head)?;
        if let Some(exit) = self.exit.take() {
            bce.patch_to_here(exit)?;
        }
        Ok(())
    }
}

// ============================================================================
// TryEmitter
// ============================================================================

/// Shape of a protected region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryKind {
    /// `try { } catch { }`
    TryCatch,
    /// `try { } finally { }`
    TryFinally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TryState {
    Start,
    Try,
    Catch,
    Finally,
    End,
}

/// Emits protected regions
///
/// The catch block starts with `EXC` on the stack. The finally block starts
/// with `EXC THROWING`; normal completion of the `try` enters it with
/// `undefined false`, and `emit_end` rethrows `EXC` when `THROWING` is set.
pub struct TryEmitter {
    kind: TryKind,
    state: TryState,
    handlers: Option<TryStartPatch>,
    jump_over_catch: Option<JumpPatch>,
    depth: u32,
}

impl TryEmitter {
    /// Create an emitter of the given shape
    pub fn new(kind: TryKind) -> Self {
        Self {
            kind,
            state: TryState::Start,
            handlers: None,
            jump_over_catch: None,
            depth: 0,
        }
    }

    /// Install the handler and open the protected region
    pub fn emit_try(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert_eq!(self.state, TryState::Start);
        self.depth = bce.stack_depth();
        self.handlers = Some(bce.emit_try_start()?);
        self.state = TryState::Try;
        Ok(())
    }

    fn check_depth(&self, bce: &BytecodeEmitter<'_>, what: &str) -> CompileResult<()> {
        if bce.stack_depth() != self.depth {
            return Err(CompileError::internal(format!(
                "unbalanced {}: depth {} != {}",
                what,
                bce.stack_depth(),
                self.depth
            )));
        }
        Ok(())
    }

    /// Close the protected region and start the catch block
    pub fn emit_catch(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert_eq!(self.state, TryState::Try);
        debug_assert_eq!(self.kind, TryKind::TryCatch);
        self.check_depth(bce, "try block")?;
        bce.emit(Opcode::EndTry)?;
        self.jump_over_catch = Some(bce.emit_jump(Opcode::Jmp)?);

        let handlers = self
            .handlers
            .ok_or_else(|| CompileError::internal("catch without try"))?;
        bce.patch_to_here(handlers.catch)?;
        bce.set_stack_depth(self.depth + 1);
        self.state = TryState::Catch;
        Ok(())
    }

    /// Close the protected region and start the finally block
    pub fn emit_finally(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        debug_assert_eq!(self.state, TryState::Try);
        debug_assert_eq!(self.kind, TryKind::TryFinally);
        self.check_depth(bce, "try block")?;
        bce.emit(Opcode::EndTry)?;
        bce.emit(Opcode::ConstUndefined)?;
        bce.emit(Opcode::ConstFalse)?;

        let handlers = self
            .handlers
            .ok_or_else(|| CompileError::internal("finally without try"))?;
        bce.patch_to_here(handlers.finally)?;
        bce.set_stack_depth(self.depth + 2);
        self.state = TryState::Finally;
        Ok(())
    }

    /// Close the statement
    ///
    /// For a catch block the stack must be back at the entry depth, or the
    /// block must have ended in an unconditional transfer. For a finally
    /// block `EXC THROWING` must still be on top.
    pub fn emit_end(&mut self, bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
        match self.state {
            TryState::Catch => {
                if let Some(patch) = self.jump_over_catch.take() {
                    bce.patch_to_here(patch)?;
                }
                bce.set_stack_depth(self.depth);
            }
            TryState::Finally => {
                if bce.stack_depth() != self.depth + 2 {
                    return Err(CompileError::internal("finally block lost its completion"));
                }
                emit_throw_if_exception(bce)?;
            }
            _ => return Err(CompileError::internal("try statement closed out of order")),
        }
        self.state = TryState::End;
        Ok(())
    }

    /// Depth of the stack when the region was entered
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// `[EXC THROWING] -> []`, throwing `EXC` when `THROWING` is set
pub fn emit_throw_if_exception(bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
    let mut ife = IfEmitter::new();
    ife.emit_then(bce, ConditionKind::Positive)?;
    let depth = bce.stack_depth();
    bce.emit(Opcode::Throw)?;
    bce.set_stack_depth(depth);
    ife.emit_end(bce)?;
    bce.emit(Opcode::Pop)
}

/// `[EXC] -> [EXC]`, rethrowing `EXC` if it is the generator-closing signal
///
/// Catch clauses in generators start with this so `return()` only runs
/// finally code on its way out.
pub fn emit_rethrow_if_closing(bce: &mut BytecodeEmitter<'_>) -> CompileResult<()> {
    bce.emit(Opcode::Dup)?;
    bce.emit(Opcode::IsClosing)?;
    let mut ife = IfEmitter::new();
    ife.emit_then(bce, ConditionKind::Positive)?;
    let depth = bce.stack_depth();
    bce.emit(Opcode::Throw)?;
    bce.set_stack_depth(depth);
    ife.emit_end(bce)
}
