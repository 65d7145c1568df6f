//! Function-level bytecode emitter
//!
//! Owns the code buffer of one function while it is being generated and
//! tracks the operand stack depth of every emitted instruction so that
//! structured emitters can assert balanced control flow and the finished
//! function can declare its maximum stack size.

use crate::compiler::bytecode::{BytecodeWriter, ConstantPool, Function, FunctionKind, Opcode};
use crate::compiler::error::{CompileError, CompileResult};

/// Sentinel written into a `TryStart` operand that has no handler
pub const NO_HANDLER: i32 = -1;

/// A forward jump (or handler operand) waiting for its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an unpatched jump leaves a zero offset behind"]
pub struct JumpPatch {
    operand_pos: usize,
    instr_end: usize,
}

/// The two operands of a `TryStart` instruction
#[derive(Debug, Clone, Copy)]
pub struct TryStartPatch {
    /// Catch handler operand
    pub catch: JumpPatch,
    /// Finally handler operand
    pub finally: JumpPatch,
}

/// Bytecode emitter for a single function
pub struct BytecodeEmitter<'m> {
    name: String,
    kind: FunctionKind,
    param_count: usize,
    writer: BytecodeWriter,
    constants: &'m mut ConstantPool,
    stack_depth: u32,
    max_stack_depth: u32,
    local_count: u16,
    disposable_depth: usize,
}

impl<'m> BytecodeEmitter<'m> {
    /// Create an emitter; parameters occupy the first local slots
    pub fn new(
        name: impl Into<String>,
        kind: FunctionKind,
        param_count: usize,
        constants: &'m mut ConstantPool,
    ) -> CompileResult<Self> {
        let local_count = u16::try_from(param_count).map_err(|_| CompileError::TooManyLocals)?;
        Ok(Self {
            name: name.into(),
            kind,
            param_count,
            writer: BytecodeWriter::new(),
            constants,
            stack_depth: 0,
            max_stack_depth: 0,
            local_count,
            disposable_depth: 0,
        })
    }

    /// Name of the function being emitted
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execution flavour of the function being emitted
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Current code offset
    pub fn offset(&self) -> usize {
        self.writer.offset()
    }

    /// Current operand stack depth
    pub fn stack_depth(&self) -> u32 {
        self.stack_depth
    }

    /// Override the tracked stack depth (at labels reached by jumps or handlers)
    pub fn set_stack_depth(&mut self, depth: u32) {
        self.stack_depth = depth;
        self.max_stack_depth = self.max_stack_depth.max(depth);
    }

    /// Number of disposable scopes currently entered
    pub fn disposable_depth(&self) -> usize {
        self.disposable_depth
    }

    fn track(&mut self, op: Opcode, operand: u32) -> CompileResult<()> {
        let (pops, pushes) = op.stack_effect(operand);
        if self.stack_depth < pops {
            return Err(CompileError::internal(format!(
                "stack underflow emitting {} in {} (depth {})",
                op.name(),
                self.name,
                self.stack_depth
            )));
        }
        self.set_stack_depth(self.stack_depth - pops + pushes);
        Ok(())
    }

    // ===== Instruction Emission =====

    /// Emit an opcode without operands
    pub fn emit(&mut self, op: Opcode) -> CompileResult<()> {
        debug_assert_eq!(op.operand_size(), 0, "{} takes operands", op.name());
        self.track(op, 0)?;
        self.writer.emit_opcode(op);
        Ok(())
    }

    /// Emit an opcode with a u8 operand
    pub fn emit_u8(&mut self, op: Opcode, operand: u8) -> CompileResult<()> {
        debug_assert_eq!(op.operand_size(), 1, "{} is not a u8 opcode", op.name());
        self.track(op, operand as u32)?;
        self.writer.emit_opcode(op);
        self.writer.emit_u8(operand);
        Ok(())
    }

    /// Emit an opcode with a u32 operand
    pub fn emit_u32(&mut self, op: Opcode, operand: u32) -> CompileResult<()> {
        self.track(op, operand)?;
        self.writer.emit_opcode(op);
        self.writer.emit_u32(operand);
        Ok(())
    }

    /// Push an integer constant
    pub fn emit_const_i32(&mut self, value: i32) -> CompileResult<()> {
        self.track(Opcode::ConstI32, 0)?;
        self.writer.emit_opcode(Opcode::ConstI32);
        self.writer.emit_i32(value);
        Ok(())
    }

    /// Push a string constant
    pub fn emit_const_str(&mut self, value: &str) -> CompileResult<()> {
        let index = self.constants.add_string(value);
        self.emit_u32(Opcode::ConstStr, index)
    }

    /// Push a global by name
    pub fn emit_load_global(&mut self, name: &str) -> CompileResult<()> {
        let index = self.constants.add_string(name);
        self.emit_u32(Opcode::LoadGlobal, index)
    }

    /// Push a local slot
    pub fn emit_load_local(&mut self, slot: u16) -> CompileResult<()> {
        self.track(Opcode::LoadLocal, 0)?;
        self.writer.emit_opcode(Opcode::LoadLocal);
        self.writer.emit_u16(slot);
        Ok(())
    }

    /// Pop into a local slot
    pub fn emit_store_local(&mut self, slot: u16) -> CompileResult<()> {
        self.track(Opcode::StoreLocal, 0)?;
        self.writer.emit_opcode(Opcode::StoreLocal);
        self.writer.emit_u16(slot);
        Ok(())
    }

    // ===== Stack Shuffling =====

    /// Move the value at `depth` to the top
    pub fn emit_pick(&mut self, depth: u8) -> CompileResult<()> {
        match depth {
            0 => Ok(()),
            1 => self.emit(Opcode::Swap),
            n => self.emit_u8(Opcode::Pick, n),
        }
    }

    /// Move the top value down to `depth`
    pub fn emit_unpick(&mut self, depth: u8) -> CompileResult<()> {
        match depth {
            0 => Ok(()),
            1 => self.emit(Opcode::Swap),
            n => self.emit_u8(Opcode::Unpick, n),
        }
    }

    /// Copy the value at `depth` onto the top
    pub fn emit_dup_at(&mut self, depth: u8) -> CompileResult<()> {
        match depth {
            0 => self.emit(Opcode::Dup),
            n => self.emit_u8(Opcode::DupAt, n),
        }
    }

    /// Pop `count` values
    pub fn emit_pop_n(&mut self, count: u8) -> CompileResult<()> {
        match count {
            0 => Ok(()),
            1 => self.emit(Opcode::Pop),
            n => self.emit_u8(Opcode::PopN, n),
        }
    }

    // ===== Jumps =====

    /// Emit a forward jump whose target is patched later
    pub fn emit_jump(&mut self, op: Opcode) -> CompileResult<JumpPatch> {
        debug_assert!(op.is_jump());
        self.track(op, 0)?;
        self.writer.emit_opcode(op);
        let operand_pos = self.writer.reserve_i32();
        Ok(JumpPatch {
            operand_pos,
            instr_end: self.offset(),
        })
    }

    /// Emit a jump to an already known offset
    pub fn emit_jump_to(&mut self, op: Opcode, target: usize) -> CompileResult<()> {
        let patch = self.emit_jump(op)?;
        self.patch_to(patch, target)
    }

    /// Point a pending jump at the current offset
    pub fn patch_to_here(&mut self, patch: JumpPatch) -> CompileResult<()> {
        self.patch_to(patch, self.offset())
    }

    /// Point a pending jump at `target`
    pub fn patch_to(&mut self, patch: JumpPatch, target: usize) -> CompileResult<()> {
        let relative = i32::try_from(target as i64 - patch.instr_end as i64)
            .map_err(|_| CompileError::JumpTooLarge)?;
        self.writer.patch_i32(patch.operand_pos, relative);
        Ok(())
    }

    /// Emit `TryStart` with both handler operands absent
    pub fn emit_try_start(&mut self) -> CompileResult<TryStartPatch> {
        self.track(Opcode::TryStart, 0)?;
        self.writer.emit_opcode(Opcode::TryStart);
        let catch_pos = self.writer.offset();
        self.writer.emit_i32(NO_HANDLER);
        let finally_pos = self.writer.offset();
        self.writer.emit_i32(NO_HANDLER);
        let instr_end = self.offset();
        Ok(TryStartPatch {
            catch: JumpPatch {
                operand_pos: catch_pos,
                instr_end,
            },
            finally: JumpPatch {
                operand_pos: finally_pos,
                instr_end,
            },
        })
    }

    // ===== Locals =====

    /// Allocate a fresh local slot
    pub fn alloc_local(&mut self) -> CompileResult<u16> {
        let slot = self.local_count;
        self.local_count = self.local_count.checked_add(1).ok_or(CompileError::TooManyLocals)?;
        Ok(slot)
    }

    // ===== Suspension =====

    /// Emit `Await`; only legal in async functions
    pub fn emit_await(&mut self) -> CompileResult<()> {
        if !self.kind.is_async() {
            return Err(CompileError::AwaitOutsideAsync {
                function: self.name.clone(),
            });
        }
        self.emit(Opcode::Await)
    }

    /// Emit `Yield`; only legal in generators
    pub fn emit_yield(&mut self) -> CompileResult<()> {
        if !self.kind.is_generator() {
            return Err(CompileError::YieldOutsideGenerator {
                function: self.name.clone(),
            });
        }
        self.emit(Opcode::Yield)
    }

    // ===== Disposable Scope Lifecycle =====

    /// Install the dispose capability of a scope that has disposables
    pub fn enter_disposable_scope(&mut self) -> CompileResult<()> {
        self.emit(Opcode::PushDisposeScope)?;
        self.disposable_depth += 1;
        Ok(())
    }

    /// Discard the innermost dispose capability
    pub fn exit_disposable_scope(&mut self) -> CompileResult<()> {
        if self.disposable_depth == 0 {
            return Err(CompileError::internal("exit of a disposable scope that was never entered"));
        }
        self.emit(Opcode::PopDisposeScope)?;
        self.disposable_depth -= 1;
        Ok(())
    }

    /// Emit the `PopDisposeScope` of a scope left by a non-local jump.
    ///
    /// The scope stays entered for the code that follows the jump site.
    pub fn emit_leave_disposable_scope(&mut self) -> CompileResult<()> {
        if self.disposable_depth == 0 {
            return Err(CompileError::internal("jump out of a disposable scope that was never entered"));
        }
        self.emit(Opcode::PopDisposeScope)
    }

    /// Finish emission
    pub fn finish(self) -> Function {
        Function {
            name: self.name,
            kind: self.kind,
            param_count: self.param_count,
            local_count: self.local_count as usize,
            max_stack: self.max_stack_depth as usize,
            code: self.writer.into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::decode_instructions;

    #[test]
    fn test_tracks_stack_depth() {
        let mut pool = ConstantPool::new();
        let mut bce = BytecodeEmitter::new("f", FunctionKind::Normal, 0, &mut pool).unwrap();
        bce.emit(Opcode::ConstTrue).unwrap();
        bce.emit(Opcode::ConstFalse).unwrap();
        bce.emit(Opcode::Dup2).unwrap();
        assert_eq!(bce.stack_depth(), 4);
        bce.emit_pop_n(4).unwrap();
        assert_eq!(bce.stack_depth(), 0);
        assert!(bce.emit(Opcode::Pop).is_err());
        bce.emit(Opcode::RetRval).unwrap();
        assert_eq!(bce.finish().max_stack, 4);
    }

    #[test]
    fn test_forward_jump_patching() {
        let mut pool = ConstantPool::new();
        let mut bce = BytecodeEmitter::new("f", FunctionKind::Normal, 0, &mut pool).unwrap();
        let jump = bce.emit_jump(Opcode::Jmp).unwrap();
        bce.emit(Opcode::Nop).unwrap();
        bce.patch_to_here(jump).unwrap();
        bce.emit(Opcode::RetRval).unwrap();

        let code = bce.finish().code;
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(instrs[0].jump_target(), Some(6));
        assert_eq!(instrs[2].opcode, Opcode::RetRval);
    }

    #[test]
    fn test_backward_jump() {
        let mut pool = ConstantPool::new();
        let mut bce = BytecodeEmitter::new("f", FunctionKind::Normal, 0, &mut pool).unwrap();
        let head = bce.offset();
        bce.emit(Opcode::Nop).unwrap();
        bce.emit_jump_to(Opcode::Jmp, head).unwrap();
        let instrs = decode_instructions(&bce.finish().code).unwrap();
        assert_eq!(instrs[1].operands[0], -6);
        assert_eq!(instrs[1].jump_target(), Some(0));
    }

    #[test]
    fn test_await_requires_async() {
        let mut pool = ConstantPool::new();
        let mut bce = BytecodeEmitter::new("f", FunctionKind::Generator, 0, &mut pool).unwrap();
        bce.emit(Opcode::ConstUndefined).unwrap();
        assert!(matches!(
            bce.emit_await(),
            Err(CompileError::AwaitOutsideAsync { .. })
        ));
        assert!(bce.emit_yield().is_ok());
    }

    #[test]
    fn test_params_reserve_locals() {
        let mut pool = ConstantPool::new();
        let mut bce = BytecodeEmitter::new("f", FunctionKind::Normal, 2, &mut pool).unwrap();
        assert_eq!(bce.alloc_local().unwrap(), 2);
        assert_eq!(bce.finish().local_count, 3);
    }

    #[test]
    fn test_disposable_scope_balance() {
        let mut pool = ConstantPool::new();
        let mut bce = BytecodeEmitter::new("f", FunctionKind::Normal, 0, &mut pool).unwrap();
        assert!(bce.exit_disposable_scope().is_err());
        bce.enter_disposable_scope().unwrap();
        assert_eq!(bce.disposable_depth(), 1);
        bce.exit_disposable_scope().unwrap();
        assert_eq!(bce.disposable_depth(), 0);
    }
}
