//! Lowering from the builder AST to bytecode
//!
//! Statements are lowered straight into a [`BytecodeEmitter`]. The lowerer
//! keeps a stack of the control regions that enclose the current statement
//! (disposable scopes, try/catch regions, loops, for-of iterations) so that
//! `break`, `continue` and `return` can emit the exit code of every region
//! they leave, innermost first.

pub mod ast;
mod expr;
mod stmt;

pub use ast::{Expr, FunctionDecl, Stmt};

use crate::compiler::bytecode::{verify_module, ConstantPool, Function, Module, Opcode};
use crate::compiler::codegen::{BytecodeEmitter, JumpPatch, UsingEmitter};
use crate::compiler::error::{CompileError, CompileResult};
use rustc_hash::FxHashMap;

/// Compile a set of functions into a verified module
pub fn compile_module(name: &str, decls: &[FunctionDecl]) -> CompileResult<Module> {
    let mut module = Module::new(name);
    for decl in decls {
        if module.function(&decl.name).is_some() {
            return Err(CompileError::DuplicateFunction {
                name: decl.name.clone(),
            });
        }
        let function = compile_function(decl, &mut module.constants)?;
        module.functions.push(function);
    }
    verify_module(&module).map_err(|e| CompileError::Verification {
        message: e.to_string(),
    })?;
    log::debug!(
        "compiled module '{}' ({} functions, {} constants)",
        name,
        module.functions.len(),
        module.constants.len()
    );
    Ok(module)
}

/// Compile one function, interning its strings into `constants`
pub fn compile_function(decl: &FunctionDecl, constants: &mut ConstantPool) -> CompileResult<Function> {
    let bce = BytecodeEmitter::new(decl.name.clone(), decl.kind, decl.params.len(), constants)?;
    let mut lowerer = FunctionLowerer::new(bce);

    let mut params = FxHashMap::default();
    for (slot, name) in decl.params.iter().enumerate() {
        params.insert(name.clone(), slot as u16);
    }
    lowerer.scopes.push(params);

    lowerer.lower_block(&decl.body)?;

    // Falling off the end returns undefined.
    lowerer.bce.emit(Opcode::ConstUndefined)?;
    lowerer.bce.emit(Opcode::SetRval)?;
    lowerer.bce.emit(Opcode::RetRval)?;

    if !lowerer.controls.is_empty() || lowerer.bce.disposable_depth() != 0 {
        return Err(CompileError::internal("unbalanced control regions"));
    }
    Ok(lowerer.bce.finish())
}

/// A loop that `break` / `continue` can target
struct LoopControl {
    label: Option<String>,
    for_of: bool,
    continue_target: usize,
    breaks: Vec<JumpPatch>,
    /// Stack depth at the loop exit (below the iterator of a for-of)
    exit_depth: u32,
}

/// A region enclosing the statement being lowered
enum Control {
    /// Block scope that declares disposables
    Disposable(UsingEmitter),
    /// Protected region of a user try/catch
    TryCatch,
    /// Loop header; a for-of keeps its iterator on the stack
    Loop(LoopControl),
    /// Body of one for-of iteration, with its optional `using` binding
    ForOfIteration(Option<UsingEmitter>),
}

/// Per-function lowering state
pub(crate) struct FunctionLowerer<'m> {
    bce: BytecodeEmitter<'m>,
    scopes: Vec<FxHashMap<String, u16>>,
    controls: Vec<Control>,
}

impl<'m> FunctionLowerer<'m> {
    fn new(bce: BytecodeEmitter<'m>) -> Self {
        Self {
            bce,
            scopes: Vec::new(),
            controls: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> CompileResult<u16> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| CompileError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn declare(&mut self, name: &str) -> CompileResult<u16> {
        let slot = self.bce.alloc_local()?;
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), slot);
                Ok(slot)
            }
            None => Err(CompileError::internal("declaration outside any scope")),
        }
    }
}

/// Emit the code that leaves `control` on a non-local jump
fn emit_control_exit(bce: &mut BytecodeEmitter<'_>, control: &mut Control) -> CompileResult<()> {
    match control {
        Control::Disposable(using) => {
            using.emit_non_local_jump(bce)?;
            bce.emit(Opcode::EndTry)?;
            bce.emit_leave_disposable_scope()
        }
        Control::TryCatch => bce.emit(Opcode::EndTry),
        Control::Loop(l) if l.for_of => bce.emit_u8(Opcode::IterClose, 0),
        Control::Loop(_) => Ok(()),
        Control::ForOfIteration(using) => {
            if let Some(using) = using {
                using.emit_non_local_jump(bce)?;
                bce.emit_leave_disposable_scope()?;
            }
            bce.emit(Opcode::EndTry)
        }
    }
}
