//! Bytecode verification

use super::disasm::{decode_instructions, Instruction};
use super::module::{Function, Module};
use super::opcode::{Opcode, ResourceFieldKind};
use rustc_hash::FxHashMap;

/// Bytecode verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Invalid opcode
    #[error("Invalid opcode {opcode:#x} at offset {offset}")]
    InvalidOpcode {
        /// The invalid opcode byte
        opcode: u8,
        /// Offset in bytecode
        offset: usize,
    },

    /// Stack underflow
    #[error("Stack underflow at offset {0}")]
    StackUnderflow(usize),

    /// Stack deeper than the function declares
    #[error("Stack overflow at offset {0} (depth: {1})")]
    StackOverflow(usize, u32),

    /// Two control-flow paths reach an instruction with different depths
    #[error("Inconsistent stack depth at offset {offset}: {expected} vs {found}")]
    StackMismatch {
        /// Offset in bytecode
        offset: usize,
        /// Depth recorded by the first path
        expected: u32,
        /// Depth of the conflicting path
        found: u32,
    },

    /// Invalid jump target
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// The invalid jump target
        target: usize,
        /// Offset in bytecode
        offset: usize,
    },

    /// Invalid constant pool reference
    #[error("Invalid constant pool reference: index {index} at offset {offset}")]
    InvalidConstantRef {
        /// The invalid constant index
        index: u32,
        /// Offset in bytecode
        offset: usize,
    },

    /// Invalid local variable reference
    #[error("Invalid local variable reference: index {index} (max {max}) at offset {offset}")]
    InvalidLocalRef {
        /// The invalid local variable index
        index: usize,
        /// Maximum allowed index
        max: usize,
        /// Offset in bytecode
        offset: usize,
    },

    /// Operand outside the range the opcode accepts
    #[error("Invalid operand {value} for {opcode} at offset {offset}")]
    InvalidOperand {
        /// Opcode mnemonic
        opcode: &'static str,
        /// The operand value
        value: i64,
        /// Offset in bytecode
        offset: usize,
    },

    /// Execution falls off end
    #[error("Execution falls off end of function at offset {0}")]
    FallOffEnd(usize),

    /// Module validation error
    #[error("Module validation error: {0}")]
    ModuleValidation(String),

    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(String),
}

/// Verify a module's bytecode
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    module.validate().map_err(VerifyError::ModuleValidation)?;

    for function in &module.functions {
        verify_function(function, module)?;
    }

    Ok(())
}

/// Verify a single function's bytecode against its module
pub fn verify_function(function: &Function, module: &Module) -> Result<(), VerifyError> {
    let instructions = decode_instructions(&function.code).map_err(|e| match e {
        super::encoder::DecodeError::InvalidOpcode(opcode, offset) => {
            VerifyError::InvalidOpcode { opcode, offset }
        }
        other => VerifyError::DecodeError(other.to_string()),
    })?;

    let Some(last) = instructions.last() else {
        return Err(VerifyError::FallOffEnd(0));
    };
    if !last.opcode.is_terminator() {
        return Err(VerifyError::FallOffEnd(last.offset));
    }

    let index_of: FxHashMap<usize, usize> = instructions
        .iter()
        .enumerate()
        .map(|(i, instr)| (instr.offset, i))
        .collect();

    for instr in &instructions {
        check_operands(instr, function, module)?;
    }

    check_stack_depths(&instructions, &index_of, function)
}

fn check_operands(instr: &Instruction, function: &Function, module: &Module) -> Result<(), VerifyError> {
    let offset = instr.offset;
    let invalid = |value: i64| VerifyError::InvalidOperand {
        opcode: instr.name,
        value,
        offset,
    };

    match instr.opcode {
        Opcode::LoadLocal | Opcode::StoreLocal => {
            let index = instr.operand() as usize;
            if index >= function.local_count {
                return Err(VerifyError::InvalidLocalRef {
                    index,
                    max: function.local_count,
                    offset,
                });
            }
        }
        Opcode::ConstStr | Opcode::LoadGlobal => {
            let index = instr.operand();
            if module.constants.get_string(index).is_none() {
                return Err(VerifyError::InvalidConstantRef { index, offset });
            }
        }
        Opcode::AddDisposable | Opcode::IterClose | Opcode::ChainDisposeError => {
            if instr.operand() > 1 {
                return Err(invalid(instr.operands[0]));
            }
        }
        Opcode::ResourceField => {
            if ResourceFieldKind::from_u8(instr.operand() as u8).is_none() {
                return Err(invalid(instr.operands[0]));
            }
        }
        Opcode::PopN | Opcode::Pick | Opcode::Unpick => {
            if instr.operand() == 0 {
                return Err(invalid(0));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Abstract interpretation of operand stack depth over every reachable path,
/// including the implicit edges into catch (`EXC`) and finally
/// (`EXC THROWING`) handlers.
fn check_stack_depths(
    instructions: &[Instruction],
    index_of: &FxHashMap<usize, usize>,
    function: &Function,
) -> Result<(), VerifyError> {
    let mut depths: Vec<Option<u32>> = vec![None; instructions.len()];
    let mut worklist = vec![0usize];
    depths[0] = Some(0);

    let resolve = |target: usize, from: usize| -> Result<usize, VerifyError> {
        index_of.get(&target).copied().ok_or(VerifyError::InvalidJumpTarget {
            target,
            offset: from,
        })
    };

    while let Some(i) = worklist.pop() {
        let instr = &instructions[i];
        let depth = depths[i].unwrap_or(0);
        let (pops, pushes) = instr.opcode.stack_effect(instr.operand());
        if depth < pops {
            return Err(VerifyError::StackUnderflow(instr.offset));
        }
        let after = depth - pops + pushes;
        if after as usize > function.max_stack || depth as usize > function.max_stack {
            return Err(VerifyError::StackOverflow(instr.offset, after.max(depth)));
        }

        let mut successors: Vec<(usize, u32)> = Vec::with_capacity(3);
        let fallthrough = |successors: &mut Vec<(usize, u32)>| -> Result<(), VerifyError> {
            if i + 1 >= instructions.len() {
                return Err(VerifyError::FallOffEnd(instr.offset));
            }
            successors.push((i + 1, after));
            Ok(())
        };

        match instr.opcode {
            Opcode::Throw | Opcode::RetRval => {}
            Opcode::Jmp => {
                let target = instr.jump_target().unwrap_or(usize::MAX);
                successors.push((resolve(target, instr.offset)?, after));
            }
            Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                fallthrough(&mut successors)?;
                let target = instr.jump_target().unwrap_or(usize::MAX);
                successors.push((resolve(target, instr.offset)?, after));
            }
            Opcode::TryStart => {
                fallthrough(&mut successors)?;
                let (catch, finally) = instr.handler_targets();
                if catch.is_none() && finally.is_none() {
                    return Err(VerifyError::InvalidOperand {
                        opcode: instr.name,
                        value: -1,
                        offset: instr.offset,
                    });
                }
                if let Some(target) = catch {
                    successors.push((resolve(target, instr.offset)?, depth + 1));
                }
                if let Some(target) = finally {
                    successors.push((resolve(target, instr.offset)?, depth + 2));
                }
            }
            _ => fallthrough(&mut successors)?,
        }

        for (next, next_depth) in successors {
            match depths[next] {
                Some(existing) if existing != next_depth => {
                    return Err(VerifyError::StackMismatch {
                        offset: instructions[next].offset,
                        expected: existing,
                        found: next_depth,
                    });
                }
                Some(_) => {}
                None => {
                    depths[next] = Some(next_depth);
                    worklist.push(next);
                }
            }
        }
    }

    Ok(())
}
