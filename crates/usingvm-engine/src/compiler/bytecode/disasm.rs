//! Instruction decoding and disassembly listings

use super::encoder::{BytecodeReader, DecodeError};
use super::module::Function;
use super::opcode::Opcode;
use serde::Serialize;
use std::fmt::Write as _;

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// Byte offset of the opcode
    pub offset: usize,
    /// The opcode
    #[serde(skip)]
    pub opcode: Opcode,
    /// Opcode mnemonic
    pub name: &'static str,
    /// Decoded operands, in encoding order
    pub operands: Vec<i64>,
}

impl Instruction {
    /// Offset just past this instruction's operands
    pub fn end(&self) -> usize {
        self.offset + 1 + self.opcode.operand_size()
    }

    /// First operand as an unsigned value (0 if absent)
    pub fn operand(&self) -> u32 {
        self.operands.first().copied().unwrap_or(0) as u32
    }

    /// Absolute target of a jump instruction
    pub fn jump_target(&self) -> Option<usize> {
        if self.opcode.is_jump() {
            Some(relative(self.end(), self.operands[0]))
        } else {
            None
        }
    }

    /// Absolute `(catch, finally)` targets of a `TryStart`
    pub fn handler_targets(&self) -> (Option<usize>, Option<usize>) {
        if self.opcode != Opcode::TryStart {
            return (None, None);
        }
        let target = |rel: i64| (rel >= 0).then(|| relative(self.end(), rel));
        (target(self.operands[0]), target(self.operands[1]))
    }
}

fn relative(end: usize, rel: i64) -> usize {
    (end as i64 + rel).max(0) as usize
}

/// Decode a function body into instructions
pub fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut reader = BytecodeReader::new(code);
    let mut instructions = Vec::new();

    while reader.has_more() {
        let offset = reader.position();
        let opcode = reader.read_opcode()?;
        let operands = match opcode {
            Opcode::LoadLocal | Opcode::StoreLocal => vec![reader.read_u16()? as i64],
            Opcode::ConstStr | Opcode::LoadGlobal => vec![reader.read_u32()? as i64],
            Opcode::ConstI32 | Opcode::Jmp | Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                vec![reader.read_i32()? as i64]
            }
            Opcode::TryStart => vec![reader.read_i32()? as i64, reader.read_i32()? as i64],
            op if op.operand_size() == 1 => vec![reader.read_u8()? as i64],
            _ => Vec::new(),
        };
        instructions.push(Instruction {
            offset,
            opcode,
            name: opcode.name(),
            operands,
        });
    }

    Ok(instructions)
}

/// Disassemble a function
pub fn disassemble(function: &Function) -> Result<Vec<Instruction>, DecodeError> {
    decode_instructions(&function.code)
}

/// Render a human readable listing of a function
pub fn listing(function: &Function) -> Result<String, DecodeError> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "function {} ({:?}, locals={}, max_stack={})",
        function.name, function.kind, function.local_count, function.max_stack
    );
    for instr in disassemble(function)? {
        let _ = write!(out, "{:>6}  {}", instr.offset, instr.name);
        if let Some(target) = instr.jump_target() {
            let _ = write!(out, " -> {}", target);
        } else if instr.opcode == Opcode::TryStart {
            let (catch, finally) = instr.handler_targets();
            let _ = write!(out, " catch={:?} finally={:?}", catch, finally);
        } else {
            for operand in &instr.operands {
                let _ = write!(out, " {}", operand);
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render a function's instructions as JSON
pub fn listing_json(function: &Function) -> Result<String, DecodeError> {
    let instructions = disassemble(function)?;
    Ok(serde_json::to_string_pretty(&instructions).unwrap_or_default())
}
