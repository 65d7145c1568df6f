//! Bytecode opcodes for the UsingVM
//!
//! This module defines the instruction set executed by the interpreter and
//! produced by the code generator, including the disposal instructions that
//! back `using` / `await using` scopes.

/// Bytecode opcode enumeration
///
/// All opcodes are single-byte instructions. Some opcodes take additional operands
/// that follow the opcode byte in the bytecode stream (little-endian).
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation
/// - 0x10-0x1F: Constants
/// - 0x20-0x2F: Locals, globals and the return-value slot
/// - 0x30-0x3F: Logic & counters
/// - 0x40-0x4F: Control flow
/// - 0x50-0x5F: Calls
/// - 0x60-0x6F: Lists & iteration
/// - 0x70-0x7F: Resource disposal
/// - 0x80-0x8F: Suspension (await / yield)
/// - 0x90-0x9F: Exception handling
///
/// Jump offsets are relative to the end of the jump instruction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Pop N values (operand: u8 count)
    PopN = 0x02,
    /// Duplicate top stack value
    Dup = 0x03,
    /// Duplicate top two stack values: a b -> a b a b
    Dup2 = 0x04,
    /// Copy the value at depth N (0 = top) onto the top (operand: u8 depth)
    DupAt = 0x05,
    /// Swap top two stack values
    Swap = 0x06,
    /// Move the value at depth N to the top (operand: u8 depth)
    Pick = 0x07,
    /// Move the top value down to depth N (operand: u8 depth)
    Unpick = 0x08,

    // ===== Constants (0x10-0x1F) =====
    /// Push undefined
    ConstUndefined = 0x10,
    /// Push null
    ConstNull = 0x11,
    /// Push true
    ConstTrue = 0x12,
    /// Push false
    ConstFalse = 0x13,
    /// Push 32-bit integer constant (operand: i32)
    ConstI32 = 0x14,
    /// Push string constant from pool (operand: u32 index)
    ConstStr = 0x15,

    // ===== Locals, Globals, Return Value (0x20-0x2F) =====
    /// Load local variable onto stack (operand: u16 index)
    LoadLocal = 0x20,
    /// Pop top of stack into local variable (operand: u16 index)
    StoreLocal = 0x21,
    /// Load a global by name (operand: u32 string pool index)
    LoadGlobal = 0x22,
    /// Push the frame's return-value slot
    GetRval = 0x23,
    /// Pop into the frame's return-value slot
    SetRval = 0x24,

    // ===== Logic & Counters (0x30-0x3F) =====
    /// Logical not of the top value's truthiness
    Not = 0x30,
    /// Logical and: pop b, pop a, push a && b
    And = 0x31,
    /// Integer increment
    Inc = 0x32,
    /// Integer decrement
    Dec = 0x33,
    /// Integer compare: pop b, pop a, push a >= b
    Ige = 0x34,
    /// Pop a value, push whether it is null or undefined
    IsNullish = 0x35,
    /// Pop a value, push whether it is the generator-closing signal
    IsClosing = 0x36,

    // ===== Control Flow (0x40-0x4F) =====
    /// Unconditional jump (operand: i32 offset)
    Jmp = 0x40,
    /// Pop condition, jump if falsy (operand: i32 offset)
    JmpIfFalse = 0x41,
    /// Pop condition, jump if truthy (operand: i32 offset)
    JmpIfTrue = 0x42,
    /// Finish the function with the return-value slot
    RetRval = 0x43,

    // ===== Calls (0x50-0x5F) =====
    /// Call: callee this arg0..argN -> result (operand: u8 argc)
    Call = 0x50,

    // ===== Lists & Iteration (0x60-0x6F) =====
    /// Index into a list: list index -> element
    GetElem = 0x60,
    /// Obtain an iterator: iterable -> iter
    GetIterator = 0x61,
    /// Step an iterator: iter -> iter value done
    IterNext = 0x62,
    /// Close an iterator: iter -> (operand: u8, 1 = throw completion, close errors ignored)
    IterClose = 0x63,

    // ===== Resource Disposal (0x70-0x7F) =====
    /// Install a fresh dispose capability for the entered scope
    PushDisposeScope = 0x70,
    /// Discard the innermost dispose capability
    PopDisposeScope = 0x71,
    /// Pop a value and register it with the innermost capability (operand: u8 hint)
    AddDisposable = 0x72,
    /// Drain the innermost capability: -> resources count
    TakeDisposeCapability = 0x73,
    /// Read a field of a resource record: resource -> field (operand: u8 field)
    ResourceField = 0x74,
    /// Chain a disposal error: new old throwing -> exc (operand: u8, 1 = unwrap generator closing)
    ChainDisposeError = 0x75,

    // ===== Suspension (0x80-0x8F) =====
    /// Await the top value; the resumed value replaces it
    Await = 0x80,
    /// Yield the top value; the resumed value replaces it
    Yield = 0x81,

    // ===== Exception Handling (0x90-0x9F) =====
    /// Pop and throw the top value
    Throw = 0x90,
    /// Install an exception handler (operands: i32 catch offset, i32 finally offset; -1 = absent)
    TryStart = 0x91,
    /// Remove the innermost exception handler
    EndTry = 0x92,
}

/// Registration hint carried by [`Opcode::AddDisposable`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsingHint {
    /// `using`: disposed with `@@dispose`
    Sync = 0,
    /// `await using`: disposed with `@@asyncDispose` and awaited
    Async = 1,
}

impl UsingHint {
    /// Convert a byte to a hint
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Sync),
            1 => Some(Self::Async),
            _ => None,
        }
    }
}

/// Field selector for [`Opcode::ResourceField`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFieldKind {
    /// The registered value (the `this` of the dispose call)
    Value = 0,
    /// The hint as an integer (0 = sync, 1 = async)
    Hint = 1,
    /// The resolved dispose method, or undefined
    Method = 2,
}

impl ResourceFieldKind {
    /// Convert a byte to a field selector
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Value),
            1 => Some(Self::Hint),
            2 => Some(Self::Method),
            _ => None,
        }
    }
}

impl Opcode {
    /// Convert a byte to an opcode
    ///
    /// Returns `None` if the byte doesn't correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        let op = match byte {
            0x00 => Self::Nop,
            0x01 => Self::Pop,
            0x02 => Self::PopN,
            0x03 => Self::Dup,
            0x04 => Self::Dup2,
            0x05 => Self::DupAt,
            0x06 => Self::Swap,
            0x07 => Self::Pick,
            0x08 => Self::Unpick,

            0x10 => Self::ConstUndefined,
            0x11 => Self::ConstNull,
            0x12 => Self::ConstTrue,
            0x13 => Self::ConstFalse,
            0x14 => Self::ConstI32,
            0x15 => Self::ConstStr,

            0x20 => Self::LoadLocal,
            0x21 => Self::StoreLocal,
            0x22 => Self::LoadGlobal,
            0x23 => Self::GetRval,
            0x24 => Self::SetRval,

            0x30 => Self::Not,
            0x31 => Self::And,
            0x32 => Self::Inc,
            0x33 => Self::Dec,
            0x34 => Self::Ige,
            0x35 => Self::IsNullish,
            0x36 => Self::IsClosing,

            0x40 => Self::Jmp,
            0x41 => Self::JmpIfFalse,
            0x42 => Self::JmpIfTrue,
            0x43 => Self::RetRval,

            0x50 => Self::Call,

            0x60 => Self::GetElem,
            0x61 => Self::GetIterator,
            0x62 => Self::IterNext,
            0x63 => Self::IterClose,

            0x70 => Self::PushDisposeScope,
            0x71 => Self::PopDisposeScope,
            0x72 => Self::AddDisposable,
            0x73 => Self::TakeDisposeCapability,
            0x74 => Self::ResourceField,
            0x75 => Self::ChainDisposeError,

            0x80 => Self::Await,
            0x81 => Self::Yield,

            0x90 => Self::Throw,
            0x91 => Self::TryStart,
            0x92 => Self::EndTry,

            _ => return None,
        };
        Some(op)
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the opcode name as a string
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Pop => "POP",
            Self::PopN => "POP_N",
            Self::Dup => "DUP",
            Self::Dup2 => "DUP2",
            Self::DupAt => "DUP_AT",
            Self::Swap => "SWAP",
            Self::Pick => "PICK",
            Self::Unpick => "UNPICK",
            Self::ConstUndefined => "CONST_UNDEFINED",
            Self::ConstNull => "CONST_NULL",
            Self::ConstTrue => "CONST_TRUE",
            Self::ConstFalse => "CONST_FALSE",
            Self::ConstI32 => "CONST_I32",
            Self::ConstStr => "CONST_STR",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::LoadGlobal => "LOAD_GLOBAL",
            Self::GetRval => "GET_RVAL",
            Self::SetRval => "SET_RVAL",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::Ige => "IGE",
            Self::IsNullish => "IS_NULLISH",
            Self::IsClosing => "IS_CLOSING",
            Self::Jmp => "JMP",
            Self::JmpIfFalse => "JMP_IF_FALSE",
            Self::JmpIfTrue => "JMP_IF_TRUE",
            Self::RetRval => "RET_RVAL",
            Self::Call => "CALL",
            Self::GetElem => "GET_ELEM",
            Self::GetIterator => "GET_ITERATOR",
            Self::IterNext => "ITER_NEXT",
            Self::IterClose => "ITER_CLOSE",
            Self::PushDisposeScope => "PUSH_DISPOSE_SCOPE",
            Self::PopDisposeScope => "POP_DISPOSE_SCOPE",
            Self::AddDisposable => "ADD_DISPOSABLE",
            Self::TakeDisposeCapability => "TAKE_DISPOSE_CAPABILITY",
            Self::ResourceField => "RESOURCE_FIELD",
            Self::ChainDisposeError => "CHAIN_DISPOSE_ERROR",
            Self::Await => "AWAIT",
            Self::Yield => "YIELD",
            Self::Throw => "THROW",
            Self::TryStart => "TRY_START",
            Self::EndTry => "END_TRY",
        }
    }

    /// Size in bytes of the operands following the opcode byte
    pub fn operand_size(self) -> usize {
        match self {
            Self::PopN
            | Self::DupAt
            | Self::Pick
            | Self::Unpick
            | Self::Call
            | Self::IterClose
            | Self::AddDisposable
            | Self::ResourceField
            | Self::ChainDisposeError => 1,
            Self::LoadLocal | Self::StoreLocal => 2,
            Self::ConstI32
            | Self::ConstStr
            | Self::LoadGlobal
            | Self::Jmp
            | Self::JmpIfFalse
            | Self::JmpIfTrue => 4,
            Self::TryStart => 8,
            _ => 0,
        }
    }

    /// Stack effect as `(pops, pushes)`
    ///
    /// `operand` is the first operand for opcodes whose effect depends on it
    /// (`PopN`, `DupAt`, `Pick`, `Unpick`, `Call`); it is ignored otherwise.
    pub fn stack_effect(self, operand: u32) -> (u32, u32) {
        match self {
            Self::Nop => (0, 0),
            Self::Pop => (1, 0),
            Self::PopN => (operand, 0),
            Self::Dup => (1, 2),
            Self::Dup2 => (2, 4),
            Self::DupAt => (operand + 1, operand + 2),
            Self::Swap => (2, 2),
            Self::Pick | Self::Unpick => (operand + 1, operand + 1),

            Self::ConstUndefined
            | Self::ConstNull
            | Self::ConstTrue
            | Self::ConstFalse
            | Self::ConstI32
            | Self::ConstStr => (0, 1),

            Self::LoadLocal | Self::LoadGlobal | Self::GetRval => (0, 1),
            Self::StoreLocal | Self::SetRval => (1, 0),

            Self::Not | Self::Inc | Self::Dec | Self::IsNullish | Self::IsClosing => (1, 1),
            Self::And | Self::Ige => (2, 1),

            Self::Jmp | Self::RetRval => (0, 0),
            Self::JmpIfFalse | Self::JmpIfTrue => (1, 0),

            Self::Call => (operand + 2, 1),

            Self::GetElem => (2, 1),
            Self::GetIterator => (1, 1),
            Self::IterNext => (1, 3),
            Self::IterClose => (1, 0),

            Self::PushDisposeScope | Self::PopDisposeScope => (0, 0),
            Self::AddDisposable => (1, 0),
            Self::TakeDisposeCapability => (0, 2),
            Self::ResourceField => (1, 1),
            Self::ChainDisposeError => (3, 1),

            Self::Await | Self::Yield => (1, 1),

            Self::Throw => (1, 0),
            Self::TryStart | Self::EndTry => (0, 0),
        }
    }

    /// Check if this is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue)
    }

    /// Check if this opcode suspends the running task
    pub fn is_suspension(self) -> bool {
        matches!(self, Self::Await | Self::Yield)
    }

    /// Check if this instruction ends straight-line execution
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Jmp | Self::RetRval | Self::Throw)
    }
}
