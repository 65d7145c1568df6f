//! Bytecode module format

use super::constants::ConstantPool;
use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Magic number for UsingVM bytecode files
pub const MAGIC: [u8; 4] = *b"UVMB";

/// Current bytecode version
pub const VERSION: u32 = 1;

/// Size of the fixed header: magic + version + crc32
const HEADER_SIZE: usize = 12;

/// Module encoding/decoding errors
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected UVMB, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum of the payload as read
        actual: u32,
    },
}

/// Execution flavour of a function
///
/// Decides whether `await` and `yield` are legal in the body and how a
/// disposal pass treats the generator-closing sentinel.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum FunctionKind {
    /// Plain synchronous function
    #[default]
    Normal = 0,
    /// `async function`
    Async = 1,
    /// `function*`
    Generator = 2,
    /// `async function*`
    AsyncGenerator = 3,
}

impl FunctionKind {
    /// Decode a kind tag
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Normal),
            1 => Some(Self::Async),
            2 => Some(Self::Generator),
            3 => Some(Self::AsyncGenerator),
            _ => None,
        }
    }

    /// Whether `await` may suspend this function
    pub fn is_async(self) -> bool {
        matches!(self, Self::Async | Self::AsyncGenerator)
    }

    /// Whether `yield` may suspend this function
    pub fn is_generator(self) -> bool {
        matches!(self, Self::Generator | Self::AsyncGenerator)
    }
}

/// A compiled function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Execution flavour
    pub kind: FunctionKind,
    /// Number of parameters (stored in the first locals)
    pub param_count: usize,
    /// Number of local variable slots
    pub local_count: usize,
    /// Maximum operand stack depth reached by the code
    pub max_stack: usize,
    /// Bytecode
    pub code: Vec<u8>,
}

impl Function {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u8(self.kind as u8);
        writer.emit_u32(self.param_count as u32);
        writer.emit_u32(self.local_count as u32);
        writer.emit_u32(self.max_stack as u32);
        writer.emit_u32(self.code.len() as u32);
        writer.emit_bytes(&self.code);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let tag = reader.read_u8()?;
        let kind = FunctionKind::from_u8(tag).ok_or(DecodeError::InvalidFunctionKind(tag))?;
        let param_count = reader.read_u32()? as usize;
        let local_count = reader.read_u32()? as usize;
        let max_stack = reader.read_u32()? as usize;
        let code_len = reader.read_u32()? as usize;
        let code = reader.read_bytes(code_len)?.to_vec();
        Ok(Self {
            name,
            kind,
            param_count,
            local_count,
            max_stack,
            code,
        })
    }
}

/// A compiled bytecode module
#[derive(Debug, Clone)]
pub struct Module {
    /// Magic number
    pub magic: [u8; 4],
    /// Format version
    pub version: u32,
    /// Module name
    pub name: String,
    /// Constant pool shared by all functions
    pub constants: ConstantPool,
    /// Function table
    pub functions: Vec<Function>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            name: name.into(),
            constants: ConstantPool::new(),
            functions: Vec::new(),
        }
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Validate module structure
    pub fn validate(&self) -> Result<(), String> {
        if self.magic != MAGIC {
            return Err("Invalid magic number".to_string());
        }
        if self.version != VERSION {
            return Err(format!("Unsupported version: {}", self.version));
        }
        for (i, f) in self.functions.iter().enumerate() {
            if self.functions[..i].iter().any(|g| g.name == f.name) {
                return Err(format!("Duplicate function '{}'", f.name));
            }
            if f.param_count > f.local_count {
                return Err(format!(
                    "Function '{}' declares {} params but only {} locals",
                    f.name, f.param_count, f.local_count
                ));
            }
        }
        Ok(())
    }

    /// Encode the module to binary format
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + crc32 of the payload (u32)
    /// - Module name
    /// - Constant pool
    /// - Function table
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = BytecodeWriter::new();
        payload.emit_string(&self.name);
        self.constants.encode(&mut payload);
        payload.emit_u32(self.functions.len() as u32);
        for func in &self.functions {
            func.encode(&mut payload);
        }
        let payload = payload.into_bytes();

        let mut writer = BytecodeWriter::new();
        writer.emit_bytes(&self.magic);
        writer.emit_u32(self.version);
        writer.emit_u32(crc32fast::hash(&payload));
        writer.emit_bytes(&payload);
        writer.into_bytes()
    }

    /// Decode a module from binary format
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        let mut reader = BytecodeReader::new(data);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(reader.read_bytes(4)?);
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let stored_crc32 = reader.read_u32()?;
        let calculated_crc32 = crc32fast::hash(&data[HEADER_SIZE..]);
        if stored_crc32 != calculated_crc32 {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_crc32,
                actual: calculated_crc32,
            });
        }

        let name = reader.read_string()?;
        let constants = ConstantPool::decode(&mut reader)?;
        let func_count = reader.read_u32()? as usize;
        let mut functions = Vec::with_capacity(func_count);
        for _ in 0..func_count {
            functions.push(Function::decode(&mut reader)?);
        }

        Ok(Self {
            magic,
            version,
            name,
            constants,
            functions,
        })
    }

    /// SHA-256 digest of the encoded module, for content-addressed caching
    pub fn checksum(&self) -> [u8; 32] {
        Sha256::digest(self.encode()).into()
    }
}
