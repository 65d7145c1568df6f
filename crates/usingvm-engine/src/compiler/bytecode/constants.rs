//! Constant pool for bytecode modules

use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use rustc_hash::FxHashMap;

/// Constant pool containing string literals and global names
///
/// Strings are interned: adding the same string twice returns the same index.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// String constants
    pub strings: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string constant and return its index
    pub fn add_string(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.index.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), index);
        index
    }

    /// Get a string constant by index
    pub fn get_string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(|s| s.as_str())
    }

    /// Number of string constants
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the pool holds no constants
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Encode the constant pool to binary format
    ///
    /// Format:
    /// - String count (u32)
    /// - For each string: length (u32) + UTF-8 bytes
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u32(self.strings.len() as u32);
        for s in &self.strings {
            writer.emit_string(s);
        }
    }

    /// Decode a constant pool from binary format
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u32()? as usize;
        let mut pool = Self::new();
        for _ in 0..count {
            let s = reader.read_string()?;
            let index = pool.strings.len() as u32;
            pool.index.entry(s.clone()).or_insert(index);
            pool.strings.push(s);
        }
        Ok(pool)
    }
}
