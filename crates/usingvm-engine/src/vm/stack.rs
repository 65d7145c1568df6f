//! Operand stack
//!
//! Each frame owns a bounded operand stack. Exception handlers record the
//! depth at which they were installed and the stack is truncated back to it
//! when an exception is routed to the handler.
//!
//! Depths passed to the shuffling operations count from the top:
//!
//! ```text
//! ┌──────────┐
//! │ value₀   │  ← depth 0 (top)
//! │ value₁   │  ← depth 1
//! │ value₂   │  ← depth 2
//! └──────────┘
//! ```

use super::value::Value;
use super::{VmError, VmResult};

/// Default maximum stack size (in slots)
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024 * 64;

/// Bounded operand stack
#[derive(Debug)]
pub struct Stack {
    slots: Vec<Value>,
    max_size: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::with_max_size(DEFAULT_MAX_STACK_SIZE)
    }
}

impl Stack {
    /// Create a stack holding at most `max_size` values
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_size,
        }
    }

    /// Push a value
    #[inline]
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.slots.len() >= self.max_size {
            return Err(VmError::StackOverflow);
        }
        self.slots.push(value);
        Ok(())
    }

    /// Pop the top value
    #[inline]
    pub fn pop(&mut self) -> VmResult<Value> {
        self.slots.pop().ok_or(VmError::StackUnderflow)
    }

    /// Borrow the top value
    #[inline]
    pub fn peek(&self) -> VmResult<&Value> {
        self.peek_at(0)
    }

    /// Borrow the value at `depth`
    pub fn peek_at(&self, depth: usize) -> VmResult<&Value> {
        let index = self.index_of(depth)?;
        Ok(&self.slots[index])
    }

    /// Number of values on the stack
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Drop values above `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.slots.truncate(depth);
    }

    /// Move the value at `depth` to the top
    pub fn pick(&mut self, depth: usize) -> VmResult<()> {
        let index = self.index_of(depth)?;
        let value = self.slots.remove(index);
        self.slots.push(value);
        Ok(())
    }

    /// Move the top value down to `depth`
    pub fn unpick(&mut self, depth: usize) -> VmResult<()> {
        let index = self.index_of(depth)?;
        let value = self.pop()?;
        self.slots.insert(index, value);
        Ok(())
    }

    /// Swap the top two values
    pub fn swap(&mut self) -> VmResult<()> {
        let len = self.slots.len();
        if len < 2 {
            return Err(VmError::StackUnderflow);
        }
        self.slots.swap(len - 1, len - 2);
        Ok(())
    }

    fn index_of(&self, depth: usize) -> VmResult<usize> {
        self.slots
            .len()
            .checked_sub(depth + 1)
            .ok_or(VmError::StackUnderflow)
    }
}
