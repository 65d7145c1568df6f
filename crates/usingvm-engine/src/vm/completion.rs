//! Completion records of a disposal pass
//!
//! A pass carries `(throwing, exception)` in frame slots. When a dispose
//! method throws, the pending completion decides what the new exception is:
//! after a normal completion the failure stands alone, after a throw it
//! becomes a `SuppressedError` over the previous exception, and after a
//! generator `return()` it replaces the closing signal outright.

use super::value::Value;

/// Completion a disposal pass is carrying
#[derive(Debug, Clone)]
pub enum Completion {
    /// No exception pending
    Normal,
    /// An exception is pending
    Throw(Value),
    /// A generator is being closed by `return()`
    Unwind,
}

impl Completion {
    /// Rebuild the completion from the pass slots
    ///
    /// `unwrap_generator_closing` is set for throw-seeded passes in generator
    /// functions, where the pending exception may be the closing signal.
    pub fn from_pending(throwing: bool, exception: Value, unwrap_generator_closing: bool) -> Self {
        if !throwing {
            Completion::Normal
        } else if unwrap_generator_closing && matches!(exception, Value::GeneratorClosing) {
            Completion::Unwind
        } else {
            Completion::Throw(exception)
        }
    }

    /// Whether the completion is abrupt
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal)
    }

    /// Exception that results from `error` being thrown under this completion
    pub fn chain(self, error: Value) -> Value {
        match self {
            Completion::Throw(prior) => Value::suppressed_error(error, prior),
            Completion::Normal | Completion::Unwind => error,
        }
    }
}
