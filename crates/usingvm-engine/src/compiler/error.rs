//! Compilation errors

use thiserror::Error;

/// Result alias for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised while lowering and emitting bytecode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Reference to a local binding that is not in scope
    #[error("Undefined variable: {name}")]
    UndefinedVariable {
        /// Binding name
        name: String,
    },

    /// `await using` outside an async function
    #[error("'await using' is only valid in async functions (in {function})")]
    AwaitUsingOutsideAsync {
        /// Enclosing function
        function: String,
    },

    /// `await` outside an async function
    #[error("'await' is only valid in async functions (in {function})")]
    AwaitOutsideAsync {
        /// Enclosing function
        function: String,
    },

    /// `yield` outside a generator
    #[error("'yield' is only valid in generators (in {function})")]
    YieldOutsideGenerator {
        /// Enclosing function
        function: String,
    },

    /// Too many local slots
    #[error("Too many local variables (max 65535)")]
    TooManyLocals,

    /// Too many call arguments
    #[error("Too many arguments (max 255)")]
    TooManyArguments,

    /// Relative jump does not fit in an i32
    #[error("Jump offset too large")]
    JumpTooLarge,

    /// `break` with no enclosing loop
    #[error("Invalid break statement (not in loop)")]
    InvalidBreak,

    /// `continue` with no enclosing loop
    #[error("Invalid continue statement (not in loop)")]
    InvalidContinue,

    /// Jump to a label that does not enclose the statement
    #[error("Undefined label: {label}")]
    UndefinedLabel {
        /// Label name
        label: String,
    },

    /// Duplicate function name in a module
    #[error("Duplicate function: {name}")]
    DuplicateFunction {
        /// Function name
        name: String,
    },

    /// Emitter invariant violated
    #[error("Internal compiler error: {message}")]
    InternalError {
        /// Description
        message: String,
    },

    /// Generated bytecode failed verification
    #[error("Bytecode verification failed: {message}")]
    Verification {
        /// Verifier message
        message: String,
    },
}

impl CompileError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
