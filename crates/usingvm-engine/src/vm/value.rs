//! Runtime values
//!
//! Values are cheap to clone: primitives are stored inline and heap entities
//! (objects, errors, promises, iterators, lists) are shared through `Arc`.
//! Reference identity is what `strict_equals` compares for heap entities.

use super::disposal::DisposableResource;
use super::iterator::IteratorRef;
use super::object::ObjectRef;
use super::promise::Promise;
use std::fmt;
use std::sync::Arc;

/// Signature of a host function: `(this, args) -> Ok(result) | Err(thrown)`
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync;

/// A callable host function
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    /// Wrap a closure as a callable value
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Function name, for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        (self.func)(this, args)
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// Error constructor family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `Error`
    Error,
    /// `TypeError`
    TypeError,
    /// `ReferenceError`
    ReferenceError,
    /// `SuppressedError`
    SuppressedError,
}

impl ErrorKind {
    /// Constructor name
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::ReferenceError => "ReferenceError",
            Self::SuppressedError => "SuppressedError",
        }
    }
}

/// An error object
///
/// A `SuppressedError` links the newer failure (`error`) to the one it
/// superseded (`suppressed`), so a chain of disposal failures reads from
/// newest to oldest.
#[derive(Debug)]
pub struct ErrorObject {
    /// Constructor family
    pub kind: ErrorKind,
    /// Message text
    pub message: String,
    /// The newer error (`SuppressedError` only)
    pub error: Option<Value>,
    /// The superseded error (`SuppressedError` only)
    pub suppressed: Option<Value>,
}

/// A runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// Immutable string
    Str(Arc<str>),
    /// Plain object
    Object(ObjectRef),
    /// Host function
    Function(NativeFunction),
    /// Error object
    Error(Arc<ErrorObject>),
    /// Promise
    Promise(Promise),
    /// Iterator over a list of values
    Iterator(IteratorRef),
    /// Immutable list
    List(Arc<Vec<Value>>),
    /// A registered disposable resource record
    Resource(Arc<DisposableResource>),
    /// Internal exception used to unwind a generator closed by `return()`
    GeneratorClosing,
}

impl Value {
    /// String value
    pub fn str(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }

    /// List value
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Arc::new(values))
    }

    /// Host function value
    pub fn function<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Value::Function(NativeFunction::new(name, func))
    }

    fn make_error(kind: ErrorKind, message: String) -> Self {
        Value::Error(Arc::new(ErrorObject {
            kind,
            message,
            error: None,
            suppressed: None,
        }))
    }

    /// `new Error(message)`
    pub fn error(message: impl Into<String>) -> Self {
        Self::make_error(ErrorKind::Error, message.into())
    }

    /// `new TypeError(message)`
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::make_error(ErrorKind::TypeError, message.into())
    }

    /// `new ReferenceError(message)`
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::make_error(ErrorKind::ReferenceError, message.into())
    }

    /// `new SuppressedError(error, suppressed)`
    pub fn suppressed_error(error: Value, suppressed: Value) -> Self {
        Value::Error(Arc::new(ErrorObject {
            kind: ErrorKind::SuppressedError,
            message: "An error was suppressed during disposal".to_string(),
            error: Some(error),
            suppressed: Some(suppressed),
        }))
    }

    /// `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// ToBoolean
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Whether the value can be called
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Error payload
    pub fn as_error(&self) -> Option<&ErrorObject> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// `typeof`-style name, for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            Value::Object(_)
            | Value::Error(_)
            | Value::Promise(_)
            | Value::Iterator(_)
            | Value::List(_) => "object",
            Value::Resource(_) | Value::GeneratorClosing => "internal",
        }
    }

    /// `===`: primitives by value, heap entities by identity
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::GeneratorClosing, Value::GeneratorClosing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Iterator(a), Value::Iterator(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Resource(a), Value::Resource(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Error(e) => {
                if e.message.is_empty() {
                    write!(f, "{}", e.kind.name())
                } else {
                    write!(f, "{}: {}", e.kind.name(), e.message)
                }
            }
            Value::Promise(_) => write!(f, "[object Promise]"),
            Value::Iterator(_) => write!(f, "[object Iterator]"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Resource(_) => write!(f, "[resource]"),
            Value::GeneratorClosing => write!(f, "[generator closing]"),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::error("x").is_truthy());
        assert!(Value::GeneratorClosing.is_truthy());
    }

    #[test]
    fn test_strict_equals_uses_identity_for_errors() {
        let a = Value::error("boom");
        let b = Value::error("boom");
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
        assert!(Value::str("x").strict_equals(&Value::str("x")));
    }

    #[test]
    fn test_suppressed_error_links() {
        let newer = Value::error("newer");
        let older = Value::error("older");
        let chained = Value::suppressed_error(newer.clone(), older.clone());
        let err = chained.as_error().unwrap();
        assert_eq!(err.kind, ErrorKind::SuppressedError);
        assert!(err.error.as_ref().unwrap().strict_equals(&newer));
        assert!(err.suppressed.as_ref().unwrap().strict_equals(&older));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::type_error("bad").to_string(), "TypeError: bad");
        assert_eq!(Value::list(vec![1.into(), "a".into()]).to_string(), "[1, a]");
    }

    #[test]
    fn test_native_function_call() {
        let f = NativeFunction::new("add1", |_, args| {
            Ok(Value::Int(args[0].as_int().unwrap_or(0) + 1))
        });
        assert_eq!(f.call(&Value::Undefined, &[Value::Int(41)]).unwrap().as_int(), Some(42));
        assert_eq!(format!("{:?}", f), "[Function: add1]");
    }
}
