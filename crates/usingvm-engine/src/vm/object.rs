//! Plain objects
//!
//! Objects are property bags keyed by names or by the two well-known
//! disposal symbols. They are shared by reference and mutated under a lock.

use super::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Well-known symbols understood by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    /// `Symbol.dispose`
    Dispose,
    /// `Symbol.asyncDispose`
    AsyncDispose,
}

impl WellKnownSymbol {
    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Dispose => "Symbol.dispose",
            Self::AsyncDispose => "Symbol.asyncDispose",
        }
    }
}

/// Property key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String-named property
    Name(Arc<str>),
    /// Symbol-keyed property
    Symbol(WellKnownSymbol),
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(Arc::from(name))
    }
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(symbol: WellKnownSymbol) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

/// Object storage
#[derive(Debug, Default)]
pub struct Object {
    properties: FxHashMap<PropertyKey, Value>,
}

/// Shared handle to an object
#[derive(Debug, Clone, Default)]
pub struct ObjectRef(Arc<Mutex<Object>>);

impl ObjectRef {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a property; missing properties read as `undefined`
    pub fn get(&self, key: &PropertyKey) -> Value {
        self.0.lock().properties.get(key).cloned().unwrap_or_default()
    }

    /// Write a property
    pub fn set(&self, key: impl Into<PropertyKey>, value: Value) {
        self.0.lock().properties.insert(key.into(), value);
    }

    /// Whether the property exists
    pub fn has(&self, key: &PropertyKey) -> bool {
        self.0.lock().properties.contains_key(key)
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    /// Build an object value from `(key, value)` pairs
    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<PropertyKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let object = ObjectRef::new();
        for (key, value) in properties {
            object.set(key, value);
        }
        Value::Object(object)
    }

    /// Object payload
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}
