//! Disposable resource registration
//!
//! `using` and `await using` declarations register their value with the
//! innermost [`DisposeCapability`]. Registration resolves the dispose method
//! up front, so a missing or non-callable method fails at the declaration
//! rather than at scope exit.

use super::object::WellKnownSymbol;
use super::promise::Promise;
use super::value::{NativeFunction, Value};
pub use crate::compiler::bytecode::UsingHint;

/// A registered resource
#[derive(Debug, Clone)]
pub struct DisposableResource {
    /// The registered value; `this` for the dispose call
    pub value: Value,
    /// How the resource was declared
    pub hint: UsingHint,
    /// Resolved dispose method; `None` for `await using x = null`
    pub method: Option<Value>,
}

/// Resources registered by one scope, in registration order
#[derive(Debug, Default)]
pub struct DisposeCapability {
    resources: Vec<DisposableResource>,
}

impl DisposeCapability {
    /// Create an empty capability
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource
    pub fn add(&mut self, resource: DisposableResource) {
        self.resources.push(resource);
    }

    /// Drain every registered resource, leaving the capability empty
    pub fn take(&mut self) -> Vec<DisposableResource> {
        std::mem::take(&mut self.resources)
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Resolve the dispose method of `value` for `hint`
///
/// `await using` prefers `[Symbol.asyncDispose]` and falls back to
/// `[Symbol.dispose]`, wrapped so the call yields a promise that settles
/// with the sync method's outcome. Returns `Ok(None)` when no method exists.
pub fn get_dispose_method(value: &Value, hint: UsingHint) -> Result<Option<Value>, Value> {
    let Some(object) = value.as_object() else {
        return Ok(None);
    };

    if hint == UsingHint::Async {
        let method = object.get(&WellKnownSymbol::AsyncDispose.into());
        if !method.is_nullish() {
            return callable(method, WellKnownSymbol::AsyncDispose).map(Some);
        }
        let method = object.get(&WellKnownSymbol::Dispose.into());
        if method.is_nullish() {
            return Ok(None);
        }
        let Value::Function(sync) = callable(method, WellKnownSymbol::Dispose)? else {
            return Ok(None);
        };
        let name = sync.name().to_string();
        let wrapper = NativeFunction::new(&name, move |this, _| {
            Ok(Value::Promise(match sync.call(this, &[]) {
                Ok(_) => Promise::resolved(Value::Undefined),
                Err(e) => Promise::rejected(e),
            }))
        });
        return Ok(Some(Value::Function(wrapper)));
    }

    let method = object.get(&WellKnownSymbol::Dispose.into());
    if method.is_nullish() {
        return Ok(None);
    }
    callable(method, WellKnownSymbol::Dispose).map(Some)
}

fn callable(method: Value, symbol: WellKnownSymbol) -> Result<Value, Value> {
    if method.is_callable() {
        Ok(method)
    } else {
        Err(Value::type_error(format!("[{}] is not a function", symbol.name())))
    }
}

/// Build the record for a `using` declaration
///
/// `Ok(None)` means nothing is registered (`using x = null`).
pub fn create_disposable_resource(value: Value, hint: UsingHint) -> Result<Option<DisposableResource>, Value> {
    if value.is_nullish() {
        return Ok(match hint {
            UsingHint::Sync => None,
            UsingHint::Async => Some(DisposableResource {
                value: Value::Undefined,
                hint,
                method: None,
            }),
        });
    }

    if value.as_object().is_none() {
        return Err(Value::type_error(format!(
            "using declarations require an object, got {}",
            value.type_name()
        )));
    }

    match get_dispose_method(&value, hint)? {
        Some(method) => Ok(Some(DisposableResource {
            value,
            hint,
            method: Some(method),
        })),
        None => {
            let symbol = match hint {
                UsingHint::Sync => WellKnownSymbol::Dispose,
                UsingHint::Async => WellKnownSymbol::AsyncDispose,
            };
            Err(Value::type_error(format!(
                "Object is not disposable (missing [{}])",
                symbol.name()
            )))
        }
    }
}
