//! List iterators
//!
//! The only iterables are lists. An iterator remembers whether it was closed
//! early (by `break`, `return` or a throw out of a for-of body) so hosts can
//! observe iterator cleanup. Running to exhaustion does not close it.

use super::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct ListIterator {
    items: Vec<Value>,
    position: usize,
    closed: bool,
    close_error: Option<Value>,
}

/// Shared handle to an iterator
#[derive(Debug, Clone)]
pub struct IteratorRef(Arc<Mutex<ListIterator>>);

impl IteratorRef {
    /// Iterate over `items`
    pub fn from_values(items: Vec<Value>) -> Self {
        Self(Arc::new(Mutex::new(ListIterator {
            items,
            position: 0,
            closed: false,
            close_error: None,
        })))
    }

    /// Make `close` throw `error`
    pub fn with_close_error(self, error: Value) -> Self {
        self.0.lock().close_error = Some(error);
        self
    }

    /// Next value, or `None` when done
    pub fn next(&self) -> Option<Value> {
        let mut it = self.0.lock();
        if it.closed {
            return None;
        }
        let value = it.items.get(it.position).cloned()?;
        it.position += 1;
        Some(value)
    }

    /// Close the iterator early
    pub fn close(&self) -> Result<(), Value> {
        let mut it = self.0.lock();
        it.closed = true;
        match it.close_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.0.lock().closed
    }

    /// Number of values handed out so far
    pub fn position(&self) -> usize {
        self.0.lock().position
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_does_not_close() {
        let it = IteratorRef::from_values(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(it.next().and_then(|v| v.as_int()), Some(1));
        assert_eq!(it.next().and_then(|v| v.as_int()), Some(2));
        assert!(it.next().is_none());
        assert!(!it.is_closed());
        assert_eq!(it.position(), 2);
    }

    #[test]
    fn test_close_stops_iteration() {
        let it = IteratorRef::from_values(vec![Value::Int(1), Value::Int(2)]);
        it.next();
        it.close().unwrap();
        assert!(it.is_closed());
        assert!(it.next().is_none());
    }

    #[test]
    fn test_close_error() {
        let it = IteratorRef::from_values(vec![]).with_close_error(Value::error("close"));
        assert!(it.close().is_err());
        assert!(it.close().is_ok());
    }
}
