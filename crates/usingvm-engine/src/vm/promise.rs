//! Promises
//!
//! A promise is a shared settle-once cell. The scheduler polls promises that
//! tasks are suspended on and resumes the task once the promise settles.

use super::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

/// Settlement state
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not settled yet
    Pending,
    /// Fulfilled with a value
    Fulfilled(Value),
    /// Rejected with a reason
    Rejected(Value),
}

/// Shared handle to a promise
#[derive(Debug, Clone)]
pub struct Promise(Arc<Mutex<PromiseState>>);

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl Promise {
    /// Create a pending promise
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(PromiseState::Pending)))
    }

    /// Create a promise already fulfilled with `value`
    pub fn resolved(value: Value) -> Self {
        Self(Arc::new(Mutex::new(PromiseState::Fulfilled(value))))
    }

    /// Create a promise already rejected with `reason`
    pub fn rejected(reason: Value) -> Self {
        Self(Arc::new(Mutex::new(PromiseState::Rejected(reason))))
    }

    /// Fulfill a pending promise; returns false if it was already settled
    pub fn resolve(&self, value: Value) -> bool {
        self.settle(PromiseState::Fulfilled(value))
    }

    /// Reject a pending promise; returns false if it was already settled
    pub fn reject(&self, reason: Value) -> bool {
        self.settle(PromiseState::Rejected(reason))
    }

    fn settle(&self, state: PromiseState) -> bool {
        let mut current = self.0.lock();
        if matches!(*current, PromiseState::Pending) {
            *current = state;
            true
        } else {
            false
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PromiseState {
        self.0.lock().clone()
    }

    /// Whether the promise has settled
    pub fn is_settled(&self) -> bool {
        !matches!(*self.0.lock(), PromiseState::Pending)
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
