//! Cooperative task scheduler
//!
//! Tasks run one at a time on the calling thread. A task that awaits is
//! either re-queued behind the tasks already ready (plain values and settled
//! promises continue on the next turn) or parked until its promise settles.
//! Parked tasks are polled in the order they suspended.

mod task;

pub use task::{ResumeMode, SuspendReason, Task, TaskId, TaskState, TaskStatus};

use crate::vm::promise::{Promise, PromiseState};
use crate::vm::value::Value;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Run queue plus the set of tasks parked on pending promises
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: FxHashMap<TaskId, Arc<Task>>,
    ready: VecDeque<(TaskId, ResumeMode)>,
    waiting: Vec<(TaskId, Promise)>,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a task without queueing it
    pub fn insert(&mut self, task: Arc<Task>) {
        self.tasks.insert(task.id(), task);
    }

    /// Look up a task
    pub fn get(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks.get(&id).cloned()
    }

    /// Queue a task to continue with `mode`
    pub fn enqueue(&mut self, id: TaskId, mode: ResumeMode) {
        self.ready.push_back((id, mode));
    }

    /// Next runnable task
    pub fn pop_ready(&mut self) -> Option<(TaskId, ResumeMode)> {
        self.ready.pop_front()
    }

    /// Schedule the continuation of a task that awaited `awaited`
    pub fn schedule_await(&mut self, id: TaskId, awaited: Value) {
        match awaited {
            Value::Promise(promise) => match promise.state() {
                PromiseState::Pending => self.waiting.push((id, promise)),
                PromiseState::Fulfilled(value) => self.enqueue(id, ResumeMode::Next(value)),
                PromiseState::Rejected(reason) => self.enqueue(id, ResumeMode::Throw(reason)),
            },
            value => self.enqueue(id, ResumeMode::Next(value)),
        }
    }

    /// Move tasks whose promises settled to the run queue
    ///
    /// Returns the number of tasks woken.
    pub fn promote_settled(&mut self) -> usize {
        let mut woken = 0;
        let mut still_waiting = Vec::with_capacity(self.waiting.len());
        for (id, promise) in std::mem::take(&mut self.waiting) {
            match promise.state() {
                PromiseState::Pending => still_waiting.push((id, promise)),
                PromiseState::Fulfilled(value) => {
                    self.enqueue(id, ResumeMode::Next(value));
                    woken += 1;
                }
                PromiseState::Rejected(reason) => {
                    self.enqueue(id, ResumeMode::Throw(reason));
                    woken += 1;
                }
            }
        }
        self.waiting = still_waiting;
        woken
    }

    /// Number of tasks parked on pending promises
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Whether nothing is queued or parked
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (TaskId, TaskId) {
        (TaskId::new(), TaskId::new())
    }

    #[test]
    fn test_plain_value_requeues() {
        let mut sched = Scheduler::new();
        let (a, _) = ids();
        sched.schedule_await(a, Value::Int(7));
        match sched.pop_ready() {
            Some((id, ResumeMode::Next(v))) => {
                assert_eq!(id, a);
                assert_eq!(v.as_int(), Some(7));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(sched.is_idle());
    }

    #[test]
    fn test_rejected_promise_resumes_with_throw() {
        let mut sched = Scheduler::new();
        let (a, _) = ids();
        sched.schedule_await(a, Value::Promise(Promise::rejected(Value::error("x"))));
        assert!(matches!(sched.pop_ready(), Some((_, ResumeMode::Throw(_)))));
    }

    #[test]
    fn test_pending_promises_wake_in_suspension_order() {
        let mut sched = Scheduler::new();
        let (a, b) = ids();
        let pa = Promise::new();
        let pb = Promise::new();
        sched.schedule_await(a, Value::Promise(pa.clone()));
        sched.schedule_await(b, Value::Promise(pb.clone()));
        assert_eq!(sched.promote_settled(), 0);
        assert_eq!(sched.waiting_count(), 2);

        pb.resolve(Value::Int(2));
        pa.resolve(Value::Int(1));
        assert_eq!(sched.promote_settled(), 2);
        assert_eq!(sched.pop_ready().map(|(id, _)| id), Some(a));
        assert_eq!(sched.pop_ready().map(|(id, _)| id), Some(b));
    }
}
