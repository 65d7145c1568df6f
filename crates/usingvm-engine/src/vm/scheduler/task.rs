//! Task representation
//!
//! A task is one invocation of a compiled function together with its
//! suspended frame. Async functions and generators suspend on `AWAIT` and
//! `YIELD`; the scheduler decides when they continue.

use crate::compiler::bytecode::FunctionKind;
use crate::vm::frame::Frame;
use crate::vm::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Generate a new unique task ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created but never run (generators wait for their first `next()`)
    Created,
    /// Queued or currently executing
    Running,
    /// Suspended on `AWAIT`
    Awaiting,
    /// Suspended on `YIELD`
    Yielded,
    /// Returned a value
    Completed,
    /// Threw an uncaught exception
    Threw,
    /// Hit a VM error
    Failed,
}

impl TaskState {
    /// Whether the task can no longer run
    pub fn is_finished(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Threw | TaskState::Failed)
    }
}

/// Why a task stopped running without finishing
#[derive(Debug, Clone)]
pub enum SuspendReason {
    /// `AWAIT` on a value or promise
    Await(Value),
    /// `YIELD` of a value
    Yield(Value),
}

/// How a suspended task continues
#[derive(Debug, Clone)]
pub enum ResumeMode {
    /// First run from the function entry
    Start,
    /// Continue with a value pushed on the stack
    Next(Value),
    /// Continue by throwing at the suspension point
    Throw(Value),
    /// Close a generator at its suspension point
    Return(Value),
}

/// Observable outcome of a task
#[derive(Debug, Clone)]
pub enum TaskStatus {
    /// Not finished and not yielded
    Pending,
    /// Generator suspended at `yield` with this value
    Yielded(Value),
    /// Finished with a return value
    Returned(Value),
    /// Finished with an uncaught exception
    Threw(Value),
}

impl TaskStatus {
    /// Return value, if the task returned
    pub fn returned(&self) -> Option<&Value> {
        match self {
            TaskStatus::Returned(v) => Some(v),
            _ => None,
        }
    }

    /// Exception, if the task threw
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            TaskStatus::Threw(v) => Some(v),
            _ => None,
        }
    }

    /// Yielded value, if the task is suspended at a yield
    pub fn yielded(&self) -> Option<&Value> {
        match self {
            TaskStatus::Yielded(v) => Some(v),
            _ => None,
        }
    }
}

/// A task
pub struct Task {
    id: TaskId,
    name: String,
    kind: FunctionKind,
    state: Mutex<TaskState>,
    status: Mutex<TaskStatus>,
    frame: Mutex<Frame>,
    awaits: AtomicUsize,
    yields: AtomicUsize,
}

impl Task {
    /// Create a task running `frame`
    pub fn new(frame: Frame) -> Self {
        let function = frame.function();
        let name = function.name.clone();
        let kind = function.kind;
        Self {
            id: TaskId::new(),
            name,
            kind,
            state: Mutex::new(TaskState::Created),
            status: Mutex::new(TaskStatus::Pending),
            frame: Mutex::new(frame),
            awaits: AtomicUsize::new(0),
            yields: AtomicUsize::new(0),
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Name of the function the task runs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the function the task runs
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Set the lifecycle state
    pub fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }

    /// Current observable status
    pub fn status(&self) -> TaskStatus {
        self.status.lock().clone()
    }

    /// Set the observable status
    pub fn set_status(&self, status: TaskStatus) {
        *self.status.lock() = status;
    }

    /// The suspended frame
    pub fn frame(&self) -> &Mutex<Frame> {
        &self.frame
    }

    /// Count one `AWAIT` suspension
    pub fn record_await(&self) {
        self.awaits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one `YIELD` suspension
    pub fn record_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of `AWAIT` suspensions so far
    pub fn await_count(&self) -> usize {
        self.awaits.load(Ordering::Relaxed)
    }

    /// Number of `YIELD` suspensions so far
    pub fn yield_count(&self) -> usize {
        self.yields.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_unique() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_finished_states() {
        assert!(TaskState::Completed.is_finished());
        assert!(TaskState::Threw.is_finished());
        assert!(!TaskState::Yielded.is_finished());
        assert!(!TaskState::Created.is_finished());
    }

    #[test]
    fn test_status_accessors() {
        let status = TaskStatus::Returned(Value::Int(1));
        assert_eq!(status.returned().and_then(Value::as_int), Some(1));
        assert!(status.thrown().is_none());
        assert!(TaskStatus::Yielded(Value::Null).yielded().is_some());
    }
}
