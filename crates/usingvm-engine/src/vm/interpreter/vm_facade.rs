//! Single-threaded VM facade
//!
//! Hosts load verified modules, register globals and drive tasks through
//! [`Vm`]. Async tasks run to completion inside [`Vm::run_until_idle`];
//! generators advance one step per [`Vm::resume_generator`] call.

use super::core::Interpreter;
use super::execution::ExecutionResult;
use crate::compiler::bytecode::{verify_module, Module};
use crate::vm::frame::Frame;
use crate::vm::scheduler::{ResumeMode, Scheduler, SuspendReason, Task, TaskId, TaskState, TaskStatus};
use crate::vm::stack::DEFAULT_MAX_STACK_SIZE;
use crate::vm::value::{NativeFunction, Value};
use crate::vm::{VmError, VmResult};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// VM configuration
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Operand stack slots per task
    pub max_stack_size: usize,
    /// Maximum number of instructions executed over the VM's lifetime
    /// (`None` = unlimited)
    pub step_budget: Option<u64>,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            step_budget: None,
        }
    }
}

/// Execution counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStats {
    /// Tasks created
    pub tasks_spawned: usize,
    /// Tasks that returned
    pub tasks_completed: usize,
    /// Tasks that finished with an uncaught exception
    pub tasks_threw: usize,
    /// `AWAIT` suspensions
    pub awaits: usize,
    /// `YIELD` suspensions
    pub yields: usize,
    /// Instructions executed
    pub steps: u64,
}

/// UsingVM virtual machine
pub struct Vm {
    options: VmOptions,
    globals: FxHashMap<String, Value>,
    scheduler: Scheduler,
    stats: VmStats,
    steps: u64,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a VM with default options
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    /// Create a VM with the given options
    pub fn with_options(options: VmOptions) -> Self {
        Self {
            options,
            globals: FxHashMap::default(),
            scheduler: Scheduler::new(),
            stats: VmStats::default(),
            steps: 0,
        }
    }

    /// VM options
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Define or replace a global
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    /// Define a global host function
    pub fn register_native<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.set_global(name, Value::Function(NativeFunction::new(name, func)));
    }

    /// Read a global
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Verify a module and make it shareable between tasks
    pub fn load(&self, module: Module) -> VmResult<Arc<Module>> {
        verify_module(&module)?;
        log::debug!("loaded module '{}' ({} functions)", module.name, module.functions.len());
        Ok(Arc::new(module))
    }

    /// Create a task running `function`
    ///
    /// Normal and async functions are queued immediately. Generators start
    /// suspended and run on their first [`Vm::resume_generator`].
    pub fn spawn(&mut self, module: &Arc<Module>, function: &str, args: Vec<Value>) -> VmResult<TaskId> {
        let index = module
            .functions
            .iter()
            .position(|f| f.name == function)
            .ok_or_else(|| VmError::FunctionNotFound(function.to_string()))?;
        let frame = Frame::new(Arc::clone(module), index, args, self.options.max_stack_size);
        let task = Arc::new(Task::new(frame));
        let id = task.id();
        let kind = task.kind();

        self.scheduler.insert(task);
        self.stats.tasks_spawned += 1;
        if !kind.is_generator() {
            self.scheduler.enqueue(id, ResumeMode::Start);
        }
        log::debug!("spawned {} running '{}' ({:?})", id, function, kind);
        Ok(id)
    }

    /// Run queued tasks until every task is finished, yielded or parked on
    /// a promise that nothing will settle
    pub fn run_until_idle(&mut self) -> VmResult<()> {
        loop {
            while let Some((id, mode)) = self.scheduler.pop_ready() {
                let task = self.task(id)?;
                self.execute(&task, mode)?;
            }
            if self.scheduler.promote_settled() == 0 {
                break;
            }
        }
        if self.scheduler.waiting_count() > 0 {
            log::debug!("{} task(s) parked on pending promises", self.scheduler.waiting_count());
        }
        Ok(())
    }

    /// Spawn `function`, run until idle and report the task's status
    pub fn run(&mut self, module: &Arc<Module>, function: &str, args: Vec<Value>) -> VmResult<TaskStatus> {
        let id = self.spawn(module, function, args)?;
        self.run_until_idle()?;
        self.status(id)
    }

    /// Advance a generator task
    ///
    /// `Start` and `Next` run it to its next `yield`; `Throw` raises at the
    /// suspension point; `Return` closes it, running finally code and
    /// disposals on the way out. A finished generator reports its final
    /// status unchanged.
    pub fn resume_generator(&mut self, id: TaskId, mode: ResumeMode) -> VmResult<TaskStatus> {
        let task = self.task(id)?;
        if !task.kind().is_generator() {
            return Err(VmError::NotAGenerator(id));
        }

        match task.state() {
            TaskState::Created => match mode {
                ResumeMode::Start | ResumeMode::Next(_) => {
                    task.set_state(TaskState::Running);
                    self.scheduler.enqueue(id, ResumeMode::Start);
                }
                ResumeMode::Return(value) => Self::finish(&task, TaskState::Completed, TaskStatus::Returned(value)),
                ResumeMode::Throw(exception) => Self::finish(&task, TaskState::Threw, TaskStatus::Threw(exception)),
            },
            TaskState::Yielded => {
                let mode = match mode {
                    ResumeMode::Start => ResumeMode::Next(Value::Undefined),
                    mode => mode,
                };
                task.set_state(TaskState::Running);
                task.set_status(TaskStatus::Pending);
                self.scheduler.enqueue(id, mode);
            }
            TaskState::Running | TaskState::Awaiting => return Err(VmError::TaskBusy(id)),
            TaskState::Completed | TaskState::Threw | TaskState::Failed => {}
        }

        self.run_until_idle()?;
        self.status(id)
    }

    /// Observable status of a task
    pub fn status(&self, id: TaskId) -> VmResult<TaskStatus> {
        Ok(self.task(id)?.status())
    }

    /// Look up a task
    pub fn task(&self, id: TaskId) -> VmResult<Arc<Task>> {
        self.scheduler.get(id).ok_or(VmError::TaskNotFound(id))
    }

    /// Execution counters
    pub fn stats(&self) -> VmStats {
        VmStats {
            steps: self.steps,
            ..self.stats
        }
    }

    fn finish(task: &Task, state: TaskState, status: TaskStatus) {
        task.set_state(state);
        task.set_status(status);
    }

    fn execute(&mut self, task: &Arc<Task>, mode: ResumeMode) -> VmResult<()> {
        task.set_state(TaskState::Running);
        let result = {
            let mut interpreter = Interpreter::new(&self.globals, &mut self.steps, self.options.step_budget);
            interpreter.run(task, mode)
        };

        match result {
            ExecutionResult::Completed(value) => {
                log::debug!("{} returned {}", task.id(), value);
                self.stats.tasks_completed += 1;
                Self::finish(task, TaskState::Completed, TaskStatus::Returned(value));
            }
            ExecutionResult::Threw(exception) => {
                log::debug!("{} threw {}", task.id(), exception);
                self.stats.tasks_threw += 1;
                Self::finish(task, TaskState::Threw, TaskStatus::Threw(exception));
            }
            ExecutionResult::Suspended(SuspendReason::Await(value)) => {
                log::trace!("{} awaits {}", task.id(), value);
                task.record_await();
                self.stats.awaits += 1;
                task.set_state(TaskState::Awaiting);
                self.scheduler.schedule_await(task.id(), value);
            }
            ExecutionResult::Suspended(SuspendReason::Yield(value)) => {
                log::trace!("{} yields {}", task.id(), value);
                task.record_yield();
                self.stats.yields += 1;
                Self::finish(task, TaskState::Yielded, TaskStatus::Yielded(value));
            }
            ExecutionResult::Failed(error) => {
                log::error!("{} failed: {}", task.id(), error);
                task.set_state(TaskState::Failed);
                return Err(error);
            }
        }
        Ok(())
    }
}
