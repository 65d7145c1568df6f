//! Shared harness for the engine integration tests
//!
//! Host natives append to a shared event log so tests can assert the exact
//! order of dispose calls, awaits and user-visible effects.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use usingvm_engine::{
    compile_module, ErrorKind, FunctionDecl, Promise, TaskId, TaskStatus, Value, Vm, VmOptions,
    WellKnownSymbol,
};

/// Shared event log
pub type Log = Arc<Mutex<Vec<String>>>;

/// A VM preloaded with logging natives
///
/// | global                 | behaviour                                              |
/// |------------------------|--------------------------------------------------------|
/// | `log(x)`               | appends `x`                                            |
/// | `fail(msg)`            | throws `Error(msg)`                                    |
/// | `resource(n)`          | `[Symbol.dispose]` appends `dispose n`                 |
/// | `failing(n)`           | `[Symbol.dispose]` appends `dispose n`, throws `Error(n)` |
/// | `async_resource(n)`    | `[Symbol.asyncDispose]` appends `async n`, resolves    |
/// | `async_failing(n)`     | `[Symbol.asyncDispose]` appends `async n`, rejects     |
/// | `deferred_resource(n)` | `[Symbol.asyncDispose]` returns a pending promise      |
/// | `pending()`            | returns a pending promise kept in `pending`            |
pub struct Harness {
    pub vm: Vm,
    pub log: Log,
    pub pending: Arc<Mutex<Vec<Promise>>>,
}

fn arg_name(args: &[Value]) -> String {
    args.first().map(|v| v.to_string()).unwrap_or_default()
}

/// A resource whose sync dispose logs and optionally throws
pub fn sync_resource(log: &Log, name: &str, fail: bool) -> Value {
    let log = Arc::clone(log);
    let name = name.to_string();
    Value::object([(
        WellKnownSymbol::Dispose,
        Value::function("dispose", move |_, _| {
            log.lock().push(format!("dispose {}", name));
            if fail {
                Err(Value::error(name.clone()))
            } else {
                Ok(Value::Undefined)
            }
        }),
    )])
}

/// A resource whose async dispose logs and returns a settled promise
pub fn async_resource(log: &Log, name: &str, fail: bool) -> Value {
    let log = Arc::clone(log);
    let name = name.to_string();
    Value::object([(
        WellKnownSymbol::AsyncDispose,
        Value::function("asyncDispose", move |_, _| {
            log.lock().push(format!("async {}", name));
            Ok(Value::Promise(if fail {
                Promise::rejected(Value::error(name.clone()))
            } else {
                Promise::resolved(Value::Undefined)
            }))
        }),
    )])
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(VmOptions {
            step_budget: Some(1_000_000),
            ..VmOptions::default()
        })
    }

    pub fn with_options(options: VmOptions) -> Self {
        let mut vm = Vm::with_options(options);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let pending: Arc<Mutex<Vec<Promise>>> = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        vm.register_native("log", move |_, args| {
            l.lock().push(arg_name(args));
            Ok(Value::Undefined)
        });
        vm.register_native("fail", |_, args| Err(Value::error(arg_name(args))));

        let l = Arc::clone(&log);
        vm.register_native("resource", move |_, args| Ok(sync_resource(&l, &arg_name(args), false)));
        let l = Arc::clone(&log);
        vm.register_native("failing", move |_, args| Ok(sync_resource(&l, &arg_name(args), true)));
        let l = Arc::clone(&log);
        vm.register_native("async_resource", move |_, args| {
            Ok(async_resource(&l, &arg_name(args), false))
        });
        let l = Arc::clone(&log);
        vm.register_native("async_failing", move |_, args| {
            Ok(async_resource(&l, &arg_name(args), true))
        });

        let (l, p) = (Arc::clone(&log), Arc::clone(&pending));
        vm.register_native("deferred_resource", move |_, args| {
            let (log, pending, name) = (Arc::clone(&l), Arc::clone(&p), arg_name(args));
            Ok(Value::object([(
                WellKnownSymbol::AsyncDispose,
                Value::function("asyncDispose", move |_, _| {
                    log.lock().push(format!("async {}", name));
                    let promise = Promise::new();
                    pending.lock().push(promise.clone());
                    Ok(Value::Promise(promise))
                }),
            )]))
        });

        let p = Arc::clone(&pending);
        vm.register_native("pending", move |_, _| {
            let promise = Promise::new();
            p.lock().push(promise.clone());
            Ok(Value::Promise(promise))
        });

        Self { vm, log, pending }
    }

    /// Compile, load and spawn `entry` without running it
    pub fn spawn(&mut self, decls: Vec<FunctionDecl>, entry: &str) -> TaskId {
        let module = compile_module("test", &decls).expect("compile");
        let module = self.vm.load(module).expect("load");
        self.vm.spawn(&module, entry, Vec::new()).expect("spawn")
    }

    /// Compile and load `decls`, then spawn each entry in order
    pub fn spawn_all(&mut self, decls: Vec<FunctionDecl>, entries: &[&str]) -> Vec<TaskId> {
        let module = compile_module("test", &decls).expect("compile");
        let module = self.vm.load(module).expect("load");
        entries
            .iter()
            .map(|entry| self.vm.spawn(&module, entry, Vec::new()).expect("spawn"))
            .collect()
    }

    /// Run until idle and report `id`'s status
    pub fn settle(&mut self, id: TaskId) -> TaskStatus {
        self.vm.run_until_idle().expect("run");
        self.vm.status(id).expect("status")
    }

    /// Compile, load and run `entry` until idle
    pub fn run(&mut self, decls: Vec<FunctionDecl>, entry: &str) -> TaskStatus {
        let id = self.spawn(decls, entry);
        self.settle(id)
    }

    /// Run a single function named `main`
    pub fn run_main(&mut self, main: FunctionDecl) -> TaskStatus {
        self.run(vec![main], "main")
    }

    /// Snapshot of the event log
    pub fn events(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Fulfil the oldest pending promise
    pub fn resolve_next(&self, value: Value) {
        let promise = self.pending.lock().remove(0);
        promise.resolve(value);
    }

    /// Reject the oldest pending promise
    pub fn reject_next(&self, reason: Value) {
        let promise = self.pending.lock().remove(0);
        promise.reject(reason);
    }

    /// Number of promises handed out and not yet settled by the test
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Message of an `Error` value
pub fn message(value: &Value) -> String {
    value.as_error().map(|e| e.message.clone()).unwrap_or_default()
}

/// `(error, suppressed)` of a `SuppressedError`
pub fn suppressed_parts(value: &Value) -> (Value, Value) {
    let err = value.as_error().expect("error object");
    assert_eq!(err.kind, ErrorKind::SuppressedError, "expected SuppressedError, got {}", value);
    (
        err.error.clone().expect("error"),
        err.suppressed.clone().expect("suppressed"),
    )
}

/// The thrown value of a task that must have thrown
pub fn thrown(status: &TaskStatus) -> Value {
    match status {
        TaskStatus::Threw(v) => v.clone(),
        other => panic!("expected throw, got {:?}", other),
    }
}

/// The returned value of a task that must have returned
pub fn returned(status: &TaskStatus) -> Value {
    match status {
        TaskStatus::Returned(v) => v.clone(),
        other => panic!("expected return, got {:?}", other),
    }
}
