//! `await using`: suspension points, ordering and async error handling

mod common;

use common::{message, returned, suppressed_parts, thrown, Harness};
use usingvm_engine::{Expr, FunctionDecl, FunctionKind, Stmt, TaskStatus, Value};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

fn call(name: &str, arg: &str) -> Expr {
    Expr::call_global(name, vec![Expr::str(arg)])
}

fn log(text: &str) -> Stmt {
    Stmt::expr(call("log", text))
}

fn async_fn(name: &str, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl::new(name, FunctionKind::Async, body)
}

fn await_count(h: &Harness, id: usingvm_engine::TaskId) -> usize {
    h.vm.task(id).expect("task").await_count()
}

#[test]
fn test_async_resource_awaited_once() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn(
            "main",
            vec![Stmt::await_using("r", call("async_resource", "r")), log("body")],
        )],
        "main",
    );
    let status = h.settle(id);

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["body", "async r"]);
    assert_eq!(await_count(&h, id), 1);
}

#[test]
fn test_next_dispose_waits_for_previous_promise() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn(
            "main",
            vec![
                Stmt::await_using("a", call("deferred_resource", "a")),
                Stmt::await_using("b", call("deferred_resource", "b")),
                log("body"),
            ],
        )],
        "main",
    );

    assert!(matches!(h.settle(id), TaskStatus::Pending));
    assert_eq!(h.events(), ["body", "async b"]);

    h.resolve_next(Value::Undefined);
    assert!(matches!(h.settle(id), TaskStatus::Pending));
    assert_eq!(h.events(), ["body", "async b", "async a"]);

    h.resolve_next(Value::Undefined);
    assert!(returned(&h.settle(id)).is_nullish());
    assert_eq!(h.pending_count(), 0);
    assert_eq!(await_count(&h, id), 2);
}

#[test]
fn test_rejected_dispose_promise_throws() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn(
            "main",
            vec![
                Stmt::await_using("a", call("async_resource", "a")),
                Stmt::await_using("b", call("deferred_resource", "b")),
            ],
        )],
        "main",
    );
    h.settle(id);
    h.reject_next(Value::error("late"));
    let status = h.settle(id);

    // The rejection surfaces at the await and the remaining resource is
    // still disposed.
    assert_eq!(message(&thrown(&status)), "late");
    assert_eq!(h.events(), ["async b", "async a"]);
}

#[test]
fn test_null_await_using_awaits_exactly_once() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn("main", vec![Stmt::await_using("x", Expr::Null), log("body")])],
        "main",
    );
    let status = h.settle(id);

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["body"]);
    assert_eq!(await_count(&h, id), 1);
}

#[test]
fn test_null_await_using_shares_await_with_async_dispose() {
    for null_first in [true, false] {
        let mut h = Harness::new();
        let mut body = vec![
            Stmt::await_using("x", Expr::Null),
            Stmt::await_using("r", call("async_resource", "r")),
        ];
        if !null_first {
            body.reverse();
        }
        let id = h.spawn(vec![async_fn("main", body)], "main");
        let status = h.settle(id);

        assert!(returned(&status).is_nullish());
        assert_eq!(h.events(), ["async r"]);
        assert_eq!(await_count(&h, id), 1, "null first: {}", null_first);
    }
}

#[test]
fn test_pending_await_precedes_following_sync_dispose() {
    let mut h = Harness::new();
    let ids = h.spawn_all(
        vec![
            async_fn(
                "main",
                vec![
                    Stmt::using("s", call("resource", "s")),
                    Stmt::await_using("x", Expr::Null),
                ],
            ),
            async_fn("other", vec![log("other")]),
        ],
        &["main", "other"],
    );
    let status = h.settle(ids[0]);

    assert!(returned(&status).is_nullish());
    // `main` suspends before calling the sync dispose, letting `other` run.
    assert_eq!(h.events(), ["other", "dispose s"]);
    assert_eq!(await_count(&h, ids[0]), 1);
}

#[test]
fn test_sync_only_scope_in_async_function_never_awaits() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn("main", vec![Stmt::using("s", call("resource", "s"))])],
        "main",
    );
    h.settle(id);

    assert_eq!(h.events(), ["dispose s"]);
    assert_eq!(await_count(&h, id), 0);
}

#[test]
fn test_sync_dispose_used_by_await_using() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn("main", vec![Stmt::await_using("s", call("resource", "s"))])],
        "main",
    );
    let status = h.settle(id);

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["dispose s"]);
    assert_eq!(await_count(&h, id), 1);
}

#[test]
fn test_failing_sync_dispose_rejects_under_await_using() {
    let mut h = Harness::new();
    let status = h.run(
        vec![async_fn("main", vec![Stmt::await_using("s", call("failing", "s"))])],
        "main",
    );

    assert_eq!(message(&thrown(&status)), "s");
}

#[test]
fn test_return_value_preserved_across_async_disposal() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn(
            "main",
            vec![
                Stmt::await_using("r", call("deferred_resource", "r")),
                Stmt::ret(Expr::Int(42)),
            ],
        )],
        "main",
    );
    h.settle(id);
    h.resolve_next(Value::str("dispose result"));
    let status = h.settle(id);

    assert_eq!(returned(&status).as_int(), Some(42));
}

#[test]
fn test_async_dispose_error_suppresses_body_error() {
    let mut h = Harness::new();
    let status = h.run(
        vec![async_fn(
            "main",
            vec![
                Stmt::await_using("r", call("async_failing", "r")),
                Stmt::expr(call("fail", "body")),
            ],
        )],
        "main",
    );

    let (error, suppressed) = suppressed_parts(&thrown(&status));
    assert_eq!(message(&error), "r");
    assert_eq!(message(&suppressed), "body");
    assert_eq!(h.events(), ["async r"]);
}

#[test]
fn test_awaits_in_body_and_disposal_interleave() {
    let mut h = Harness::new();
    let id = h.spawn(
        vec![async_fn(
            "main",
            vec![
                Stmt::await_using("r", call("async_resource", "r")),
                Stmt::let_("v", Expr::call_global("pending", vec![]).awaited()),
                Stmt::expr(Expr::call_global("log", vec![Expr::local("v")])),
            ],
        )],
        "main",
    );
    assert!(matches!(h.settle(id), TaskStatus::Pending));
    assert!(h.events().is_empty());

    h.resolve_next(Value::str("resumed"));
    let status = h.settle(id);
    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["resumed", "async r"]);
    assert_eq!(await_count(&h, id), 2);
    assert_eq!(h.vm.stats().awaits, 2);
}
