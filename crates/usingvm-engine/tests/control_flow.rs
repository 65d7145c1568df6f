//! Non-local jumps out of disposable scopes and for-of iterator closing

mod common;

use common::{message, returned, suppressed_parts, thrown, Harness};
use parking_lot::Mutex;
use std::sync::Arc;
use usingvm_engine::{
    Expr, FunctionDecl, FunctionKind, IteratorRef, Stmt, UsingHint, Value, WellKnownSymbol,
};

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

fn log_local(name: &str) -> Stmt {
    Stmt::expr(Expr::call_global("log", vec![Expr::local(name)]))
}

fn main(body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl::new("main", FunctionKind::Normal, body)
}

fn forever(label: Option<&str>, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        label: label.map(str::to_string),
        cond: Expr::Bool(true),
        body,
    }
}

fn for_of(binding: &str, using: Option<UsingHint>, iterable: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::ForOf {
        label: None,
        binding: binding.to_string(),
        using,
        iterable,
        body,
    }
}

fn strings(items: &[&str]) -> Value {
    Value::list(items.iter().map(|s| Value::str(s)).collect())
}

fn break_outer_with(resource: &str) -> FunctionDecl {
    main(vec![
        forever(
            Some("outer"),
            vec![
                forever(
                    None,
                    vec![
                        Stmt::using("a", call(resource, "a")),
                        log("inner"),
                        Stmt::Break(Some("outer".into())),
                    ],
                ),
                log("not reached"),
            ],
        ),
        log("after"),
    ])
}

#[test]
fn test_labeled_break_disposes_before_jumping() {
    let mut h = Harness::new();
    let status = h.run_main(break_outer_with("resource"));

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["inner", "dispose a", "after"]);
}

#[test]
fn test_labeled_break_abandoned_when_disposal_throws() {
    let mut h = Harness::new();
    let status = h.run_main(break_outer_with("failing"));

    assert_eq!(message(&thrown(&status)), "a");
    assert_eq!(h.events(), ["inner", "dispose a"]);
}

#[test]
fn test_return_disposes_every_enclosing_scope() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("outer", call("resource", "outer")),
        Stmt::Block(vec![
            Stmt::using("inner", call("resource", "inner")),
            Stmt::ret(Expr::Int(7)),
        ]),
        log("not reached"),
    ]));

    assert_eq!(returned(&status).as_int(), Some(7));
    assert_eq!(h.events(), ["dispose inner", "dispose outer"]);
}

#[test]
fn test_return_with_failing_inner_disposal_still_disposes_outer() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("outer", call("failing", "outer")),
        Stmt::Block(vec![
            Stmt::using("inner", call("failing", "inner")),
            Stmt::ret(Expr::Int(7)),
        ]),
    ]));

    let (error, suppressed) = suppressed_parts(&thrown(&status));
    assert_eq!(message(&error), "outer");
    assert_eq!(message(&suppressed), "inner");
    assert_eq!(h.events(), ["dispose inner", "dispose outer"]);
}

#[test]
fn test_continue_disposes_each_iteration() {
    let mut h = Harness::new();
    h.vm.set_global("names", strings(&["a", "b"]));
    let status = h.run_main(main(vec![
        for_of(
            "name",
            None,
            Expr::global("names"),
            vec![
                Stmt::using("r", Expr::call_global("resource", vec![Expr::local("name")])),
                log_local("name"),
                Stmt::Continue(None),
            ],
        ),
        log("done"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["a", "dispose a", "b", "dispose b", "done"]);
}

#[test]
fn test_break_inside_catch_body_disposes_once() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        forever(
            None,
            vec![Stmt::TryCatch {
                body: vec![
                    Stmt::using("a", call("resource", "a")),
                    Stmt::Break(None),
                ],
                param: None,
                handler: vec![log("caught")],
            }],
        ),
        log("after"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["dispose a", "after"]);
}

#[test]
fn test_for_of_runs_to_exhaustion_without_closing() {
    let mut h = Harness::new();
    let iter = IteratorRef::from_values(vec![Value::str("x"), Value::str("y")]);
    h.vm.set_global("items", Value::Iterator(iter.clone()));
    h.run_main(main(vec![for_of(
        "item",
        None,
        Expr::global("items"),
        vec![log_local("item")],
    )]));

    assert_eq!(h.events(), ["x", "y"]);
    assert!(!iter.is_closed());
}

#[test]
fn test_for_of_break_closes_iterator() {
    let mut h = Harness::new();
    let iter = IteratorRef::from_values(vec![Value::str("x"), Value::str("y")]);
    h.vm.set_global("items", Value::Iterator(iter.clone()));
    let status = h.run_main(main(vec![
        for_of(
            "item",
            None,
            Expr::global("items"),
            vec![log_local("item"), Stmt::Break(None)],
        ),
        log("after"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["x", "after"]);
    assert!(iter.is_closed());
    assert_eq!(iter.position(), 1);
}

#[test]
fn test_for_of_break_surfaces_close_error() {
    let mut h = Harness::new();
    let iter = IteratorRef::from_values(vec![Value::str("x")]).with_close_error(Value::error("close"));
    h.vm.set_global("items", Value::Iterator(iter));
    let status = h.run_main(main(vec![for_of(
        "item",
        None,
        Expr::global("items"),
        vec![Stmt::Break(None)],
    )]));

    assert_eq!(message(&thrown(&status)), "close");
}

#[test]
fn test_for_of_throw_closes_iterator_and_keeps_body_error() {
    let mut h = Harness::new();
    let iter = IteratorRef::from_values(vec![Value::str("x")]).with_close_error(Value::error("close"));
    h.vm.set_global("items", Value::Iterator(iter.clone()));
    let status = h.run_main(main(vec![for_of(
        "item",
        None,
        Expr::global("items"),
        vec![Stmt::expr(call("fail", "body"))],
    )]));

    assert_eq!(message(&thrown(&status)), "body");
    assert!(iter.is_closed());
}

#[test]
fn test_for_of_using_binding_disposed_per_iteration() {
    let mut h = Harness::new();
    let resources = Value::list(vec![
        common::sync_resource(&h.log, "r1", false),
        Value::Null,
        common::sync_resource(&h.log, "r2", false),
    ]);
    h.vm.set_global("resources", resources);
    let status = h.run_main(main(vec![
        for_of(
            "r",
            Some(UsingHint::Sync),
            Expr::global("resources"),
            vec![log("iteration")],
        ),
        log("done"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(
        h.events(),
        ["iteration", "dispose r1", "iteration", "iteration", "dispose r2", "done"]
    );
}

/// A resource whose dispose logs whether `iter` was already closed
fn close_probe(h: &Harness, iter: &Arc<Mutex<Option<IteratorRef>>>) -> Value {
    let log = h.log.clone();
    let iter = Arc::clone(iter);
    Value::object([(
        WellKnownSymbol::Dispose,
        Value::function("dispose", move |_, _| {
            let closed = iter.lock().as_ref().map(|i| i.is_closed()).unwrap_or_default();
            log.lock().push(format!("dispose closed={}", closed));
            Ok(Value::Undefined)
        }),
    )])
}

#[test]
fn test_for_of_using_binding_disposed_before_iterator_close() {
    for body in [vec![Stmt::Break(None)], vec![Stmt::expr(call("fail", "body"))]] {
        let mut h = Harness::new();
        let cell = Arc::new(Mutex::new(None));
        let iter = IteratorRef::from_values(vec![close_probe(&h, &cell)]);
        *cell.lock() = Some(iter.clone());
        h.vm.set_global("resources", Value::Iterator(iter.clone()));
        h.run_main(main(vec![for_of(
            "r",
            Some(UsingHint::Sync),
            Expr::global("resources"),
            body,
        )]));

        assert_eq!(h.events(), ["dispose closed=false"]);
        assert!(iter.is_closed());
    }
}

#[test]
fn test_for_of_using_dispose_error_closes_iterator() {
    let mut h = Harness::new();
    let iter = IteratorRef::from_values(vec![
        common::sync_resource(&h.log, "r1", true),
        common::sync_resource(&h.log, "r2", false),
    ]);
    h.vm.set_global("resources", Value::Iterator(iter.clone()));
    let status = h.run_main(main(vec![for_of(
        "r",
        Some(UsingHint::Sync),
        Expr::global("resources"),
        vec![log("iteration")],
    )]));

    assert_eq!(message(&thrown(&status)), "r1");
    assert_eq!(h.events(), ["iteration", "dispose r1"]);
    assert!(iter.is_closed());
}

#[test]
fn test_continue_to_outer_loop_closes_inner_iterator() {
    let mut h = Harness::new();
    let inner = IteratorRef::from_values(vec![Value::str("i1"), Value::str("i2")]);
    h.vm.set_global("outer_items", strings(&["o1", "o2"]));
    h.vm.set_global("inner_items", Value::Iterator(inner.clone()));
    let status = h.run_main(main(vec![Stmt::ForOf {
        label: Some("outer".into()),
        binding: "o".into(),
        using: None,
        iterable: Expr::global("outer_items"),
        body: vec![
            Stmt::using("r", Expr::call_global("resource", vec![Expr::local("o")])),
            for_of(
                "i",
                None,
                Expr::global("inner_items"),
                vec![log_local("i"), Stmt::Continue(Some("outer".into()))],
            ),
        ],
    }]));

    assert!(returned(&status).is_nullish());
    // The inner iterator is closed by the first `continue outer`, so the
    // second outer iteration sees it exhausted.
    assert_eq!(h.events(), ["i1", "dispose o1", "dispose o2"]);
    assert!(inner.is_closed());
}
