//! Synchronous disposal: ordering, error chaining and registration

mod common;

use common::{message, returned, suppressed_parts, thrown, Harness};
use usingvm_engine::{ErrorKind, Expr, FunctionDecl, FunctionKind, ObjectRef, Stmt, Value, WellKnownSymbol};

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

fn main(body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl::new("main", FunctionKind::Normal, body)
}

#[test]
fn test_disposes_in_reverse_registration_order() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("resource", "a")),
        Stmt::using("b", call("resource", "b")),
        Stmt::using("c", call("resource", "c")),
        log("body"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["body", "dispose c", "dispose b", "dispose a"]);
}

#[test]
fn test_single_dispose_error_propagates_unwrapped() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("resource", "a")),
        Stmt::using("b", call("failing", "b")),
        Stmt::using("c", call("resource", "c")),
    ]));

    let error = thrown(&status);
    assert_eq!(error.as_error().map(|e| e.kind), Some(ErrorKind::Error));
    assert_eq!(message(&error), "b");
    assert_eq!(h.events(), ["dispose c", "dispose b", "dispose a"]);
}

#[test]
fn test_later_dispose_error_suppresses_earlier() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("r1", call("failing", "r1")),
        Stmt::using("r2", call("resource", "r2")),
        Stmt::using("r3", call("failing", "r3")),
    ]));

    let (error, suppressed) = suppressed_parts(&thrown(&status));
    assert_eq!(message(&error), "r1");
    assert_eq!(message(&suppressed), "r3");
    assert_eq!(h.events(), ["dispose r3", "dispose r2", "dispose r1"]);
}

#[test]
fn test_three_dispose_errors_nest() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("failing", "a")),
        Stmt::using("b", call("failing", "b")),
        Stmt::using("c", call("failing", "c")),
    ]));

    let (outer_error, inner) = suppressed_parts(&thrown(&status));
    assert_eq!(message(&outer_error), "a");
    let (inner_error, innermost) = suppressed_parts(&inner);
    assert_eq!(message(&inner_error), "b");
    assert_eq!(message(&innermost), "c");
}

#[test]
fn test_body_exception_is_suppressed_by_dispose_error() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("failing", "a")),
        Stmt::expr(call("fail", "body")),
        log("unreachable"),
    ]));

    let (error, suppressed) = suppressed_parts(&thrown(&status));
    assert_eq!(message(&error), "a");
    assert_eq!(message(&suppressed), "body");
    assert_eq!(h.events(), ["dispose a"]);
}

#[test]
fn test_body_exception_passes_through_clean_disposal() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("resource", "a")),
        Stmt::Throw(Expr::str("boom")),
    ]));

    assert_eq!(thrown(&status).as_str(), Some("boom"));
    assert_eq!(h.events(), ["dispose a"]);
}

#[test]
fn test_null_and_undefined_register_nothing() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", Expr::Null),
        Stmt::using("b", Expr::Undefined),
        Stmt::using("c", call("resource", "c")),
        Stmt::ret(Expr::Int(3)),
    ]));

    assert_eq!(returned(&status).as_int(), Some(3));
    assert_eq!(h.events(), ["dispose c"]);
}

#[test]
fn test_scope_without_resources_completes() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", Expr::Null),
        log("body"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(h.events(), ["body"]);
}

#[test]
fn test_nested_scopes_dispose_inner_first() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("outer", call("resource", "outer")),
        Stmt::Block(vec![
            Stmt::using("inner", call("resource", "inner")),
            log("inner body"),
        ]),
        log("outer body"),
    ]));

    assert!(returned(&status).is_nullish());
    assert_eq!(
        h.events(),
        ["inner body", "dispose inner", "outer body", "dispose outer"]
    );
}

#[test]
fn test_non_object_registration_throws_type_error() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("resource", "a")),
        Stmt::using("b", Expr::Int(1)),
        log("unreachable"),
    ]));

    let error = thrown(&status);
    assert_eq!(error.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
    assert_eq!(message(&error), "using declarations require an object, got number");
    // Resources registered before the failing declaration are still disposed.
    assert_eq!(h.events(), ["dispose a"]);
}

#[test]
fn test_missing_dispose_method_throws_type_error() {
    let mut h = Harness::new();
    h.vm
        .register_native("plain", |_, _| Ok(Value::object([("name", Value::str("plain"))])));
    let status = h.run_main(main(vec![Stmt::using("a", Expr::call_global("plain", vec![]))]));

    let error = thrown(&status);
    assert_eq!(error.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
    assert_eq!(message(&error), "Object is not disposable (missing [Symbol.dispose])");
}

#[test]
fn test_dispose_is_called_with_resource_as_receiver() {
    let mut h = Harness::new();
    let seen = h.log.clone();
    h.vm.register_native("tagged", move |_, _| {
        let seen = seen.clone();
        let object = ObjectRef::new();
        object.set("tag", Value::str("mine"));
        object.set(
            WellKnownSymbol::Dispose,
            Value::function("dispose", move |this, _| {
                let tag = this
                    .as_object()
                    .map(|o| o.get(&"tag".into()).to_string())
                    .unwrap_or_default();
                seen.lock().push(format!("this.tag={}", tag));
                Ok(Value::Undefined)
            }),
        );
        Ok(Value::Object(object))
    });

    h.run_main(main(vec![Stmt::using("a", Expr::call_global("tagged", vec![]))]));
    assert_eq!(h.events(), ["this.tag=mine"]);
}

#[test]
fn test_return_value_survives_disposal() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("resource", "a")),
        Stmt::ret(Expr::str("done")),
    ]));

    assert_eq!(returned(&status).as_str(), Some("done"));
    assert_eq!(h.events(), ["dispose a"]);
}

#[test]
fn test_dispose_error_replaces_return() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::using("a", call("failing", "a")),
        Stmt::ret(Expr::Int(1)),
    ]));

    assert_eq!(message(&thrown(&status)), "a");
}

#[test]
fn test_user_catch_sees_disposal_error() {
    let mut h = Harness::new();
    let status = h.run_main(main(vec![
        Stmt::TryCatch {
            body: vec![Stmt::Block(vec![
                Stmt::using("a", call("failing", "a")),
                Stmt::expr(call("fail", "body")),
            ])],
            param: Some("e".into()),
            handler: vec![Stmt::ret(Expr::local("e"))],
        },
        Stmt::ret(Expr::Int(0)),
    ]));

    let (error, suppressed) = suppressed_parts(&returned(&status));
    assert_eq!(message(&error), "a");
    assert_eq!(message(&suppressed), "body");
}
