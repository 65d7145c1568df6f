use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use usingvm_engine::{
    compile_module, Expr, FunctionDecl, FunctionKind, Module, Promise, Stmt, Value, Vm, WellKnownSymbol,
};

#[ctor::ctor]
fn __init_bench_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).try_init();
}

fn scope_with(count: usize, kind: FunctionKind, async_resources: bool) -> Vec<FunctionDecl> {
    let body = (0..count)
        .map(|i| {
            let init = Expr::call_global("open", vec![]);
            if async_resources {
                Stmt::await_using(format!("r{}", i), init)
            } else {
                Stmt::using(format!("r{}", i), init)
            }
        })
        .collect();
    vec![FunctionDecl::new("main", kind, body)]
}

fn vm_with_resources() -> Vm {
    let mut vm = Vm::new();
    vm.register_native("open", |_, _| {
        Ok(Value::object([
            (
                WellKnownSymbol::Dispose,
                Value::function("dispose", |_, _| Ok(Value::Undefined)),
            ),
            (
                WellKnownSymbol::AsyncDispose,
                Value::function("asyncDispose", |_, _| {
                    Ok(Value::Promise(Promise::resolved(Value::Undefined)))
                }),
            ),
        ]))
    });
    vm
}

fn load(vm: &Vm, decls: &[FunctionDecl]) -> Arc<Module> {
    vm.load(compile_module("bench", decls).unwrap()).unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for count in [1, 8, 64] {
        let decls = scope_with(count, FunctionKind::Async, true);
        group.bench_with_input(BenchmarkId::new("await_using", count), &decls, |b, decls| {
            b.iter(|| compile_module("bench", black_box(decls)).unwrap());
        });
    }
    group.finish();
}

fn bench_sync_disposal(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_disposal");
    for count in [1, 8, 64] {
        let mut vm = vm_with_resources();
        let module = load(&vm, &scope_with(count, FunctionKind::Normal, false));
        group.bench_with_input(BenchmarkId::from_parameter(count), &module, |b, module| {
            b.iter(|| vm.run(module, "main", vec![]).unwrap());
        });
    }
    group.finish();
}

fn bench_async_disposal(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_disposal");
    for count in [1, 8, 64] {
        let mut vm = vm_with_resources();
        let module = load(&vm, &scope_with(count, FunctionKind::Async, true));
        group.bench_with_input(BenchmarkId::from_parameter(count), &module, |b, module| {
            b.iter(|| vm.run(module, "main", vec![]).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_sync_disposal, bench_async_disposal);
criterion_main!(benches);
