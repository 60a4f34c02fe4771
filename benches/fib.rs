use criterion::{black_box, criterion_group, criterion_main, Criterion};

use scriptlang::{compile, parse, run_tree, run_vm, NullSink};

const FIB: &str = "
var fib = function(x) {
    if (x < 2) {
        x
    } else {
        fib(x - 1) + fib(x - 2)
    }
};
fib(20);
";

fn criterion_benchmark(c: &mut Criterion) {
    let program = parse(FIB, "bench.js").unwrap();

    c.bench_function("fib_20__tree", |b| {
        b.iter(|| {
            let result = run_tree(&program, "bench.js", &mut NullSink).unwrap();
            black_box(result);
        });
    });

    let bytecode = compile(&program, "bench.js").unwrap();
    c.bench_function("fib_20__vm", |b| {
        b.iter(|| {
            let result = run_vm(bytecode.clone(), "bench.js", &mut NullSink).unwrap();
            black_box(result);
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
