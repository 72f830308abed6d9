//! Interpreter benchmarks using criterion.
//!
//! Measures the cost of folding computations that complete, shift, nest,
//! and bind, plus the overhead of opening a scope.
//!
//! Run with: cargo bench --bench effects_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kont_runtime::{cont, scope, sequence, Cont, ContEffect};

/// Benchmark folding a body that completes or shifts immediately.
fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("fold");

    let success: Cont<String, i32> = cont(|_| Ok(42));
    group.bench_function("success", |b| {
        b.iter(|| black_box(success.fold(|_| 0, |n| n)));
    });

    let shifted: Cont<i32, i32> = cont(|eff| eff.shift(7));
    group.bench_function("shift", |b| {
        b.iter(|| black_box(shifted.fold(|r| r, |n| n)));
    });

    let ensured: Cont<&'static str, i32> = cont(|eff| {
        eff.ensure(black_box(true), || "rejected")?;
        Ok(1)
    });
    group.bench_function("ensure", |b| {
        b.iter(|| black_box(ensured.to_result()));
    });

    group.finish();
}

/// Benchmark shifting out of nested scopes of increasing depth.
fn bench_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_shift");

    for depth in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let c: Cont<usize, usize> = cont(move |outer| nest(outer, depth));
                black_box(c.fold(|r| r, |a| a))
            });
        });
    }

    group.finish();
}

fn nest(outer: &ContEffect<usize>, depth: usize) -> Result<usize, kont_runtime::Shifted> {
    if depth == 0 {
        return outer.shift(depth);
    }
    let outer = outer.clone();
    let inner: Cont<(), usize> = cont(move |_| nest(&outer, depth - 1));
    inner.try_fold(|_| 0, |a| a)
}

/// Benchmark binding a sequence of computations.
fn bench_bind(c: &mut Criterion) {
    let mut group = c.benchmark_group("bind");

    for size in [10usize, 100, 1000] {
        let conts: Vec<Cont<String, usize>> = (0..size).map(|i| cont(move |_| Ok(i))).collect();
        let all = sequence(conts);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sequence", size), &all, |b, all| {
            b.iter(|| black_box(all.to_result()));
        });

        let results: Vec<Result<usize, String>> = (0..size).map(Ok).collect();
        group.bench_with_input(BenchmarkId::new("results", size), &results, |b, results| {
            b.iter(|| {
                let c: Cont<String, usize> = {
                    let results = results.clone();
                    cont(move |eff| {
                        let mut sum = 0;
                        for r in &results {
                            sum += eff.bind(r.clone())?;
                        }
                        Ok(sum)
                    })
                };
                black_box(c.to_result())
            });
        });
    }

    group.finish();
}

/// Benchmark the cost of a scope with racing children.
fn bench_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope");
    group.sample_size(20);

    for children in [2usize, 8] {
        group.bench_with_input(
            BenchmarkId::new("race_shift", children),
            &children,
            |b, &children| {
                let c: Cont<usize, ()> = cont(move |eff| {
                    scope(|s| {
                        for i in 0..children {
                            s.spawn(move |_| eff.shift::<()>(i));
                        }
                        Ok(())
                    })
                });
                b.iter(|| black_box(c.to_result()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fold, bench_nested, bench_bind, bench_scope);
criterion_main!(benches);
