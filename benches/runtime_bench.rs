//! Benchmark for the effect interpreters.
//!
//! Measures construction-plus-interpretation cost of the common effect
//! shapes on both runtimes: constant successes, map/flat_map chains,
//! failure recovery and sequential collection.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use effectio::effect::{collect_all, Effect};
use effectio::runtime::{FiberRuntime, SyncRuntime};
use std::hint::black_box;

fn benchmark_constant_success(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("constant_success");

    group.bench_function("sync_runtime", |bencher| {
        let runtime = SyncRuntime::new();
        bencher.iter(|| {
            let effect = Effect::<i32, String>::succeed(black_box(42));
            black_box(runtime.run(effect))
        });
    });

    group.bench_function("fiber_runtime", |bencher| {
        let runtime = FiberRuntime::new();
        bencher.iter(|| {
            let effect = Effect::<i32, String>::succeed(black_box(42));
            black_box(runtime.run_sync(effect))
        });
    });

    group.finish();
}

fn benchmark_flat_map_chain(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("flat_map_chain");

    for depth in [10_u64, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("sync_runtime", depth), &depth, |bencher, &depth| {
            let runtime = SyncRuntime::new();
            bencher.iter(|| {
                let mut effect = Effect::<u64, String>::succeed(0);
                for _ in 0..depth {
                    effect = effect.flat_map(|value| Effect::succeed(value + 1));
                }
                black_box(runtime.run(effect))
            });
        });
    }

    group.finish();
}

fn benchmark_recovery(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("recovery");

    group.bench_function("catch_all", |bencher| {
        let runtime = SyncRuntime::new();
        bencher.iter(|| {
            let effect = Effect::<i32, String>::fail(black_box("boom".to_string()))
                .catch_all(|_| Effect::succeed(1));
            black_box(runtime.run::<_, String>(effect))
        });
    });

    group.finish();
}

fn benchmark_collect_all(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("collect_all");

    for size in [10_usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("sync_runtime", size), &size, |bencher, &size| {
            let runtime = SyncRuntime::new();
            bencher.iter(|| {
                let effects = (0..size).map(|value| Effect::<usize, String>::succeed(value));
                black_box(runtime.run(collect_all(effects)))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_constant_success,
    benchmark_flat_map_chain,
    benchmark_recovery,
    benchmark_collect_all,
);
criterion_main!(benches);
