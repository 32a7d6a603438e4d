//! Propagation benchmarks
//!
//! Measures the cost of pushing a write through the dependency graph: fan-out
//! to many effects, chains of computed values, and batched array mutation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trellis_core::observe::{Key, Observable, ObserveOptions, Target, Value};
use trellis_core::reactive::{batch, create_effect, Computed, ReactiveEffect};

fn record_view(entries: usize) -> Observable {
    let target = Target::record_from((0..entries).map(|i| (format!("k{i}"), i)));
    Observable::wrap(&target, ObserveOptions::REACTIVE).expect("records are observable")
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for effects in [1usize, 16, 256] {
        group.throughput(Throughput::Elements(effects as u64));
        group.bench_with_input(BenchmarkId::from_parameter(effects), &effects, |b, &n| {
            let state = record_view(1);
            let _effects: Vec<ReactiveEffect> = (0..n)
                .map(|_| {
                    let state = state.clone();
                    create_effect(move || {
                        black_box(state.get(&Key::from("k0")));
                    })
                })
                .collect();
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                state.set("k0", next as f64);
            });
        });
    }
    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");
    for depth in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let state = record_view(1);
            let head = {
                let state = state.clone();
                Computed::new(move || state.get(&Key::from("k0")).as_number().unwrap_or(0.0))
            };
            let tail = (0..depth).fold(head, |prev, _| Computed::new(move || prev.get() + 1.0));
            let _reader = {
                let tail = tail.clone();
                create_effect(move || {
                    black_box(tail.get());
                })
            };
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                state.set("k0", next as f64);
            });
        });
    }
    group.finish();
}

fn bench_batched_writes(c: &mut Criterion) {
    c.bench_function("batched_writes_64_keys", |b| {
        let state = record_view(64);
        let _reader = {
            let state = state.clone();
            create_effect(move || {
                for i in 0..64 {
                    black_box(state.get(&Key::from(format!("k{i}"))));
                }
            })
        };
        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            batch(|| {
                for i in 0..64 {
                    state.set(format!("k{i}"), next as f64);
                }
            });
        });
    });
}

fn bench_array_push(c: &mut Criterion) {
    c.bench_function("array_push_pop", |b| {
        let array = Observable::wrap(&Target::array_from(0..32), ObserveOptions::REACTIVE)
            .expect("arrays are observable");
        let _reader = {
            let array = array.clone();
            create_effect(move || {
                black_box(array.get(&Key::length()));
            })
        };
        b.iter(|| {
            array.push([Value::from(1)]);
            black_box(array.pop());
        });
    });
}

criterion_group!(
    propagation_benches,
    bench_fan_out,
    bench_computed_chain,
    bench_batched_writes,
    bench_array_push,
);

criterion_main!(propagation_benches);
