//! Criterion benchmarks for the sequencer tick
//!
//! Run with: cargo bench -p acheron_core

use acheron_core::midi::Silence;
use acheron_core::{Engine, SequencerConfig, builtin_registry};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const TICK_MS: f64 = 10.0;
const TICKS_PER_ITER: u64 = 100; // one second

fn engine_with(generators: usize, layers: usize) -> Engine {
    let config = SequencerConfig {
        seed: Some(7),
        ..Default::default()
    };
    let mut engine = Engine::new(builtin_registry(), config, Silence).unwrap();
    for _ in 1..layers {
        engine.add_layer("bench").unwrap();
    }
    for layer in 0..layers {
        for g in 0..generators {
            let hex = (g * 13 + 5) % 204;
            engine.place_token("generate", layer, hex).unwrap();
            engine.place_token("note", layer, (hex + 1) % 204).unwrap();
            engine.place_token("twist", layer, (hex + 2) % 204).unwrap();
        }
    }
    engine.start().unwrap();
    engine
}

fn run_ticks(engine: &mut Engine, n: u64) {
    for _ in 0..n {
        black_box(engine.tick(TICK_MS).unwrap());
    }
}

fn bench_idle(c: &mut Criterion) {
    let mut engine = engine_with(0, 1);
    c.bench_function("tick/empty", |b| b.iter(|| run_ticks(&mut engine, TICKS_PER_ITER)));
}

fn bench_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick/generators");
    for count in [1usize, 4, 16] {
        let mut engine = engine_with(count, 1);
        group.throughput(Throughput::Elements(TICKS_PER_ITER));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| run_ticks(&mut engine, TICKS_PER_ITER))
        });
    }
    group.finish();
}

fn bench_layers(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick/layers");
    for layers in [1usize, 4] {
        let mut engine = engine_with(4, layers);
        group.bench_with_input(BenchmarkId::from_parameter(layers), &layers, |b, _| {
            b.iter(|| run_ticks(&mut engine, TICKS_PER_ITER))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_idle, bench_generators, bench_layers);
criterion_main!(benches);
