//! Benchmarks for the CPU step path.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec2, Vec3};

use zenfield::force::total_acceleration;
use zenfield::{Behavior, ForceEnv, ParticlePool, Source, SpawnSettings, StepParams, MAX_SOURCES};

fn sources(behavior: Behavior, count: usize) -> Vec<Source> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Source::new(
                Vec2::splat(500.0) + Vec2::from_angle(angle) * 200.0,
                Vec3::ONE,
                behavior,
            )
        })
        .collect()
}

fn full_pool(capacity: usize, sources: &[Source]) -> ParticlePool {
    let mut pool = ParticlePool::new(capacity, 7);
    let settings = SpawnSettings {
        lifetime: 1.0e6,
        ..SpawnSettings::default()
    };
    for i in 0..capacity {
        let index = i % sources.len();
        pool.spawn(&sources[index], index as u32, &settings);
    }
    pool
}

fn bench_force_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("total_acceleration");
    let env = ForceEnv::default();

    for behavior in Behavior::ALL {
        let sources = sources(behavior, MAX_SOURCES);
        group.bench_function(behavior.display_name(), |b| {
            b.iter(|| total_acceleration(black_box(&sources), black_box(Vec2::splat(480.0)), &env))
        });
    }

    group.finish();
}

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_step");

    for capacity in [1024usize, 8192, 65536] {
        let sources = sources(Behavior::Turbulence, MAX_SOURCES);
        let params = StepParams {
            source_count: sources.len() as u32,
            ..StepParams::default()
        };
        let mut pool = full_pool(capacity, &sources);

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| pool.step(black_box(&sources), &params))
        });
    }

    group.finish();
}

fn bench_spawn(c: &mut Criterion) {
    let source = Source::new(Vec2::splat(500.0), Vec3::ONE, Behavior::Repulsion);
    let settings = SpawnSettings::default();

    c.bench_function("spawn_into_full_pool", |b| {
        let mut pool = full_pool(1024, std::slice::from_ref(&source));
        b.iter(|| black_box(pool.spawn(&source, 0, &settings)))
    });

    c.bench_function("spawn_after_clear", |b| {
        let mut pool = ParticlePool::new(1024, 7);
        b.iter(|| {
            pool.clear();
            black_box(pool.spawn(&source, 0, &settings))
        })
    });
}

criterion_group!(benches, bench_force_model, bench_cpu_step, bench_spawn);
criterion_main!(benches);
