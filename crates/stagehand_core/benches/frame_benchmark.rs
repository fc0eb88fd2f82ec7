//! # Frame Pipeline Benchmark
//!
//! Measures a full five-phase frame and the create/destroy churn path.
//!
//! Run with: `cargo bench --package stagehand_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stagehand_core::{Context, Entity, EntityBase, EntityResult, ManagerConfig, ObjectManager};

/// Moves along a fixed velocity every frame.
struct Mover {
    base: EntityBase,
    position: [f32; 2],
    velocity: [f32; 2],
}

impl Mover {
    fn new(seed: usize) -> Self {
        let v = (seed % 17) as f32;
        Self {
            base: EntityBase::new(),
            position: [0.0, 0.0],
            velocity: [v, -v],
        }
    }
}

impl Entity for Mover {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn physics_apply(&mut self, ctx: &mut Context<'_>) -> EntityResult<()> {
        let dt = ctx.delta_time();
        self.position[0] += self.velocity[0] * dt;
        self.position[1] += self.velocity[1] * dt;
        Ok(())
    }
}

fn populated(count: usize) -> ObjectManager {
    let config = ManagerConfig {
        initial_capacity: count,
        ..ManagerConfig::default()
    };
    let mut manager = ObjectManager::new(config);
    for i in 0..count {
        manager.create(Mover::new(i));
    }
    let _ = manager.update();
    manager
}

/// Benchmark: one frame over a steady population.
fn bench_steady_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("steady_frame");

    for count in [1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut manager = populated(count);
            b.iter(|| black_box(manager.update()));
        });
    }

    group.finish();
}

/// Benchmark: destroy and recreate a tenth of the population every frame.
fn bench_churn_frame(c: &mut Criterion) {
    c.bench_function("churn_frame_10k", |b| {
        let mut manager = populated(10_000);
        b.iter(|| {
            let doomed: Vec<_> = manager.handles().step_by(10).collect();
            for (i, handle) in doomed.into_iter().enumerate() {
                manager.destroy(handle);
                manager.create(Mover::new(i));
            }
            black_box(manager.update())
        });
    });
}

criterion_group!(benches, bench_steady_frame, bench_churn_frame);
criterion_main!(benches);
