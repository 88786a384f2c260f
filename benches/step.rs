//! Benchmarks for the tick pipeline and its CPU building blocks.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flocksim::spatial::{morton_encode, SpatialConfig, SpatialIndex};
use flocksim::{FlockSimulation, ForceMethod, Spawner};
use flocksim::{ObstacleSet, SimulationParameters};
use glam::Vec3;

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for density in [200usize, 1000, 2000] {
        for method in [ForceMethod::Modern, ForceMethod::Legacy] {
            group.bench_with_input(
                BenchmarkId::new(method.to_string(), density),
                &density,
                |b, &density| {
                    let mut sim = FlockSimulation::builder()
                        .with_seed(1)
                        .with_density(density)
                        .with_method(method)
                        .build()
                        .unwrap();
                    b.iter(|| black_box(sim.step(1.0 / 60.0).unwrap()))
                },
            );
        }
    }

    group.finish();
}

fn bench_spatial(c: &mut Criterion) {
    let params = SimulationParameters::default();
    let positions: Vec<Vec3> = Spawner::new(3)
        .spawn_agents(2000, &params, &ObstacleSet::new())
        .iter()
        .map(|a| a.position)
        .collect();
    let config = SpatialConfig::for_radius(params.query_radius(), params.half_extent);

    let mut group = c.benchmark_group("spatial");

    group.bench_function("morton_encode", |b| {
        b.iter(|| black_box(morton_encode(black_box(513), black_box(77), black_box(1020))))
    });

    group.bench_function("rebuild_2000", |b| {
        let mut index = SpatialIndex::new(config);
        b.iter(|| index.rebuild(black_box(&positions)))
    });

    group.bench_function("query_2000", |b| {
        let mut index = SpatialIndex::new(config);
        index.rebuild(&positions);
        b.iter(|| {
            let mut total = 0;
            for (i, p) in positions.iter().enumerate() {
                index.for_each_neighbor(*p, params.neighbourhood_distance, Some(i), |_| total += 1);
            }
            black_box(total)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_step, bench_spatial);
criterion_main!(benches);
