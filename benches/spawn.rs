use criterion::*;
use std::hint::black_box;

use strata_ecs::prelude::*;

#[derive(Clone, Copy, Debug, Default)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, Default)]
struct Health(u32);

const ENTITIES: usize = 100_000;

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");
    group.throughput(Throughput::Elements(ENTITIES as u64));

    group.bench_function("create_100k", |b| {
        b.iter_batched(
            World::new,
            |world| {
                let entities = world.create_batch(ENTITIES);
                black_box(entities);
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("create_with_two_components_100k", |b| {
        b.iter_batched(
            World::new,
            |world| {
                for i in 0..ENTITIES {
                    let e = world.create();
                    world
                        .add_with(e, Position { x: i as f32, y: 0.0 })
                        .unwrap();
                    world
                        .add_with(e, Velocity { dx: 1.0, dy: 1.0 })
                        .unwrap();
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("migrate_add_remove_10k", |b| {
        b.iter_batched(
            || {
                let world = World::new();
                let entities = world.create_batch(10_000);
                for &e in &entities {
                    world.add::<(Position, Velocity)>(e).unwrap();
                }
                (world, entities)
            },
            |(world, entities)| {
                for &e in &entities {
                    world.add::<(Health,)>(e).unwrap();
                }
                for &e in &entities {
                    world.remove::<(Health,)>(e).unwrap();
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("destroy_100k", |b| {
        b.iter_batched(
            || {
                let world = World::new();
                let entities = world.create_batch(ENTITIES);
                for &e in &entities {
                    world.add::<(Position,)>(e).unwrap();
                }
                (world, entities)
            },
            |(world, entities)| {
                world.destroy_batch(&entities).unwrap();
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
