use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_ecs::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Dead;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Label(u32);

#[test]
fn for_each_visits_all_matching_entities() {
    let world = World::new();

    for i in 0..10 {
        let e = world.create();
        world.add_with(e, Label(i)).unwrap();
        if i % 2 == 0 {
            world.add::<(Velocity,)>(e).unwrap();
        }
    }

    let mut seen = HashSet::new();
    world.for_each::<(Label,), _>(|(label,): (&mut Label,)| {
        seen.insert(label.0);
    });
    assert_eq!(seen.len(), 10);

    let mut with_velocity = HashSet::new();
    world.for_each::<(Label, Velocity), _>(|(label, _velocity): (&mut Label, &mut Velocity)| {
        with_velocity.insert(label.0);
    });
    assert_eq!(with_velocity, (0..10).filter(|i| i % 2 == 0).collect());
}

#[test]
fn for_each_mutations_are_visible_through_get() {
    let world = World::new();

    let e = world.create();
    world.add_with(e, Position { x: 10.0, y: 20.0 }).unwrap();
    world.add_with(e, Velocity { dx: 1.0, dy: 0.5 }).unwrap();

    world.for_each::<(Position, Velocity), _>(
        |(position, velocity): (&mut Position, &mut Velocity)| {
            position.x += velocity.dx;
            position.y += velocity.dy;
        },
    );

    assert_eq!(*world.get::<Position>(e).unwrap(), Position { x: 11.0, y: 20.5 });
}

#[test]
fn exclude_filter_skips_archetypes_with_the_component() {
    let world = World::new();

    let e1 = world.create();
    world.add_with(e1, Label(1)).unwrap();

    let e2 = world.create();
    world.add_with(e2, Label(2)).unwrap();
    world.add::<(Dead,)>(e2).unwrap();

    let e3 = world.create();
    world.add_with(e3, Label(3)).unwrap();
    world.add::<(Dead, Velocity)>(e3).unwrap();

    let mut visited = Vec::new();
    world
        .query::<(Label,)>()
        .exclude::<(Dead,)>()
        .each(|(label,): (&mut Label,)| {
            visited.push(label.0);
        });

    assert_eq!(visited, vec![1]);
}

#[test]
fn query_with_empty_exclude_equals_for_each() {
    let world = World::new();

    for i in 0..20 {
        let e = world.create();
        world.add_with(e, Label(i)).unwrap();
        if i % 3 == 0 {
            world.add::<(Position,)>(e).unwrap();
        }
    }

    let mut via_for_each = Vec::new();
    world.for_each::<(Label,), _>(|(label,): (&mut Label,)| {
        via_for_each.push(label.0);
    });

    let mut via_query = Vec::new();
    world.query::<(Label,)>().each(|(label,): (&mut Label,)| {
        via_query.push(label.0);
    });

    // An exclude set disjoint from every entity changes nothing either.
    let mut via_disjoint_exclude = Vec::new();
    world
        .query::<(Label,)>()
        .exclude::<(Dead,)>()
        .each(|(label,): (&mut Label,)| {
            via_disjoint_exclude.push(label.0);
        });

    via_for_each.sort_unstable();
    via_query.sort_unstable();
    via_disjoint_exclude.sort_unstable();
    assert_eq!(via_for_each, via_query);
    assert_eq!(via_for_each, via_disjoint_exclude);
}

#[test]
fn overlapping_include_and_exclude_yields_nothing() {
    let world = World::new();

    let e = world.create();
    world.add_with(e, Label(1)).unwrap();

    let mut count = 0;
    world
        .query::<(Label,)>()
        .exclude::<(Label,)>()
        .each(|(_,): (&mut Label,)| {
            count += 1;
        });
    assert_eq!(count, 0);
}

#[test]
fn chunk_iteration_covers_the_same_rows_as_per_entity() {
    let world = World::new();

    // 100 entities with Position; odd-indexed ones also get Velocity, so
    // rows are spread across two archetypes.
    let entities = world.create_batch(100);
    for (i, &entity) in entities.iter().enumerate() {
        world
            .add_with(entity, Position { x: i as f32, y: 0.0 })
            .unwrap();
        if i % 2 == 1 {
            world.add::<(Velocity,)>(entity).unwrap();
        }
    }

    let mut chunk_rows = 0;
    let mut chunk_xs: Vec<f32> = Vec::new();
    world.for_each_chunk::<(Position,), _>(|(positions,): (&mut [Position],)| {
        chunk_rows += positions.len();
        chunk_xs.extend(positions.iter().map(|p| p.x));
    });
    assert_eq!(chunk_rows, 100);

    let mut entity_xs: Vec<f32> = Vec::new();
    world.for_each::<(Position,), _>(|(position,): (&mut Position,)| {
        entity_xs.push(position.x);
    });

    chunk_xs.sort_by(f32::total_cmp);
    entity_xs.sort_by(f32::total_cmp);
    assert_eq!(chunk_xs, entity_xs);

    let mut narrow_rows = 0;
    world.for_each_chunk::<(Position, Velocity), _>(
        |(positions, _velocities): (&mut [Position], &mut [Velocity])| {
            narrow_rows += positions.len();
        },
    );
    assert_eq!(narrow_rows, 50);
}

#[test]
fn chunk_slices_share_one_row_count() {
    let world = World::new();

    let entities = world.create_batch(17);
    for &entity in &entities {
        world.add::<(Position, Velocity)>(entity).unwrap();
    }

    world.for_each_chunk::<(Position, Velocity), _>(
        |(positions, velocities): (&mut [Position], &mut [Velocity])| {
            assert_eq!(positions.len(), velocities.len());
            assert_eq!(positions.len(), 17);
        },
    );
}

#[test]
fn parallel_for_each_visits_every_row_once() {
    let world = World::new();

    let entities = world.create_batch(10_000);
    for (i, &entity) in entities.iter().enumerate() {
        world.add_with(entity, Label(i as u32)).unwrap();
        if i % 2 == 0 {
            world.add::<(Position,)>(entity).unwrap();
        }
    }

    let visits = AtomicUsize::new(0);
    world.parallel_for_each::<(Label,), _>(|(label,): (&mut Label,)| {
        label.0 += 1;
        visits.fetch_add(1, Ordering::Relaxed);
    });
    assert_eq!(visits.load(Ordering::Relaxed), 10_000);

    // Each row was incremented exactly once.
    let mut sum: u64 = 0;
    world.for_each::<(Label,), _>(|(label,): (&mut Label,)| {
        sum += label.0 as u64;
    });
    let expected: u64 = (0..10_000u64).map(|i| i + 1).sum();
    assert_eq!(sum, expected);
}

#[test]
fn parallel_chunk_iteration_subdivides_large_archetypes() {
    let world = World::new();

    // More rows than one parallel chunk holds, to force subdivision.
    let entities = world.create_batch(10_000);
    for &entity in &entities {
        world.add::<(Position,)>(entity).unwrap();
    }

    let rows = AtomicUsize::new(0);
    let chunks = AtomicUsize::new(0);
    world.parallel_for_each_chunk::<(Position,), _>(|(positions,): (&mut [Position],)| {
        assert!(positions.len() <= strata_ecs::PARALLEL_CHUNK_ROWS);
        rows.fetch_add(positions.len(), Ordering::Relaxed);
        chunks.fetch_add(1, Ordering::Relaxed);
    });

    assert_eq!(rows.load(Ordering::Relaxed), 10_000);
    assert!(chunks.load(Ordering::Relaxed) >= 3);
}

#[test]
fn empty_archetypes_are_skipped() {
    let world = World::new();

    let e = world.create();
    world.add_with(e, Position { x: 1.0, y: 1.0 }).unwrap();
    // Migrating away leaves the {Position} archetype empty behind.
    world.add::<(Velocity,)>(e).unwrap();

    let mut chunk_calls = 0;
    world.for_each_chunk::<(Position,), _>(|(positions,): (&mut [Position],)| {
        assert!(!positions.is_empty());
        chunk_calls += 1;
    });
    assert_eq!(chunk_calls, 1);
    assert_eq!(world.archetype_count(), 1);
}
