use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use strata_ecs::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Health(u32);

struct SimulationClock {
    tick: u64,
    dt: f32,
}

#[test]
fn resources_are_singletons_per_type() {
    let world = World::new();

    assert!(!world.has_resource::<SimulationClock>());
    world.set_resource(SimulationClock { tick: 0, dt: 0.016 });
    assert!(world.has_resource::<SimulationClock>());

    {
        let mut clock = world.get_resource::<SimulationClock>();
        clock.tick += 1;
    }

    let clock = world.get_resource::<SimulationClock>();
    assert_eq!(clock.tick, 1);
    assert_eq!(clock.dt, 0.016);
}

#[test]
fn set_resource_replaces_and_drops_the_old_value() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Tracked(#[allow(dead_code)] u32);
    impl Drop for Tracked {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    {
        let world = World::new();
        world.set_resource(Tracked(1));
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);

        world.set_resource(Tracked(2));
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
    }
    // World drop releases the replacement too.
    assert_eq!(DROPS.load(Ordering::SeqCst), 2);
}

#[test]
#[should_panic(expected = "was never set")]
fn get_resource_panics_when_missing() {
    struct Missing;

    let world = World::new();
    let _ = world.get_resource::<Missing>();
}

#[test]
fn add_and_remove_hooks_fire_once_in_order() {
    let world = World::new();
    let events: Arc<Mutex<Vec<(&'static str, Entity)>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let events = Arc::clone(&events);
        world.on_component_added::<Position>(move |entity| {
            events.lock().unwrap().push(("added", entity));
        });
    }
    {
        let events = Arc::clone(&events);
        world.on_component_removed::<Position>(move |entity| {
            events.lock().unwrap().push(("removed", entity));
        });
    }

    let e = world.create();
    world.add::<(Position,)>(e).unwrap();
    world.remove::<(Position,)>(e).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.as_slice(), &[("added", e), ("removed", e)]);
}

#[test]
fn hooks_do_not_fire_for_no_op_changes() {
    let world = World::new();
    let added = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));

    {
        let added = Arc::clone(&added);
        world.on_component_added::<Health>(move |_| {
            added.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let removed = Arc::clone(&removed);
        world.on_component_removed::<Health>(move |_| {
            removed.fetch_add(1, Ordering::SeqCst);
        });
    }

    let e = world.create();

    // Removing a component the entity lacks fires nothing.
    world.remove::<(Health,)>(e).unwrap();
    assert_eq!(removed.load(Ordering::SeqCst), 0);

    world.add_with(e, Health(5)).unwrap();
    assert_eq!(added.load(Ordering::SeqCst), 1);

    // Re-adding an existing component overwrites without a hook.
    world.add_with(e, Health(6)).unwrap();
    assert_eq!(added.load(Ordering::SeqCst), 1);
    assert_eq!(*world.get::<Health>(e).unwrap(), Health(6));
}

#[test]
fn destroy_fires_remove_hooks_per_component() {
    let world = World::new();
    let removed = Arc::new(Mutex::new(Vec::new()));

    {
        let removed = Arc::clone(&removed);
        world.on_component_removed::<Position>(move |entity| {
            removed.lock().unwrap().push(entity);
        });
    }

    let e = world.create();
    world.add::<(Position, Health)>(e).unwrap();
    world.destroy(e).unwrap();

    let removed = removed.lock().unwrap();
    assert_eq!(removed.as_slice(), &[e]);
}

#[test]
fn batch_destroy_fires_hooks_per_entity() {
    let world = World::new();
    let removed = Arc::new(Mutex::new(Vec::new()));

    {
        let removed = Arc::clone(&removed);
        world.on_component_removed::<Health>(move |entity| {
            removed.lock().unwrap().push(entity);
        });
    }

    let entities = world.create_batch(3);
    for &entity in &entities {
        world.add::<(Health,)>(entity).unwrap();
    }

    world.destroy_batch(&entities).unwrap();

    let removed = removed.lock().unwrap();
    assert_eq!(removed.as_slice(), entities.as_slice());
}

#[test]
fn hooks_observe_committed_state() {
    let world = World::new();
    let observed = Arc::new(Mutex::new(Vec::new()));

    // The hook only records; reading back *after* the call observes the
    // same committed state the hook was announced for.
    {
        let observed = Arc::clone(&observed);
        world.on_component_added::<Health>(move |entity| {
            observed.lock().unwrap().push(entity);
        });
    }

    let e = world.create();
    world.add_with(e, Health(12)).unwrap();

    assert_eq!(observed.lock().unwrap().as_slice(), &[e]);
    assert_eq!(*world.get::<Health>(e).unwrap(), Health(12));
}
