//! # Entity Management
//!
//! This module defines entity identity, lifecycle, and the directory that
//! maps entities to archetype storage.
//!
//! ## Entity Model
//! An [`Entity`] is a lightweight, opaque handle composed of:
//!
//! - An **id**, indexing a slot in the directory
//! - A **generation**, incremented on every destruction of that slot
//!
//! A handle is alive if and only if its generation matches the slot's
//! current generation, so handles that outlive their entity compare stale
//! and are rejected. Ids are recycled through a free list; generations wrap
//! on `u32` overflow (aliasing after 2^32 reuses of one slot is an accepted
//! pathology).
//!
//! ## Directory
//! The [`EntityDirectory`] owns three parallel tables indexed by id:
//! generation counters, the free list of unused ids, and the archetype
//! location of each live entity. Locations must always reflect the actual
//! archetype row; the migration machinery updates them atomically with
//! every row move under the world lock.

use crate::engine::types::{ArchetypeId, EntityIndex, Generation};

/// Opaque, generational identifier for an ECS entity.
///
/// ## Invariants
/// - Two handles with the same `id` but different generations refer to
///   distinct entity lifetimes; at most one of them is alive.
/// - Only equality, copying, and passing to world operations are
///   meaningful; the numeric parts are exposed for diagnostics.
///
/// ## Notes
/// `Entity` values are cheap to copy and compare and are safe to pass
/// across threads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity {
    id: EntityIndex,
    generation: Generation,
}

impl Entity {
    #[inline]
    pub(crate) fn new(id: EntityIndex, generation: Generation) -> Self {
        Self { id, generation }
    }

    /// Returns the directory slot index of this handle.
    #[inline]
    pub fn id(self) -> EntityIndex {
        self.id
    }

    /// Returns the generation of this handle.
    #[inline]
    pub fn generation(self) -> Generation {
        self.generation
    }
}

/// Physical storage location of an entity within archetype storage.
///
/// ## Invariants
/// - `archetype` is `None` only between entity creation and the entity's
///   first migration into an archetype.
/// - When `archetype` is `Some`, `row` indexes the entity's row in that
///   archetype and is updated atomically with archetype row moves.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityLocation {
    /// Archetype containing the entity, if it has acquired one.
    pub archetype: Option<ArchetypeId>,

    /// Row index within the archetype.
    pub row: usize,
}

/// Entity id allocator and location directory.
///
/// ## Design
/// - Ids are allocated from a free list of recycled slots, else by
///   appending a generation-0 slot.
/// - Generations are incremented on destruction to invalidate stale
///   handles.
/// - Storage is dense and index-addressable.
///
/// ## Invariants
/// - `generations.len() == locations.len()`.
/// - Free ids always refer to dead entity slots.
/// - Live entity count equals `generations.len() - free_ids.len()`.
///
/// ## Concurrency
/// This type is not thread-safe; it is protected by the world mutex.
#[derive(Default)]
pub struct EntityDirectory {
    generations: Vec<Generation>,
    free_ids: Vec<EntityIndex>,
    locations: Vec<EntityLocation>,
}

impl EntityDirectory {
    /// Allocates an entity handle.
    ///
    /// ## Behavior
    /// - Reuses the free-list tail if available, otherwise appends a new
    ///   slot with generation 0.
    /// - Resets the slot's location to "no archetype".
    ///
    /// ## Invariants
    /// The returned entity is alive; its generation equals the slot's
    /// current generation.
    pub fn create(&mut self) -> Entity {
        let id = if let Some(id) = self.free_ids.pop() {
            id
        } else {
            let id = self.generations.len() as EntityIndex;
            self.generations.push(0);
            self.locations.push(EntityLocation::default());
            id
        };

        self.locations[id as usize] = EntityLocation::default();
        Entity::new(id, self.generations[id as usize])
    }

    /// Invalidates an entity handle and recycles its id.
    ///
    /// ## Behavior
    /// - Bumps the slot generation (wrapping), so every outstanding handle
    ///   with the old generation stops being alive.
    /// - Pushes the id onto the free list.
    ///
    /// The caller is responsible for evicting the entity from its archetype
    /// first; the directory only manages identity.
    ///
    /// ## Returns
    /// `false` if the handle was already stale, in which case nothing
    /// changes.
    pub fn invalidate(&mut self, entity: Entity) -> bool {
        if !self.alive(entity) {
            return false;
        }

        let index = entity.id() as usize;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.locations[index] = EntityLocation::default();
        self.free_ids.push(entity.id());
        true
    }

    /// Returns `true` if the handle's generation matches its slot.
    #[inline]
    pub fn alive(&self, entity: Entity) -> bool {
        let index = entity.id() as usize;
        index < self.generations.len() && self.generations[index] == entity.generation()
    }

    /// Returns the archetype location of an entity, if alive.
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        if self.alive(entity) {
            Some(self.locations[entity.id() as usize])
        } else {
            None
        }
    }

    /// Updates the stored location for an entity.
    ///
    /// ## Safety
    /// Caller must ensure the entity is alive and that the location matches
    /// actual archetype storage.
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        debug_assert!(
            self.alive(entity),
            "set_location called on a dead or stale entity. Entity: {:?}, Location: {:?}",
            entity,
            location
        );
        let index = entity.id() as usize;
        if index < self.locations.len() {
            self.locations[index] = location;
        }
    }

    /// Number of currently live entities.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free_ids.len()
    }

    /// Bytes consumed by directory metadata, for the memory-usage summary.
    pub fn metadata_bytes(&self) -> usize {
        self.generations.len() * std::mem::size_of::<Generation>()
            + self.free_ids.len() * std::mem::size_of::<EntityIndex>()
            + self.locations.len() * std::mem::size_of::<EntityLocation>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_reuses_ids_with_new_generations() {
        let mut directory = EntityDirectory::default();

        let first = directory.create();
        assert!(directory.alive(first));
        assert!(directory.invalidate(first));
        assert!(!directory.alive(first));

        let second = directory.create();
        assert_eq!(second.id(), first.id());
        assert_ne!(second.generation(), first.generation());
        assert!(directory.alive(second));
    }

    #[test]
    fn invalidate_is_a_no_op_on_stale_handles() {
        let mut directory = EntityDirectory::default();
        let entity = directory.create();

        assert!(directory.invalidate(entity));
        assert!(!directory.invalidate(entity));
        assert_eq!(directory.live_count(), 0);
    }

    #[test]
    fn live_count_tracks_creations_and_destructions() {
        let mut directory = EntityDirectory::default();
        let entities: Vec<Entity> = (0..10).map(|_| directory.create()).collect();
        assert_eq!(directory.live_count(), 10);

        for entity in &entities[..4] {
            directory.invalidate(*entity);
        }
        assert_eq!(directory.live_count(), 6);
    }

    #[test]
    fn location_is_none_for_stale_handles() {
        let mut directory = EntityDirectory::default();
        let entity = directory.create();
        assert!(directory.location(entity).is_some());

        directory.invalidate(entity);
        assert!(directory.location(entity).is_none());
    }
}
