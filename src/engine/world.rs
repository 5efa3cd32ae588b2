//! # World façade and locking discipline
//!
//! The `World` owns everything: the archetype table, the entity directory,
//! the resource table, and the event hooks. A single coarse mutex protects
//! all of it: every public operation acquires the mutex for its duration,
//! with exactly two exceptions in the parallel iteration family, which
//! snapshot the matching archetypes under the lock and release it before
//! fanning work out to the rayon pool.
//!
//! ## Concurrency model
//!
//! * Mutations (create/destroy, add/remove, resource writes) serialize on
//!   the world mutex.
//! * Serial iteration runs the caller's closure under the mutex; the
//!   closure must not call back into the world (same-mutex deadlock).
//! * Parallel iteration releases the mutex before dispatch. While any
//!   parallel iteration is in flight, **no thread may mutate structure**
//!   (entity create/destroy, component add/remove, resource replacement);
//!   the engine's subdivision guarantees disjoint row ranges, so callbacks
//!   that only touch their own rows race on nothing.
//! * Event hooks fire after a structural change commits, while the mutex is
//!   still held. Hooks are announcements; re-entering the world from a hook
//!   deadlocks.
//!
//! ## Migration
//!
//! Adding or removing components moves an entity between archetypes: the
//! destination row is built column by column (shared components are taken
//! from the source, newly added ones are value-initialized and then
//! overwritten with any caller-supplied value), the source row is evicted
//! by swap-remove on the entity column and every source column at the same
//! index, and the directory is updated for both the moved entity and the
//! entity that was swap-filled into the vacated row. All columns must agree
//! on the swap; disagreement is an internal invariant violation.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::engine::archetype::Archetype;
use crate::engine::component::{
    component_id_of, make_empty_column, resource_index_of, Component, ComponentSet,
};
use crate::engine::entity::{Entity, EntityDirectory, EntityLocation};
use crate::engine::error::{EcsError, EcsResult, MigrationError};
use crate::engine::events::HookTable;
use crate::engine::query::{Query, QuerySet};
use crate::engine::resource::ResourceTable;
use crate::engine::storage::ColumnStorage;
use crate::engine::types::{
    iter_word_bits, ArchetypeId, ComponentId, Signature, PARALLEL_CHUNK_ROWS, SIGNATURE_WORDS,
};

/// Everything the world owns, guarded by the world mutex.
///
/// Field order fixes teardown order: resources are released first, then
/// archetype columns, then directory storage.
#[derive(Default)]
struct WorldInner {
    resources: ResourceTable,
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<[u64; SIGNATURE_WORDS], ArchetypeId>,
    directory: EntityDirectory,
    hooks: HookTable,
}

impl WorldInner {
    /// Looks up the archetype for `signature`, creating it if this is the
    /// first time the component set has been observed.
    ///
    /// New archetypes start with an empty entity column and no component
    /// columns; columns materialize when they first receive a value.
    fn get_or_create_archetype(&mut self, signature: &Signature) -> ArchetypeId {
        let key = signature.components;
        if let Some(&archetype_id) = self.archetype_index.get(&key) {
            return archetype_id;
        }

        let archetype_id = self.archetypes.len() as ArchetypeId;
        self.archetype_index.insert(key, archetype_id);
        self.archetypes.push(Archetype::new(archetype_id, *signature));
        log::debug!(
            "created archetype {} for {} component(s)",
            archetype_id,
            signature.count()
        );
        archetype_id
    }

    /// Borrows two distinct archetypes mutably at once.
    #[inline]
    fn archetype_pair_mut(
        archetypes: &mut [Archetype],
        archetype_a: ArchetypeId,
        archetype_b: ArchetypeId,
    ) -> (&mut Archetype, &mut Archetype) {
        assert!(
            archetype_a != archetype_b,
            "source and destination archetype must differ"
        );
        let (left, right) = if archetype_a < archetype_b {
            (archetype_a, archetype_b)
        } else {
            (archetype_b, archetype_a)
        };

        let (head, tail) = archetypes.split_at_mut(right as usize);
        let left_reference = &mut head[left as usize];
        let right_reference = &mut tail[0];
        if archetype_a < archetype_b {
            (left_reference, right_reference)
        } else {
            (right_reference, left_reference)
        }
    }

    /// Applies a component-set change to an entity.
    ///
    /// This is the migration engine: it computes the destination signature,
    /// ensures destination columns exist (clone-empty from the source for
    /// migrating components, registry factory for newly added ones), builds
    /// the destination row, evicts the source row, updates the directory,
    /// and finally fires hooks for the components that actually appeared or
    /// disappeared.
    ///
    /// Stale handles make the whole call a no-op. Adding a component the
    /// entity already has is a no-op on storage, but a caller-supplied
    /// value still overwrites the stored one; no hook fires for it.
    fn apply(
        &mut self,
        entity: Entity,
        added: &[ComponentId],
        removed: &[ComponentId],
        mut values: Vec<(ComponentId, Box<dyn Any>)>,
    ) -> EcsResult<()> {
        let Some(location) = self.directory.location(entity) else {
            return Ok(());
        };

        let old_signature = location
            .archetype
            .map(|archetype_id| *self.archetypes[archetype_id as usize].signature())
            .unwrap_or_default();

        let mut new_signature = old_signature;
        for &component_id in added {
            new_signature.set(component_id);
        }
        for &component_id in removed {
            new_signature.clear(component_id);
        }

        let newly_added: SmallVec<[ComponentId; 8]> = added
            .iter()
            .copied()
            .filter(|&component_id| !old_signature.has(component_id))
            .collect();
        let newly_removed: SmallVec<[ComponentId; 8]> = removed
            .iter()
            .copied()
            .filter(|&component_id| old_signature.has(component_id))
            .collect();

        if new_signature == old_signature {
            // No structural change; caller-supplied values overwrite the
            // stored ones in place.
            if let Some(archetype_id) = location.archetype {
                let archetype = &mut self.archetypes[archetype_id as usize];
                for (component_id, value) in values.drain(..) {
                    let column = archetype
                        .column_mut(component_id)
                        .ok_or(MigrationError::MissingColumn { component_id })?;
                    column.write_boxed(location.row, value).map_err(|source_error| {
                        MigrationError::ColumnTransfer { component_id, source_error }
                    })?;
                }
            }
            return Ok(());
        }

        let destination_id = self.get_or_create_archetype(&new_signature);
        self.ensure_destination_columns(location.archetype, destination_id, &new_signature)?;

        match location.archetype {
            None => self.insert_fresh_row(entity, destination_id, &new_signature, &mut values)?,
            Some(source_id) => self.move_row(
                entity,
                source_id,
                destination_id,
                location.row,
                &old_signature,
                &new_signature,
                &mut values,
            )?,
        }

        log::trace!(
            "entity {}v{} migrated to archetype {destination_id}",
            entity.id(),
            entity.generation()
        );

        for &component_id in &newly_added {
            self.hooks.fire_added(component_id, entity);
        }
        for &component_id in &newly_removed {
            self.hooks.fire_removed(component_id, entity);
        }

        Ok(())
    }

    /// Materializes every destination column named by `signature`.
    ///
    /// Columns the entity is migrating out of are cloned empty from the
    /// source archetype to preserve their vtable; newly added components
    /// get a fresh column from the registry factory.
    fn ensure_destination_columns(
        &mut self,
        source: Option<ArchetypeId>,
        destination_id: ArchetypeId,
        signature: &Signature,
    ) -> EcsResult<()> {
        let mut pending: Vec<(ComponentId, Box<dyn ColumnStorage>)> = Vec::new();
        {
            let destination = &self.archetypes[destination_id as usize];
            let source = source.map(|archetype_id| &self.archetypes[archetype_id as usize]);
            for component_id in signature.iter_ids() {
                if destination.column(component_id).is_some() {
                    continue;
                }
                let column = match source.and_then(|archetype| archetype.column(component_id)) {
                    Some(source_column) => source_column.clone_empty(),
                    None => make_empty_column(component_id)?,
                };
                pending.push((component_id, column));
            }
        }

        let destination = &mut self.archetypes[destination_id as usize];
        for (component_id, column) in pending {
            destination.ensure_column(component_id, || Ok(column))?;
        }
        Ok(())
    }

    /// Inserts a row for an entity that is not yet in any archetype.
    fn insert_fresh_row(
        &mut self,
        entity: Entity,
        destination_id: ArchetypeId,
        signature: &Signature,
        values: &mut Vec<(ComponentId, Box<dyn Any>)>,
    ) -> EcsResult<()> {
        let destination = &mut self.archetypes[destination_id as usize];
        let new_row = destination.push_entity(entity);

        for component_id in signature.iter_ids() {
            let column = destination
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?;
            column.push_default();
        }
        for (component_id, value) in values.drain(..) {
            let column = destination
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?;
            column.write_boxed(new_row, value).map_err(|source_error| {
                MigrationError::ColumnTransfer { component_id, source_error }
            })?;
        }

        self.directory.set_location(
            entity,
            EntityLocation { archetype: Some(destination_id), row: new_row },
        );
        Ok(())
    }

    /// Moves an entity's row from `source_id` to `destination_id`.
    #[allow(clippy::too_many_arguments)]
    fn move_row(
        &mut self,
        entity: Entity,
        source_id: ArchetypeId,
        destination_id: ArchetypeId,
        source_row: usize,
        old_signature: &Signature,
        new_signature: &Signature,
        values: &mut Vec<(ComponentId, Box<dyn Any>)>,
    ) -> EcsResult<()> {
        let mut shared_words = [0u64; SIGNATURE_WORDS];
        let mut source_only_words = [0u64; SIGNATURE_WORDS];
        let mut destination_only_words = [0u64; SIGNATURE_WORDS];
        for i in 0..SIGNATURE_WORDS {
            let a = old_signature.components[i];
            let b = new_signature.components[i];
            shared_words[i] = a & b;
            source_only_words[i] = a & !b;
            destination_only_words[i] = b & !a;
        }

        let (source, destination) =
            Self::archetype_pair_mut(&mut self.archetypes, source_id, destination_id);

        let new_row = destination.push_entity(entity);

        // Every eviction below removes exactly one element at `source_row`;
        // all columns and the entity column must report the same swap-fill.
        let mut swap_info: Option<Option<usize>> = None;
        let mut note_swap = |observed: Option<usize>| -> Result<(), MigrationError> {
            match swap_info {
                None => {
                    swap_info = Some(observed);
                    Ok(())
                }
                Some(expected) if expected != observed => {
                    Err(MigrationError::InconsistentSwapInfo { expected, got: observed })
                }
                _ => Ok(()),
            }
        };

        for component_id in iter_word_bits(&shared_words) {
            let source_column = source
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?;
            let destination_column = destination
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?;
            let moved = destination_column
                .push_from(source_column, source_row)
                .map_err(|source_error| MigrationError::ColumnTransfer {
                    component_id,
                    source_error,
                })?;
            note_swap(moved)?;
        }

        for component_id in iter_word_bits(&destination_only_words) {
            destination
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?
                .push_default();
        }

        for (component_id, value) in values.drain(..) {
            let column = destination
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?;
            column.write_boxed(new_row, value).map_err(|source_error| {
                MigrationError::ColumnTransfer { component_id, source_error }
            })?;
        }

        for component_id in iter_word_bits(&source_only_words) {
            let moved = source
                .column_mut(component_id)
                .ok_or(MigrationError::MissingColumn { component_id })?
                .swap_remove(source_row)
                .map_err(|source_error| MigrationError::ColumnTransfer {
                    component_id,
                    source_error,
                })?;
            note_swap(moved)?;
        }

        let last = source.len() - 1;
        note_swap((source_row != last).then_some(last))?;
        let moved_entity = source.swap_remove_entity(source_row);

        if let Some(moved_entity) = moved_entity {
            self.directory.set_location(
                moved_entity,
                EntityLocation { archetype: Some(source_id), row: source_row },
            );
        }
        self.directory.set_location(
            entity,
            EntityLocation { archetype: Some(destination_id), row: new_row },
        );
        Ok(())
    }

    /// Evicts an entity from its archetype and invalidates its handle.
    ///
    /// Returns `false` for stale handles. Remove-hooks fire per component
    /// the entity held, after the archetype eviction but before the
    /// directory bumps the generation and recycles the id.
    fn despawn(&mut self, entity: Entity) -> EcsResult<bool> {
        let Some(location) = self.directory.location(entity) else {
            return Ok(false);
        };

        let mut removed_components: SmallVec<[ComponentId; 8]> = SmallVec::new();
        if let Some(archetype_id) = location.archetype {
            let archetype = &mut self.archetypes[archetype_id as usize];
            let row = location.row;
            let signature = *archetype.signature();

            let mut swap_info: Option<Option<usize>> = None;
            for component_id in signature.iter_ids() {
                removed_components.push(component_id);
                let moved = archetype
                    .column_mut(component_id)
                    .ok_or(MigrationError::MissingColumn { component_id })?
                    .swap_remove(row)
                    .map_err(|source_error| MigrationError::ColumnTransfer {
                        component_id,
                        source_error,
                    })?;
                match swap_info {
                    None => swap_info = Some(moved),
                    Some(expected) if expected != moved => {
                        return Err(MigrationError::InconsistentSwapInfo {
                            expected,
                            got: moved,
                        }
                        .into())
                    }
                    _ => {}
                }
            }

            let last = archetype.len() - 1;
            let entity_moved = (row != last).then_some(last);
            if let Some(expected) = swap_info {
                if expected != entity_moved {
                    return Err(MigrationError::InconsistentSwapInfo {
                        expected,
                        got: entity_moved,
                    }
                    .into());
                }
            }

            let moved_entity = archetype.swap_remove_entity(row);
            if let Some(moved_entity) = moved_entity {
                self.directory.set_location(
                    moved_entity,
                    EntityLocation { archetype: Some(archetype_id), row },
                );
            }
        }

        // Hooks observe the committed eviction while the handle is still
        // current; the id returns to the allocator only afterwards.
        for &component_id in &removed_components {
            self.hooks.fire_removed(component_id, entity);
        }

        self.directory.invalidate(entity);
        log::trace!("destroyed entity {}v{}", entity.id(), entity.generation());
        Ok(true)
    }
}

/// The ECS database: entities, archetypes, resources, and hooks behind one
/// mutex.
///
/// A `World` is created empty with [`World::new`] (or `Default`). It is not
/// clonable; ownership of its contents can be transferred wholesale with
/// [`World::take`], which leaves the source empty and usable. Dropping the
/// world drops every resource, every component column, and the directory.
///
/// All methods take `&self`; interior synchronization makes the world safe
/// to share across threads, subject to the parallel-iteration contract
/// described in the [module docs](self).
pub struct World {
    inner: Mutex<WorldInner>,
}

impl Default for World {
    fn default() -> Self {
        Self { inner: Mutex::new(WorldInner::default()) }
    }
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the world mutex for operations that report errors.
    fn try_lock(&self) -> EcsResult<MutexGuard<'_, WorldInner>> {
        self.inner.lock().map_err(|_| EcsError::PoisonedLock)
    }

    /// Acquires the world mutex for the infallible surface.
    ///
    /// Poisoning is advisory here: the state behind the mutex is guarded
    /// by per-operation invariant checks, so reads and infallible
    /// mutations continue on the recovered guard. Operations that return
    /// [`EcsResult`] surface poisoning as [`EcsError::PoisonedLock`]
    /// instead.
    fn lock(&self) -> MutexGuard<'_, WorldInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the world's entire contents out, leaving `self` empty and
    /// usable.
    pub fn take(&mut self) -> World {
        let inner = std::mem::take(&mut *self.lock());
        World { inner: Mutex::new(inner) }
    }

    // ── Entity lifecycle ────────────────────────────────────────────────

    /// Creates an entity with no components.
    ///
    /// Recycles a previously destroyed id when one is available; the new
    /// handle's generation differs from every destroyed handle of the same
    /// id.
    pub fn create(&self) -> Entity {
        self.lock().directory.create()
    }

    /// Creates `count` entities under a single lock acquisition.
    pub fn create_batch(&self, count: usize) -> Vec<Entity> {
        let mut inner = self.lock();
        (0..count).map(|_| inner.directory.create()).collect()
    }

    /// Destroys an entity, evicting it from its archetype and invalidating
    /// the handle.
    ///
    /// Returns `Ok(false)` for stale handles (no-op). Remove-hooks fire per
    /// component the entity held, after the archetype eviction and before
    /// the id is recycled, so the handle a callback receives is still the
    /// current one.
    pub fn destroy(&self, entity: Entity) -> EcsResult<bool> {
        self.try_lock()?.despawn(entity)
    }

    /// Destroys a list of entities under a single lock acquisition.
    ///
    /// Hooks fire per entity, after each entity's eviction and before its
    /// id is recycled. Stale handles in the list are skipped.
    pub fn destroy_batch(&self, entities: &[Entity]) -> EcsResult<()> {
        let mut inner = self.try_lock()?;
        for &entity in entities {
            inner.despawn(entity)?;
        }
        Ok(())
    }

    /// Returns `true` if the handle refers to a live entity.
    pub fn alive(&self, entity: Entity) -> bool {
        self.lock().directory.alive(entity)
    }

    // ── Component operations ────────────────────────────────────────────

    /// Adds the component types of `S` to an entity, value-initialized.
    ///
    /// Components the entity already has are left untouched. A stale handle
    /// makes this a no-op. The change is atomic: one migration, hooks fire
    /// after the commit for each component that actually appeared.
    pub fn add<S: ComponentSet>(&self, entity: Entity) -> EcsResult<()> {
        let ids = S::component_ids();
        self.try_lock()?.apply(entity, &ids, &[], Vec::new())
    }

    /// Adds one component with an explicit value.
    ///
    /// If the entity already has `T`, the stored value is overwritten and
    /// no hook fires; otherwise the component is added as by
    /// [`add`](Self::add) and then set to `value`.
    pub fn add_with<T: Component>(&self, entity: Entity, value: T) -> EcsResult<()> {
        let component_id = component_id_of::<T>();
        self.try_lock()?.apply(
            entity,
            &[component_id],
            &[],
            vec![(component_id, Box::new(value) as Box<dyn Any>)],
        )
    }

    /// Removes the component types of `S` from an entity.
    ///
    /// Components the entity lacks are ignored (no hook fires for them). A
    /// stale handle makes this a no-op.
    pub fn remove<S: ComponentSet>(&self, entity: Entity) -> EcsResult<()> {
        let ids = S::component_ids();
        self.try_lock()?.apply(entity, &[], &ids, Vec::new())
    }

    /// Returns the entity's `T` component, if the entity is alive and has
    /// one.
    ///
    /// The returned guard holds the world lock; drop it before calling any
    /// other world method on the same thread.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<ComponentRef<'_, T>> {
        let component_id = component_id_of::<T>();
        let mut guard = self.lock();

        let location = guard.directory.location(entity)?;
        let archetype_id = location.archetype?;
        let value = guard.archetypes[archetype_id as usize]
            .component_mut::<T>(component_id, location.row)? as *mut T;

        Some(ComponentRef { _guard: guard, value, _marker: PhantomData })
    }

    /// Returns `true` if the entity is alive and has a `T` component.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        let component_id = component_id_of::<T>();
        let inner = self.lock();
        inner
            .directory
            .location(entity)
            .and_then(|location| location.archetype)
            .map(|archetype_id| inner.archetypes[archetype_id as usize].has(component_id))
            .unwrap_or(false)
    }

    // ── Iteration ───────────────────────────────────────────────────────

    /// Visits every entity carrying all components of `Q`, one row at a
    /// time, under the world lock.
    ///
    /// Rows are visited in ascending index order within an archetype;
    /// archetype visit order is unspecified and may change between calls.
    /// The closure must not call back into the world.
    pub fn for_each<Q: QuerySet, F>(&self, f: F)
    where
        F: for<'a> FnMut(Q::Item<'a>),
    {
        self.each_filtered::<Q, F>(Q::signature(), Signature::default(), f);
    }

    /// Visits every matching non-empty archetype once with contiguous
    /// column slices, under the world lock.
    ///
    /// Each slice tuple shares one row count; the memory is valid only for
    /// the duration of the callback.
    pub fn for_each_chunk<Q: QuerySet, F>(&self, f: F)
    where
        F: for<'a> FnMut(Q::Chunk<'a>),
    {
        self.each_chunk_filtered::<Q, F>(Q::signature(), Signature::default(), f);
    }

    /// Parallel per-entity iteration.
    ///
    /// Matching archetypes are snapshotted under the lock; the lock is
    /// released before rows are dispatched to the rayon pool.
    ///
    /// ## Caller contract
    /// While the dispatch is in flight, no thread may mutate world
    /// structure (entity create/destroy, component add/remove, resource
    /// replacement), and distinct callback invocations must not write to
    /// shared memory. Rows are disjoint, so callbacks that only mutate
    /// their own row uphold this automatically.
    pub fn parallel_for_each<Q: QuerySet, F>(&self, f: F)
    where
        F: for<'a> Fn(Q::Item<'a>) + Send + Sync,
    {
        let include = Q::signature();
        let work: Vec<(Q::Ptrs, usize)> = {
            let mut inner = self.lock();
            let mut work = Vec::new();
            for archetype in inner.archetypes.iter_mut() {
                if archetype.is_empty() || !archetype.signature().is_superset_of(&include) {
                    continue;
                }
                if let Some(ptrs) = Q::base_pointers(archetype) {
                    work.push((ptrs, archetype.len()));
                }
            }
            work
        };

        for (ptrs, rows) in work {
            (0..rows)
                .into_par_iter()
                .for_each(|row| f(unsafe { Q::item_at(ptrs, row) }));
        }
    }

    /// Parallel per-chunk iteration.
    ///
    /// Archetypes are subdivided into ranges of at most
    /// [`PARALLEL_CHUNK_ROWS`] rows under the lock; the lock is released
    /// before the ranges are dispatched to the rayon pool. Same caller
    /// contract as [`parallel_for_each`](Self::parallel_for_each).
    pub fn parallel_for_each_chunk<Q: QuerySet, F>(&self, f: F)
    where
        F: for<'a> Fn(Q::Chunk<'a>) + Send + Sync,
    {
        let include = Q::signature();
        let chunks: Vec<(Q::Ptrs, usize, usize)> = {
            let mut inner = self.lock();
            let mut chunks = Vec::new();
            for archetype in inner.archetypes.iter_mut() {
                if archetype.is_empty() || !archetype.signature().is_superset_of(&include) {
                    continue;
                }
                let total = archetype.len();
                if let Some(ptrs) = Q::base_pointers(archetype) {
                    let mut start = 0;
                    while start < total {
                        let count = PARALLEL_CHUNK_ROWS.min(total - start);
                        chunks.push((ptrs, start, count));
                        start += count;
                    }
                }
            }
            chunks
        };

        chunks
            .into_par_iter()
            .for_each(|(ptrs, start, count)| f(unsafe { Q::slice(ptrs, start, count) }));
    }

    /// Starts a filtered query over the components of `Q`.
    pub fn query<Q: QuerySet>(&self) -> Query<'_, Q> {
        Query::new(self)
    }

    pub(crate) fn each_filtered<Q: QuerySet, F>(
        &self,
        include: Signature,
        exclude: Signature,
        mut f: F,
    ) where
        F: for<'a> FnMut(Q::Item<'a>),
    {
        let mut inner = self.lock();
        for archetype in inner.archetypes.iter_mut() {
            if archetype.is_empty()
                || !archetype.signature().is_superset_of(&include)
                || !archetype.signature().is_disjoint(&exclude)
            {
                continue;
            }
            let Some(ptrs) = Q::base_pointers(archetype) else {
                continue;
            };
            let rows = archetype.len();
            for row in 0..rows {
                f(unsafe { Q::item_at(ptrs, row) });
            }
        }
    }

    pub(crate) fn each_chunk_filtered<Q: QuerySet, F>(
        &self,
        include: Signature,
        exclude: Signature,
        mut f: F,
    ) where
        F: for<'a> FnMut(Q::Chunk<'a>),
    {
        let mut inner = self.lock();
        for archetype in inner.archetypes.iter_mut() {
            if archetype.is_empty()
                || !archetype.signature().is_superset_of(&include)
                || !archetype.signature().is_disjoint(&exclude)
            {
                continue;
            }
            let Some(ptrs) = Q::base_pointers(archetype) else {
                continue;
            };
            let rows = archetype.len();
            f(unsafe { Q::slice(ptrs, 0, rows) });
        }
    }

    // ── Resources ───────────────────────────────────────────────────────

    /// Inserts or replaces the singleton resource of type `T`.
    ///
    /// The previous value, if any, is dropped while the world lock is held;
    /// a resource's `Drop` must not call back into the world.
    pub fn set_resource<T: Any + Send>(&self, value: T) {
        let index = resource_index_of::<T>();
        self.lock().resources.insert(index, Box::new(value));
    }

    /// Returns the singleton resource of type `T`.
    ///
    /// The returned guard holds the world lock; drop it before calling any
    /// other world method on the same thread.
    ///
    /// ## Panics
    /// Panics if no `T` resource was ever set. Use
    /// [`has_resource`](Self::has_resource) to probe first.
    pub fn get_resource<T: Any + Send>(&self) -> ResourceRef<'_, T> {
        let index = resource_index_of::<T>();
        let mut guard = self.lock();

        let value = match guard
            .resources
            .get_mut(index)
            .and_then(|any| any.downcast_mut::<T>())
        {
            Some(value) => value as *mut T,
            None => panic!("resource {} was never set", type_name::<T>()),
        };

        ResourceRef { _guard: guard, value, _marker: PhantomData }
    }

    /// Returns `true` if a `T` resource is currently set.
    pub fn has_resource<T: Any + Send>(&self) -> bool {
        let index = resource_index_of::<T>();
        self.lock().resources.contains(index)
    }

    // ── Event hooks ─────────────────────────────────────────────────────

    /// Registers a callback fired after a `T` component is added to an
    /// entity.
    ///
    /// Callbacks fire in registration order, after the migration commits,
    /// while the world lock is held. A callback must not call back into the
    /// world; defer follow-up work to a queue.
    pub fn on_component_added<T: Component>(
        &self,
        callback: impl FnMut(Entity) + Send + 'static,
    ) {
        let component_id = component_id_of::<T>();
        self.lock().hooks.on_add(component_id, Box::new(callback));
    }

    /// Registers a callback fired after a `T` component is removed from an
    /// entity (including on entity destruction).
    ///
    /// Same discipline as [`on_component_added`](Self::on_component_added).
    pub fn on_component_removed<T: Component>(
        &self,
        callback: impl FnMut(Entity) + Send + 'static,
    ) {
        let component_id = component_id_of::<T>();
        self.lock().hooks.on_remove(component_id, Box::new(callback));
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.lock().directory.live_count()
    }

    /// Number of archetypes currently holding at least one entity.
    ///
    /// Archetypes whose population has migrated away entirely are retained
    /// internally as storage caches but are not counted here.
    pub fn archetype_count(&self) -> usize {
        self.lock()
            .archetypes
            .iter()
            .filter(|archetype| !archetype.is_empty())
            .count()
    }

    /// Summarizes the world's storage footprint.
    pub fn memory_usage(&self) -> MemoryUsage {
        let inner = self.lock();
        let mut usage = MemoryUsage {
            directory_bytes: inner.directory.metadata_bytes(),
            archetypes: inner.archetypes.len(),
            ..MemoryUsage::default()
        };
        for archetype in &inner.archetypes {
            usage.entities += archetype.len();
            usage.component_bytes += archetype.component_bytes();
        }
        usage
    }
}

/// Storage footprint summary returned by [`World::memory_usage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Entities resident in archetype storage.
    pub entities: usize,

    /// Archetypes allocated, including empty storage caches.
    pub archetypes: usize,

    /// Bytes of live component data across all columns.
    pub component_bytes: usize,

    /// Bytes of entity directory metadata.
    pub directory_bytes: usize,
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entities in {} archetypes, {} bytes of component data, {} bytes of directory metadata",
            self.entities, self.archetypes, self.component_bytes, self.directory_bytes
        )
    }
}

/// Lock-holding reference to one entity's component.
///
/// Holds the world mutex for its lifetime; the referenced component cannot
/// move or be dropped while the guard exists.
pub struct ComponentRef<'w, T> {
    _guard: MutexGuard<'w, WorldInner>,
    value: *mut T,
    _marker: PhantomData<&'w mut T>,
}

impl<T> Deref for ComponentRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // The guard serializes all world access and the pointer targets
        // column storage owned by the guarded state.
        unsafe { &*self.value }
    }
}

impl<T> DerefMut for ComponentRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.value }
    }
}

/// Lock-holding reference to a singleton resource.
///
/// Holds the world mutex for its lifetime.
pub struct ResourceRef<'w, T> {
    _guard: MutexGuard<'w, WorldInner>,
    value: *mut T,
    _marker: PhantomData<&'w mut T>,
}

impl<T> Deref for ResourceRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.value }
    }
}

impl<T> DerefMut for ResourceRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.value }
    }
}
