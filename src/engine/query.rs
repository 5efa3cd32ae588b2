//! Typed query construction and execution for the ECS.
//!
//! A query names a tuple of component types to *include* and, optionally, a
//! set of component types to *exclude*. An archetype matches when its
//! signature contains every included component and none of the excluded
//! ones; matching archetypes deliver their rows either one entity at a time
//! or as contiguous column slices.
//!
//! ## Design goals
//! * **Static intent:** The component tuple fixes the callback's argument
//!   types at compile time.
//! * **Runtime efficiency:** Queries operate directly on archetype columns
//!   through base pointers without intermediate allocations.
//! * **Safety by discipline:** Distinct component types in a tuple map to
//!   distinct columns, so the mutable references handed to a callback never
//!   alias. Tuples naming the same type twice are rejected in debug builds.
//!
//! ## Execution model
//! Queries:
//! 1. Build include/exclude [`Signature`]s from the named types.
//! 2. Resolve matching archetypes at execution time under the world lock.
//! 3. Recover typed base pointers per included column.
//! 4. Invoke the caller's closure per row or per chunk.
//!
//! ## Concurrency
//! This module itself performs no parallel execution; the parallel entry
//! points on [`World`] snapshot matching archetypes under the lock and fan
//! out after releasing it.

use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::engine::archetype::Archetype;
use crate::engine::component::{component_id_of, Component, ComponentSet};
use crate::engine::types::{ComponentId, Signature};
use crate::engine::world::World;

/// Raw base pointer into one component column.
///
/// Carries `Send`/`Sync` so pointer bundles snapshotted under the world
/// lock can cross into worker threads; dereferencing remains gated by the
/// structural-stability contract of parallel iteration.
pub struct ColumnPtr<T>(pub(crate) *mut T);

impl<T> Clone for ColumnPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColumnPtr<T> {}

// Column pointers only move component data between threads; the component
// bounds (`Send + Sync`) make that sound under the disjoint-rows contract.
unsafe impl<T: Send> Send for ColumnPtr<T> {}
unsafe impl<T: Sync> Sync for ColumnPtr<T> {}

/// A tuple of component types that a query iterates over.
///
/// Implemented for tuples of one through eight [`Component`] types. The
/// callback of a per-entity delivery receives `(&mut A, &mut B, ...)`; a
/// per-chunk delivery receives `(&mut [A], &mut [B], ...)` slices sharing
/// one row count.
pub trait QuerySet: 'static {
    /// Base-pointer bundle for one archetype's matching columns.
    type Ptrs: Copy + Send + Sync;

    /// Per-row view: one mutable reference per included component.
    type Item<'a>;

    /// Per-chunk view: one mutable slice per included component.
    type Chunk<'a>;

    /// Registry IDs of the included types, in tuple order.
    fn component_ids() -> SmallVec<[ComponentId; 8]>;

    /// Include signature of the tuple.
    fn signature() -> Signature {
        let ids = Self::component_ids();
        let signature = Signature::from_ids(&ids);
        debug_assert_eq!(
            signature.count(),
            ids.len(),
            "query tuples must name distinct component types"
        );
        signature
    }

    /// Recovers typed base pointers for every included column of
    /// `archetype`, or `None` when a column is absent.
    fn base_pointers(archetype: &mut Archetype) -> Option<Self::Ptrs>;

    /// Builds the per-row view at `row`.
    ///
    /// ## Safety
    /// `ptrs` must come from [`base_pointers`](Self::base_pointers) on an
    /// archetype with more than `row` rows, and the underlying columns must
    /// not be structurally mutated or aliased for the lifetime of the
    /// returned references.
    unsafe fn item_at<'a>(ptrs: Self::Ptrs, row: usize) -> Self::Item<'a>;

    /// Builds the per-chunk view over rows `start..start + len`.
    ///
    /// ## Safety
    /// Same requirements as [`item_at`](Self::item_at), for the whole range.
    unsafe fn slice<'a>(ptrs: Self::Ptrs, start: usize, len: usize) -> Self::Chunk<'a>;
}

macro_rules! impl_query_set {
    ($(($ty:ident, $idx:tt)),+) => {
        impl<$($ty: Component),+> QuerySet for ($($ty,)+) {
            type Ptrs = ($(ColumnPtr<$ty>,)+);
            type Item<'a> = ($(&'a mut $ty,)+);
            type Chunk<'a> = ($(&'a mut [$ty],)+);

            fn component_ids() -> SmallVec<[ComponentId; 8]> {
                let mut ids = SmallVec::new();
                $(ids.push(component_id_of::<$ty>());)+
                ids
            }

            fn base_pointers(archetype: &mut Archetype) -> Option<Self::Ptrs> {
                Some(($(ColumnPtr(archetype.column_ptr::<$ty>()?.0),)+))
            }

            unsafe fn item_at<'a>(ptrs: Self::Ptrs, row: usize) -> Self::Item<'a> {
                ($(unsafe { &mut *ptrs.$idx.0.add(row) },)+)
            }

            unsafe fn slice<'a>(ptrs: Self::Ptrs, start: usize, len: usize) -> Self::Chunk<'a> {
                ($(unsafe { std::slice::from_raw_parts_mut(ptrs.$idx.0.add(start), len) },)+)
            }
        }
    };
}

impl_query_set!((A, 0));
impl_query_set!((A, 0), (B, 1));
impl_query_set!((A, 0), (B, 1), (C, 2));
impl_query_set!((A, 0), (B, 1), (C, 2), (D, 3));
impl_query_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_query_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_query_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_query_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

/// A filtered iteration over entities matching an include/exclude pair.
///
/// Constructed by [`World::query`]; consumed by [`each`](Query::each) or
/// [`each_chunk`](Query::each_chunk), ensuring a query definition cannot be
/// reused after execution.
///
/// ## Example
/// ```ignore
/// world
///     .query::<(Position,)>()
///     .exclude::<(Dead,)>()
///     .each(|(position,)| {
///         position.x += 1.0;
///     });
/// ```
///
/// An empty exclude set makes the query equivalent to
/// [`World::for_each`]; an exclude set overlapping the include set yields
/// nothing.
pub struct Query<'w, Q: QuerySet> {
    world: &'w World,
    exclude: Signature,
    _marker: PhantomData<fn() -> Q>,
}

impl<'w, Q: QuerySet> Query<'w, Q> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            exclude: Signature::default(),
            _marker: PhantomData,
        }
    }

    /// Excludes archetypes containing any component of `E`.
    pub fn exclude<E: ComponentSet>(mut self) -> Self {
        for component_id in E::component_ids() {
            self.exclude.set(component_id);
        }
        self
    }

    /// Visits every matching entity, one row at a time.
    ///
    /// Rows are visited in ascending index order within an archetype;
    /// archetype visit order is unspecified.
    pub fn each<F>(self, f: F)
    where
        F: for<'a> FnMut(Q::Item<'a>),
    {
        self.world
            .each_filtered::<Q, F>(Q::signature(), self.exclude, f);
    }

    /// Visits every matching non-empty archetype once, delivering
    /// contiguous column slices.
    pub fn each_chunk<F>(self, f: F)
    where
        F: for<'a> FnMut(Q::Chunk<'a>),
    {
        self.world
            .each_chunk_filtered::<Q, F>(Q::signature(), self.exclude, f);
    }
}
