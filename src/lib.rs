//! # strata-ecs
//!
//! Archetype-based, data-oriented Entity-Component-System runtime.
//!
//! Simulation state lives in a dense columnar database keyed by entity
//! identity: entities that carry the same set of component types share an
//! *archetype*, and each archetype stores one contiguous column per
//! component. Client code iterates over the entities that match an
//! include/exclude component filter in cache-friendly order, per entity or
//! per contiguous chunk, serially or fanned out on a worker pool.
//!
//! ## Design Goals
//! - Archetype-based columnar storage for cache efficiency
//! - Generational entity handles that invalidate stale references
//! - A single coarse world mutex with a snapshot-then-release protocol for
//!   parallel iteration
//! - Type-erased columns behind a small storage trait, typed at the API
//!   boundary
//!
//! Scheduling of systems (ordering, stages, dependencies) is deliberately
//! out of scope: the runtime exposes queries, and sequencing them is the
//! caller's job.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::{
    World,
    ComponentRef,
    ResourceRef,
    MemoryUsage,
};

pub use engine::entity::{
    Entity,
    EntityLocation,
};

pub use engine::component::{
    Component,
    ComponentSet,
    ComponentDesc,
    component_id_of,
    try_component_id_of,
};

pub use engine::query::{Query, QuerySet};

pub use engine::types::{
    ComponentId,
    ArchetypeId,
    Signature,
    MAX_COMPONENTS,
    PARALLEL_CHUNK_ROWS,
};

pub use engine::error::{
    EcsResult,
    EcsError,
    RegistryError,
    ColumnError,
    MigrationError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use strata_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        World,
        Entity,
        Component,
        ComponentSet,
        Query,
        QuerySet,
        EcsResult,
        component_id_of,
    };
}
