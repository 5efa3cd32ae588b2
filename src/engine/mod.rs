//! # Engine Module
//!
//! Internal ECS engine implementation.
//!
//! This module contains all core ECS building blocks:
//! - Identifiers, signatures, and capacity constants
//! - The component registry and type-erased column storage
//! - Entity identity and the entity directory
//! - Archetypes and the migration machinery
//! - Query construction and execution
//! - Resources and event hooks
//! - The `World` façade and its locking discipline
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod component;
pub mod storage;
pub mod entity;
pub mod archetype;
pub mod query;
pub mod events;
pub mod resource;
pub mod world;
