//! # Component Registry
//!
//! This module provides a global registry that assigns stable [`ComponentId`]
//! values to Rust component types and exposes type-erased storage factories
//! for archetype column allocation.
//!
//! ## Purpose
//! The registry decouples component type information (`TypeId`, name, size,
//! alignment) from runtime storage, enabling archetypes to store
//! heterogeneous component columns behind `ColumnStorage`.
//!
//! ## Design
//! - Components are assigned a compact `ComponentId` in `[0, MAX_COMPONENTS)`
//!   on first mention, monotonically from 0.
//! - Registration is idempotent: concurrent first-uses of the same type
//!   observe the same ID (double-checked under a `RwLock`).
//! - A per-component factory function is stored for constructing empty
//!   column storage.
//! - Resource types share the same index space but register without a
//!   factory, since they never occupy archetype columns.
//!
//! ## Invariants
//! - `ComponentId` values are unique and stable for the lifetime of the
//!   process.
//! - A type used as an archetype component always has a storage factory.
//! - Two distinct types are never aliased to the same ID; exhausting
//!   [`MAX_COMPONENTS`] is a fatal programming error.
//!
//! ## Concurrency
//! The registry is protected by `RwLock` for concurrent reads and serialized
//! writes.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    mem::{align_of, size_of},
    sync::{OnceLock, RwLock},
};

use smallvec::SmallVec;

use crate::engine::error::RegistryError;
use crate::engine::storage::{Column, ColumnStorage};
use crate::engine::types::{ComponentId, Signature, MAX_COMPONENTS};

/// Marker trait for types that can live in archetype columns.
///
/// Components are plain data: they must be thread-portable (`Send + Sync`),
/// own their contents (`'static`), and be value-initializable (`Default`)
/// so migration can materialize newly added components before a caller
/// supplies a value.
pub trait Component: Send + Sync + Default + 'static {}

impl<T: Send + Sync + Default + 'static> Component for T {}

/// Factory function for constructing an empty type-erased component column.
type FactoryFn = fn() -> Box<dyn ColumnStorage>;

/// Constructs an empty column for component type `T`.
///
/// Used as the registered factory for a component ID.
fn new_column_storage<T: Component>() -> Box<dyn ColumnStorage> {
    Box::new(Column::<T>::default())
}

/// Global mapping between Rust component types and compact `ComponentId`
/// values.
///
/// ## Invariants
/// - Every entry in `by_type` has a matching `by_id[id]`.
/// - IDs are always in bounds of `MAX_COMPONENTS`.
/// - `factories[id]` is `Some` for every ID that has been used as an
///   archetype component.
struct ComponentRegistry {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<Option<ComponentDesc>>,
    factories: Vec<Option<FactoryFn>>,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

fn component_registry() -> &'static RwLock<ComponentRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(ComponentRegistry {
            next_id: 0 as ComponentId,
            by_type: HashMap::new(),
            by_id: vec![None; MAX_COMPONENTS],
            factories: vec![None; MAX_COMPONENTS],
        })
    })
}

impl ComponentRegistry {
    fn alloc_id(&mut self) -> Result<ComponentId, RegistryError> {
        let component_id = self.next_id;
        if (component_id as usize) >= MAX_COMPONENTS {
            return Err(RegistryError::CapacityExceeded { cap: MAX_COMPONENTS });
        }
        self.next_id = component_id.wrapping_add(1);
        Ok(component_id)
    }
}

/// Returns the ID for type `T`, registering it on first mention.
///
/// `factory` is installed alongside the ID when provided and not already
/// present, so a type first seen as a resource can later grow a column
/// factory when used as a component.
fn get_or_register(
    type_id: TypeId,
    desc: fn() -> ComponentDesc,
    factory: Option<FactoryFn>,
) -> Result<ComponentId, RegistryError> {
    // Fast path: already registered with everything the caller needs.
    {
        let registry = component_registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        if let Some(&id) = registry.by_type.get(&type_id) {
            if factory.is_none() || registry.factories[id as usize].is_some() {
                return Ok(id);
            }
        }
    }

    let mut registry = component_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;

    let id = match registry.by_type.get(&type_id) {
        Some(&id) => id,
        None => {
            let id = registry.alloc_id()?;
            registry.by_type.insert(type_id, id);
            registry.by_id[id as usize] = Some(desc().with_id(id));
            id
        }
    };

    if let Some(factory) = factory {
        if registry.factories[id as usize].is_none() {
            registry.factories[id as usize] = Some(factory);
        }
    }

    Ok(id)
}

/// Returns the `ComponentId` for component type `T`, registering it on
/// first mention.
///
/// ## Errors
/// Returns `RegistryError::CapacityExceeded` once more than
/// [`MAX_COMPONENTS`] distinct types have been mentioned, and
/// `RegistryError::PoisonedLock` if a registering thread panicked.
pub fn try_component_id_of<T: Component>() -> Result<ComponentId, RegistryError> {
    get_or_register(
        TypeId::of::<T>(),
        ComponentDesc::of::<T>,
        Some(new_column_storage::<T>),
    )
}

/// Returns the `ComponentId` for component type `T`, registering it on
/// first mention.
///
/// ## Panics
/// Panics if more than [`MAX_COMPONENTS`] distinct component types are
/// registered. This is a programming error: the capacity is a compile-time
/// constant and the set of component types is fixed by the program.
pub fn component_id_of<T: Component>() -> ComponentId {
    match try_component_id_of::<T>() {
        Ok(id) => id,
        Err(e) => panic!("component registration failed for {}: {e}", type_name::<T>()),
    }
}

/// Returns the index for resource type `T`, registering it on first mention.
///
/// Resources share the component index space but install no column factory.
///
/// ## Panics
/// Panics under the same conditions as [`component_id_of`].
pub(crate) fn resource_index_of<T: Any + Send>() -> ComponentId {
    match get_or_register(TypeId::of::<T>(), ComponentDesc::of::<T>, None) {
        Ok(id) => id,
        Err(e) => panic!("resource registration failed for {}: {e}", type_name::<T>()),
    }
}

/// Returns a copy of the descriptor for `component_id`, if registered.
pub fn component_desc(component_id: ComponentId) -> Option<ComponentDesc> {
    let registry = component_registry().read().ok()?;
    registry
        .by_id
        .get(component_id as usize)
        .and_then(|entry| *entry)
}

/// Creates an empty type-erased storage column for `component_id`.
///
/// ## Errors
/// Returns `RegistryError::MissingFactory` if the ID is out of range, was
/// never registered, or belongs to a resource-only type.
pub(crate) fn make_empty_column(
    component_id: ComponentId,
) -> Result<Box<dyn ColumnStorage>, RegistryError> {
    let idx = component_id as usize;
    if idx >= MAX_COMPONENTS {
        return Err(RegistryError::MissingFactory { component_id });
    }

    let factory = {
        let registry = component_registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        registry.factories[idx].ok_or(RegistryError::MissingFactory { component_id })?
    };

    Ok(factory())
}

/// Describes a registered component type.
///
/// ## Purpose
/// Provides metadata about a component type for debugging, validation, and
/// the memory-usage summary.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T` using its `TypeId`, name, size,
    /// and alignment.
    ///
    /// ## Notes
    /// The returned descriptor uses `component_id = 0` and is finalized via
    /// `with_id` during registration.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self {
            component_id: 0,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }

    /// Returns `true` if this descriptor refers to type `T`.
    #[inline]
    pub fn matches_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns a copy of this descriptor with `component_id` set.
    #[inline]
    pub fn with_id(mut self, component_id: ComponentId) -> Self {
        self.component_id = component_id;
        self
    }
}

impl std::fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

/// A statically known set of component types.
///
/// Implemented for tuples of up to eight component types. Used for add and
/// remove operations and for query exclusion lists, where only the
/// *identity* of the types matters, not their values:
///
/// ```ignore
/// world.add::<(Position, Velocity)>(entity)?;
/// world.remove::<(Velocity,)>(entity)?;
/// ```
pub trait ComponentSet: 'static {
    /// Returns the registry IDs of the member types, registering them on
    /// first mention. Order follows the tuple declaration.
    fn component_ids() -> SmallVec<[ComponentId; 8]>;

    /// Builds the signature bitset of the member types.
    fn signature() -> Signature {
        Signature::from_ids(&Self::component_ids())
    }
}

macro_rules! impl_component_set {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            fn component_ids() -> SmallVec<[ComponentId; 8]> {
                let mut ids = SmallVec::new();
                $(ids.push(component_id_of::<$ty>());)+
                ids
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Alpha(#[allow(dead_code)] u32);

    #[derive(Default)]
    struct Beta(#[allow(dead_code)] f64);

    #[test]
    fn registration_is_idempotent() {
        let first = component_id_of::<Alpha>();
        let second = component_id_of::<Alpha>();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_types_get_distinct_ids() {
        assert_ne!(component_id_of::<Alpha>(), component_id_of::<Beta>());
    }

    #[test]
    fn descriptor_reflects_layout() {
        let id = component_id_of::<Beta>();
        let desc = component_desc(id).expect("registered");
        assert!(desc.matches_type::<Beta>());
        assert_eq!(desc.size, std::mem::size_of::<Beta>());
        assert_eq!(desc.align, std::mem::align_of::<Beta>());
    }

    #[test]
    fn component_set_ids_follow_declaration_order() {
        let ids = <(Alpha, Beta)>::component_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], component_id_of::<Alpha>());
        assert_eq!(ids[1], component_id_of::<Beta>());

        let signature = <(Alpha, Beta)>::signature();
        assert!(signature.has(ids[0]));
        assert!(signature.has(ids[1]));
        assert_eq!(signature.count(), 2);
    }

    #[test]
    fn registered_component_has_a_factory() {
        let id = component_id_of::<Alpha>();
        let column = make_empty_column(id).expect("factory installed");
        assert_eq!(column.len(), 0);
        assert_eq!(column.element_type_id(), TypeId::of::<Alpha>());
    }
}
