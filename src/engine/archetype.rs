//! Archetype storage.
//!
//! An archetype groups every entity that carries exactly the same set of
//! component types. Storage is columnar: one contiguous, type-erased column
//! per component in the signature, plus a parallel column of entity handles
//! giving the entity at each row.
//!
//! Archetypes are pure storage containers. All mutation is orchestrated by
//! the world's migration machinery, which keeps the entity column and every
//! component column in lock-step so the row-parity invariant is never
//! observably violated.

use crate::engine::component::Component;
use crate::engine::entity::Entity;
use crate::engine::error::{EcsError, EcsResult, RegistryError};
use crate::engine::storage::{Column, ColumnStorage};
use crate::engine::types::{ArchetypeId, ComponentId, Signature, MAX_COMPONENTS};

/// Stores entities that share an identical component signature.
///
/// ## Invariants
/// - Every component column named by the signature, once allocated, has
///   length equal to `entities.len()`.
/// - Column slots outside the signature are always `None`.
/// - The signature is fixed at construction; it is the archetype's identity
///   in the world's archetype map.
pub struct Archetype {
    archetype_id: ArchetypeId,
    signature: Signature,
    entities: Vec<Entity>,
    columns: Vec<Option<Box<dyn ColumnStorage>>>,
}

impl Archetype {
    /// Creates a new empty archetype for `signature`.
    ///
    /// Component columns are *not* allocated here; they materialize lazily
    /// through [`ensure_column`](Self::ensure_column) when they first
    /// receive a value, so the column vtable can be inherited from the
    /// archetype an entity migrates out of.
    pub fn new(archetype_id: ArchetypeId, signature: Signature) -> Self {
        Self {
            archetype_id,
            signature,
            entities: Vec::new(),
            columns: (0..MAX_COMPONENTS).map(|_| None).collect(),
        }
    }

    /// Returns the `ArchetypeId` associated with this archetype.
    ///
    /// Stable for the lifetime of the world.
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype_id
    }

    /// Returns the archetype's signature.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns the number of entities stored in the archetype.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the archetype holds no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if the signature contains the component.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        self.signature.has(component_id)
    }

    /// The entity handle stored at each row.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Guarantees that a column exists for `component_id`.
    ///
    /// ## Behavior
    /// - Allocates the column with `factory` if not already present.
    /// - The component must be part of this archetype's signature.
    ///
    /// ## Errors
    /// Propagates factory failures (e.g. a missing registry factory).
    pub fn ensure_column(
        &mut self,
        component_id: ComponentId,
        factory: impl FnOnce() -> Result<Box<dyn ColumnStorage>, RegistryError>,
    ) -> EcsResult<()> {
        debug_assert!(
            self.signature.has(component_id),
            "ensure_column: component {component_id} not in archetype signature"
        );

        let index = component_id as usize;
        if index >= MAX_COMPONENTS {
            return Err(EcsError::Registry(RegistryError::MissingFactory { component_id }));
        }

        if self.columns[index].is_none() {
            let column = factory()?;
            log::trace!(
                "archetype {}: allocated column for component {} ({})",
                self.archetype_id,
                component_id,
                column.element_type_name()
            );
            self.columns[index] = Some(column);
        }

        Ok(())
    }

    /// Returns the column for a component, if allocated.
    #[inline]
    pub fn column(&self, component_id: ComponentId) -> Option<&dyn ColumnStorage> {
        self.columns
            .get(component_id as usize)
            .and_then(|slot| slot.as_deref())
    }

    /// Returns the column for a component mutably, if allocated.
    #[inline]
    pub fn column_mut(&mut self, component_id: ComponentId) -> Option<&mut dyn ColumnStorage> {
        match self.columns.get_mut(component_id as usize) {
            Some(Some(column)) => Some(column.as_mut()),
            _ => None,
        }
    }

    /// Returns the typed element at `row` of the component's column.
    pub fn component<T: Component>(&self, component_id: ComponentId, row: usize) -> Option<&T> {
        self.column(component_id)?
            .as_any()
            .downcast_ref::<Column<T>>()?
            .get(row)
    }

    /// Returns the typed element at `row` of the component's column,
    /// mutably.
    pub fn component_mut<T: Component>(
        &mut self,
        component_id: ComponentId,
        row: usize,
    ) -> Option<&mut T> {
        self.column_mut(component_id)?
            .as_any_mut()
            .downcast_mut::<Column<T>>()?
            .get_mut(row)
    }

    /// Returns the base pointer and length of the component's column,
    /// typed.
    ///
    /// Used by the query engine; the pointer stays valid while the world
    /// lock is held (or, for parallel snapshots, while the caller honors
    /// the no-structural-mutation contract).
    pub(crate) fn column_ptr<T: Component>(&mut self) -> Option<(*mut T, usize)> {
        let column = self
            .column_mut(crate::engine::component::component_id_of::<T>())?
            .as_any_mut()
            .downcast_mut::<Column<T>>()?;
        let len = column.len();
        Some((column.base_ptr(), len))
    }

    /// Appends an entity row, returning its index.
    ///
    /// Component columns must be grown separately, in lock-step, by the
    /// migration machinery.
    pub fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Removes the entity row at `row`, filling the hole with the tail row.
    ///
    /// Returns the entity that now occupies `row`, or `None` if the tail
    /// itself was removed. Component columns must be shrunk separately, in
    /// lock-step.
    pub fn swap_remove_entity(&mut self, row: usize) -> Option<Entity> {
        let last = self.entities.len() - 1;
        let moved = (row != last).then(|| self.entities[last]);
        self.entities.swap_remove(row);
        moved
    }

    /// Total bytes of component data stored in this archetype.
    pub fn component_bytes(&self) -> usize {
        self.signature
            .iter_ids()
            .filter_map(|component_id| self.column(component_id))
            .map(|column| column.len() * column.element_size())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::component::{component_id_of, make_empty_column};

    #[derive(Default, Debug, PartialEq)]
    struct Mass(f32);

    #[test]
    fn columns_materialize_lazily() {
        let mass_id = component_id_of::<Mass>();
        let signature = Signature::from_ids(&[mass_id]);
        let mut archetype = Archetype::new(0, signature);

        assert!(archetype.column(mass_id).is_none());
        archetype
            .ensure_column(mass_id, || make_empty_column(mass_id))
            .unwrap();
        assert!(archetype.column(mass_id).is_some());

        // Idempotent: a second call keeps the existing column.
        archetype.column_mut(mass_id).unwrap().push_default();
        archetype
            .ensure_column(mass_id, || make_empty_column(mass_id))
            .unwrap();
        assert_eq!(archetype.column(mass_id).unwrap().len(), 1);
    }

    #[test]
    fn swap_remove_entity_reports_the_filled_row() {
        let mut archetype = Archetype::new(0, Signature::default());
        let a = Entity::new(0, 0);
        let b = Entity::new(1, 0);
        let c = Entity::new(2, 0);
        archetype.push_entity(a);
        archetype.push_entity(b);
        archetype.push_entity(c);

        assert_eq!(archetype.swap_remove_entity(0), Some(c));
        assert_eq!(archetype.entities(), &[c, b]);
        assert_eq!(archetype.swap_remove_entity(1), None);
        assert_eq!(archetype.entities(), &[c]);
    }

    #[test]
    fn component_bytes_counts_allocated_columns() {
        let mass_id = component_id_of::<Mass>();
        let signature = Signature::from_ids(&[mass_id]);
        let mut archetype = Archetype::new(0, signature);
        archetype
            .ensure_column(mass_id, || make_empty_column(mass_id))
            .unwrap();

        for i in 0..8 {
            archetype.push_entity(Entity::new(i, 0));
            archetype.column_mut(mass_id).unwrap().push_default();
        }

        assert_eq!(
            archetype.component_bytes(),
            8 * std::mem::size_of::<Mass>()
        );
    }
}
