//! Process-scoped singleton resources.
//!
//! A resource is one value per type, keyed by the type's registry index
//! (resources share the component index space, but never occupy archetype
//! columns). The table owns its values; they are dropped when replaced or
//! when the world is destroyed, in unspecified order.

use std::any::Any;
use std::collections::HashMap;

use crate::engine::types::ComponentId;

/// Type-keyed singleton storage.
#[derive(Default)]
pub struct ResourceTable {
    values: HashMap<ComponentId, Box<dyn Any + Send>>,
}

impl ResourceTable {
    /// Inserts or replaces the value stored under `index`.
    ///
    /// The previous value, if any, is dropped before this returns.
    pub fn insert(&mut self, index: ComponentId, value: Box<dyn Any + Send>) {
        self.values.insert(index, value);
    }

    /// Returns the value stored under `index`, mutably.
    pub fn get_mut(&mut self, index: ComponentId) -> Option<&mut (dyn Any + Send)> {
        self.values.get_mut(&index).map(|boxed| boxed.as_mut())
    }

    /// Returns `true` if a value is stored under `index`.
    pub fn contains(&self, index: ComponentId) -> bool {
        self.values.contains_key(&index)
    }
}
