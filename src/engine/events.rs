//! Component add/remove event hooks.
//!
//! The world keeps a per-component-type list of callbacks fired when a
//! component is added to or removed from an entity. Callbacks run in
//! registration order, after the structural change has committed and while
//! the world mutex is still held.
//!
//! Hooks are event announcements: a callback must not call back into the
//! world (every public entry takes the same mutex, so re-entry deadlocks).
//! Callbacks that need to mutate should record the entity and defer the
//! work to a queue drained outside the hook.

use std::collections::HashMap;

use crate::engine::entity::Entity;
use crate::engine::types::ComponentId;

/// Callback invoked with the affected entity.
pub type HookFn = Box<dyn FnMut(Entity) + Send>;

/// Callback lists for one component type.
#[derive(Default)]
struct ComponentHooks {
    on_add: Vec<HookFn>,
    on_remove: Vec<HookFn>,
}

/// Per-component-type hook registry.
#[derive(Default)]
pub struct HookTable {
    handlers: HashMap<ComponentId, ComponentHooks>,
}

impl HookTable {
    /// Appends an add-hook for `component_id`.
    pub fn on_add(&mut self, component_id: ComponentId, callback: HookFn) {
        self.handlers
            .entry(component_id)
            .or_default()
            .on_add
            .push(callback);
    }

    /// Appends a remove-hook for `component_id`.
    pub fn on_remove(&mut self, component_id: ComponentId, callback: HookFn) {
        self.handlers
            .entry(component_id)
            .or_default()
            .on_remove
            .push(callback);
    }

    /// Fires all add-hooks registered for `component_id`, in registration
    /// order.
    pub fn fire_added(&mut self, component_id: ComponentId, entity: Entity) {
        if let Some(hooks) = self.handlers.get_mut(&component_id) {
            for callback in hooks.on_add.iter_mut() {
                callback(entity);
            }
        }
    }

    /// Fires all remove-hooks registered for `component_id`, in
    /// registration order.
    pub fn fire_removed(&mut self, component_id: ComponentId, entity: Entity) {
        if let Some(hooks) = self.handlers.get_mut(&component_id) {
            for callback in hooks.on_remove.iter_mut() {
                callback(entity);
            }
        }
    }
}
