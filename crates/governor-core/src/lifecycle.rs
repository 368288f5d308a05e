//! Lifecycle events reported by storage when a tracked entity is saved.

use serde::{Deserialize, Serialize};

/// Why an entity was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// First successful insert of a new entity; its identity is assigned.
    Created,
    /// Save of an entity that already existed.
    Updated,
    /// Raw load from a fixture or backup; not a genuine creation.
    Restored,
}

impl LifecycleEvent {
    /// Only genuine creations trigger grant materialization.
    pub fn is_genuine_creation(self) -> bool {
        matches!(self, LifecycleEvent::Created)
    }
}
