//! Riptide ECS -- generational handles and component type bookkeeping.
//!
//! This crate provides the bookkeeping layer the Riptide scene is built on.
//! Entities live in a fixed-capacity [`SlotTable`](entity::SlotTable) and are
//! addressed by 32-bit [`Handle`](entity::Handle)s whose generation half makes
//! references that outlive their target detectable. Component types get a
//! small id and a pass mask from the [`ComponentRegistry`](component::ComponentRegistry).
//!
//! # Quick Start
//!
//! ```
//! use riptide_ecs::prelude::*;
//!
//! struct Health(u32);
//!
//! let mut registry = ComponentRegistry::new();
//! let id = registry.register::<Health>(Property::UPDATE | Property::RENDER);
//! assert!(registry.properties(id).contains(Property::UPDATE));
//!
//! let mut table = SlotTable::with_capacity(16);
//! let h = table.insert(Health(10)).unwrap();
//! assert_eq!(table.get(h).map(|hp| hp.0), Some(10));
//! table.remove(h);
//! assert!(table.get(h).is_none());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by handle and component lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The handle's generation no longer matches its slot, or the slot was
    /// never allocated.
    #[error("handle {handle:?} is stale or was never allocated")]
    StaleHandle { handle: entity::Handle },

    /// Every slot of the table is occupied.
    #[error("entity capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    /// The entity is alive but has no component of the requested type.
    #[error("entity {handle:?} has no '{name}' component")]
    ComponentNotFound {
        handle: entity::Handle,
        name: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        ComponentInfo, ComponentRegistry, ComponentTypeId, Property, MAX_COMPONENT_TYPES,
    };
    pub use crate::entity::{Handle, SlotTable, MAX_SLOTS};
    pub use crate::EcsError;
}
