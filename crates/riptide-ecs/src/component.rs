//! Component type registration and per-type pass properties.
//!
//! Every component type that takes part in a scene is given a small integer
//! [`ComponentTypeId`] the first time the [`ComponentRegistry`] sees it. Ids
//! are handed out in order, so iterating ids in ascending order visits types
//! in registration order. A separate [`Property`] mask selects which frame
//! passes (update, render, HUD) walk a type's components.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Hard limit on the number of distinct component types.
pub const MAX_COMPONENT_TYPES: usize = 256;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u8);

impl ComponentTypeId {
    /// Position of this type in registration order.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// Bitmask of frame passes a component type participates in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Property(u8);

impl Property {
    /// Not visited by any pass.
    pub const NONE: Property = Property(0);
    /// Visited by the update pass.
    pub const UPDATE: Property = Property(1);
    /// Visited by the world render pass.
    pub const RENDER: Property = Property(1 << 1);
    /// Visited by the HUD render pass.
    pub const HUD: Property = Property(1 << 2);

    /// Raw bits.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    #[inline]
    pub fn contains(self, other: Property) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Property {
    type Output = Property;

    fn bitor(self, rhs: Property) -> Property {
        Property(self.0 | rhs.0)
    }
}

impl BitOrAssign for Property {
    fn bitor_assign(&mut self, rhs: Property) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Property::UPDATE) {
            names.push("UPDATE");
        }
        if self.contains(Property::RENDER) {
            names.push("RENDER");
        }
        if self.contains(Property::HUD) {
            names.push("HUD");
        }
        if names.is_empty() {
            names.push("NONE");
        }
        write!(f, "Property({})", names.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Id assigned on first sight.
    pub id: ComponentTypeId,
    /// `std::any::type_name::<T>()`, for diagnostics only.
    pub name: &'static str,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
    /// Pass mask. `None` until [`ComponentRegistry::register`] has been called.
    pub properties: Option<Property>,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and pass properties.
///
/// Built once at startup and owned by the scene; nothing here is global, so
/// two scenes never disagree about the id of a type they registered in the
/// same order.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Indexed by `ComponentTypeId.0`.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The id of `T`, assigning the next free id if `T` has not been seen.
    ///
    /// # Panics
    ///
    /// Panics when more than [`MAX_COMPONENT_TYPES`] types are requested.
    pub fn ensure<T: 'static>(&mut self) -> ComponentTypeId {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return existing;
        }

        assert!(
            self.infos.len() < MAX_COMPONENT_TYPES,
            "exceeded {MAX_COMPONENT_TYPES} component types while registering '{}'",
            std::any::type_name::<T>()
        );

        let id = ComponentTypeId(self.infos.len() as u8);
        self.infos.push(ComponentInfo {
            id,
            name: std::any::type_name::<T>(),
            type_id: rust_type_id,
            properties: None,
        });
        self.by_type.insert(rust_type_id, id);
        tracing::debug!(component = id.0, name = std::any::type_name::<T>(), "component type assigned");
        id
    }

    /// Associate `T` with a pass mask, assigning an id if needed.
    ///
    /// Registering the same type again with the same mask is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `T` was already registered with a different mask.
    pub fn register<T: 'static>(&mut self, properties: Property) -> ComponentTypeId {
        let id = self.ensure::<T>();
        let info = &mut self.infos[id.index()];
        match info.properties {
            Some(existing) if existing != properties => panic!(
                "component type '{}' registered twice with conflicting properties ({:?} vs {:?})",
                info.name, existing, properties
            ),
            _ => info.properties = Some(properties),
        }
        id
    }

    /// Look up the id of `T` without assigning one.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Pass mask of a type; types never passed to [`register`](Self::register)
    /// report [`Property::NONE`].
    pub fn properties(&self, id: ComponentTypeId) -> Property {
        self.infos
            .get(id.index())
            .and_then(|info| info.properties)
            .unwrap_or(Property::NONE)
    }

    /// Metadata for a registered type.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Ids of every type whose mask contains `property`, in registration order.
    pub fn ids_with(&self, property: Property) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.infos
            .iter()
            .filter(move |info| info.properties.unwrap_or(Property::NONE).contains(property))
            .map(|info| info.id)
    }

    /// Total number of known component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether no type has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
