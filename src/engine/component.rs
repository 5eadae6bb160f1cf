//! # Component Registry
//!
//! This module provides a global registry that assigns stable `ComponentId`
//! values to Rust component types.
//!
//! ## Purpose
//! The scheduler never stores component data — storage belongs to the
//! external storage engine. What it does need is a compact, stable
//! identifier per component *type*, so that access declarations can be
//! represented as bitsets and compared cheaply. The registry decouples type
//! information (`TypeId`, name) from those runtime identifiers.
//!
//! ## Design
//! - Components are registered once and assigned a compact `ComponentId` in
//!   `[0, COMPONENT_CAP)`.
//! - The registry can be `freeze()`d to prevent further registrations after
//!   world setup, making IDs stable for the lifetime of the process.
//!
//! ## Invariants
//! - `ComponentId` values are unique and stable for the lifetime of the
//!   process.
//! - When frozen, registration is disallowed.
//!
//! ## Concurrency
//! The registry is protected by `RwLock` for concurrent reads and
//! serialized writes. Registration is expected to happen during setup,
//! before any frames run.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

use crate::engine::types::{ComponentId, COMPONENT_CAP};


/// Global mapping between Rust component types and compact `ComponentId`
/// values.
///
/// ## Invariants
/// - Every entry in `by_type` has a matching `by_id[id]`.
/// - IDs are always in bounds of `COMPONENT_CAP`.
pub struct ComponentRegistry {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<Option<ComponentDesc>>,
    frozen: bool,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

fn component_registry() -> &'static RwLock<ComponentRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(ComponentRegistry {
            next_id: 0 as ComponentId,
            by_type: HashMap::new(),
            by_id: vec![None; COMPONENT_CAP],
            frozen: false,
        })
    })
}

impl ComponentRegistry {
    /// Allocates a new `ComponentId`.
    ///
    /// ## Panics
    /// Panics if `COMPONENT_CAP` is exceeded.
    fn alloc_id(&mut self) -> ComponentId {
        let component_id = self.next_id;
        assert!(
            (component_id as usize) < COMPONENT_CAP,
            "Exceeded configured component capacity."
        );
        self.next_id = component_id.wrapping_add(1);
        component_id
    }

    /// Freezes the registry, preventing further component registrations.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns `true` if the registry has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registers component type `T` and returns its assigned `ComponentId`.
    ///
    /// ## Behavior
    /// - If `T` is already registered, returns the existing ID.
    /// - Otherwise allocates a new ID and stores a `ComponentDesc`.
    ///
    /// ## Panics
    /// - Panics if the registry is frozen.
    /// - Panics if `COMPONENT_CAP` is exceeded.
    pub fn register<T: 'static + Send + Sync>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return existing;
        }

        assert!(!self.frozen, "Registry frozen");
        let id = self.alloc_id();
        self.by_type.insert(type_id, id);
        self.by_id[id as usize] = Some(ComponentDesc::of::<T>().with_id(id));
        id
    }

    /// Returns the `ComponentId` for `T`, if registered.
    pub fn id_of<T: 'static>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the component descriptor for a `ComponentId`, if registered.
    pub fn description_by_component_id(&self, component_id: ComponentId) -> Option<&ComponentDesc> {
        self.by_id.get(component_id as usize).and_then(|o| o.as_ref())
    }
}

/// Registers component type `T` in the global registry and returns its
/// `ComponentId`.
///
/// ## Panics
/// Panics if the registry is frozen or capacity is exceeded.
pub fn register_component<T: 'static + Send + Sync>() -> ComponentId {
    let registry = component_registry();
    let mut registry = registry.write().unwrap();
    registry.register::<T>()
}

/// Freezes the global component registry.
///
/// Prevents any further component registration, making component IDs stable
/// before systems are registered and plans are built.
pub fn freeze_components() {
    let registry = component_registry();
    let mut registry = registry.write().unwrap();
    registry.freeze();
}

/// Returns the registered `ComponentId` for type `T`.
///
/// ## Panics
/// Panics if `T` is not registered.
pub fn component_id_of<T: 'static>() -> ComponentId {
    let registry = component_registry();
    let registry = registry.read().unwrap();
    registry.id_of::<T>().expect("component not registered.")
}

/// Returns a copy of the descriptor for `component_id`, if registered.
pub fn component_description(component_id: ComponentId) -> Option<ComponentDesc> {
    let registry = component_registry();
    let registry = registry.read().unwrap();
    registry.description_by_component_id(component_id).cloned()
}

/// Describes a registered component type.
///
/// Provides metadata about a component type for debugging and tooling —
/// primarily mapping the numeric IDs appearing in conflict pairs back to
/// readable type names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T`.
    ///
    /// ## Notes
    /// The returned descriptor uses `component_id = 0` and should be
    /// finalized via `with_id`.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self {
            component_id: 0,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
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
        write!(f, "ComponentDesc {{ id: {}, name: {} }}", self.component_id, self.name)
    }
}
