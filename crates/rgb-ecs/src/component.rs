//! Component type registration and metadata.
//!
//! Components are data types that can be attached to entities.
//! Each component type has a stable numeric ID, assigned by the registry
//! that owns it, plus the type-erased conversions that let the world
//! attach a component from plain data (`ComponentData`) without knowing
//! its Rust type.

use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::EcsError;

/// Plain structured data representing one component value.
///
/// This is the payload recorded in logs and stored in snapshots.
pub type ComponentData = serde_json::Value;

/// Trait for types that can be used as components.
///
/// Every component must be able to produce an independent copy of itself
/// as plain data and be rebuilt from it.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Position { x: f32, y: f32, z: f32 }
/// ```
pub trait Component: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

// Blanket implementation for all suitable types
impl<T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static> Component for T {}

/// Unique identifier for a component type.
///
/// Stable across runs as long as types are registered with the same ids,
/// which is what lets a log recorded in one process replay in another.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Create a component ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object-safe view of a stored component.
pub(crate) trait ErasedComponent: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_box(&self) -> Box<dyn ErasedComponent>;
    fn to_data(&self) -> Result<ComponentData, serde_json::Error>;
}

impl<T: Component> ErasedComponent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_box(&self) -> Box<dyn ErasedComponent> {
        Box::new(self.clone())
    }

    fn to_data(&self) -> Result<ComponentData, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Clone for Box<dyn ErasedComponent> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

type FromDataFn = fn(ComponentData) -> Result<Box<dyn ErasedComponent>, serde_json::Error>;

/// Runtime information about a component type.
#[derive(Clone)]
pub struct ComponentInfo {
    /// Unique ID for this component type.
    id: ComponentId,
    /// Short type name, used for lookups and diagnostics.
    name: String,
    /// Full type name for debugging.
    full_name: &'static str,
    /// Rust TypeId for type checking.
    type_id: TypeId,
    /// Rebuild a boxed component from plain data.
    from_data: FromDataFn,
}

impl ComponentInfo {
    /// Create component info for a concrete type.
    #[must_use]
    pub fn of<T: Component>(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            full_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            from_data: |data| {
                let value: T = serde_json::from_value(data)?;
                Ok(Box::new(value) as Box<dyn ErasedComponent>)
            },
        }
    }

    /// Get the component ID.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Get the short component type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the full Rust type name.
    #[must_use]
    pub const fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Check if this info is for the given type.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub(crate) fn build(&self, data: ComponentData) -> Result<Box<dyn ErasedComponent>, EcsError> {
        (self.from_data)(data).map_err(|source| EcsError::Deserialize {
            component: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// Short type name (without module path).
fn short_type_name<T: 'static>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Registry for component types.
///
/// Maps Rust types to `ComponentId`s and stores metadata about each type.
/// Ids are owned by the registry: there is no process-wide counter, so two
/// worlds that register the same types in the same order agree on ids.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    /// Map from TypeId to ComponentId.
    type_to_id: HashMap<TypeId, ComponentId>,
    /// Short name -> ComponentId for lookups.
    by_name: HashMap<String, ComponentId>,
    /// Component info indexed by ComponentId.
    infos: BTreeMap<ComponentId, ComponentInfo>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type under the next free ID.
    ///
    /// If the type is already registered, returns the existing ID.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        if let Some(id) = self.get_id::<T>() {
            return id;
        }

        let id = self
            .infos
            .keys()
            .next_back()
            .map_or(ComponentId(0), |last| ComponentId(last.0 + 1));
        self.insert_info(ComponentInfo::of::<T>(id, short_type_name::<T>()));
        id
    }

    /// Register a component type under an explicit, stable ID.
    ///
    /// Re-registering the same type under the same ID is a no-op.
    pub fn register_with_id<T: Component>(&mut self, id: ComponentId) -> Result<ComponentId, EcsError> {
        if let Some(existing) = self.infos.get(&id) {
            if existing.is::<T>() {
                return Ok(id);
            }
            return Err(EcsError::IdConflict {
                id,
                existing: existing.full_name().to_string(),
            });
        }
        if let Some(other) = self.get_id::<T>() {
            return Err(EcsError::AlreadyRegistered {
                component: short_type_name::<T>().to_string(),
                id: other,
            });
        }

        self.insert_info(ComponentInfo::of::<T>(id, short_type_name::<T>()));
        Ok(id)
    }

    fn insert_info(&mut self, info: ComponentInfo) {
        self.type_to_id.insert(info.type_id, info.id);
        self.by_name.insert(info.name.clone(), info.id);
        self.infos.insert(info.id, info);
    }

    /// Get the component ID for a type, if registered.
    #[must_use]
    pub fn get_id<T: 'static>(&self) -> Option<ComponentId> {
        self.type_to_id.get(&TypeId::of::<T>()).copied()
    }

    /// Get the component ID for a short type name, if registered.
    #[must_use]
    pub fn get_id_by_name(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// Get component info by ID.
    #[must_use]
    pub fn get_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(&id)
    }

    /// Whether an ID is registered.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.infos.contains_key(&id)
    }

    /// Get the number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Iterate over all registered component infos in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.values()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("count", &self.len())
            .field("components", &self.infos)
            .finish()
    }
}
