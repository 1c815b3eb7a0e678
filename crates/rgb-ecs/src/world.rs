//! World - the main container for all ECS data.
//!
//! The World holds all entities, their components, the component
//! registry, the frame counter and the deterministic RNG resource.
//! Components can be accessed typed (`insert::<T>`, `get::<T>`) or by
//! `ComponentId` with plain data (`insert_data`, `component_data`), which
//! is the path replay tooling uses.

use std::hash::{Hash, Hasher};

use tracing::warn;
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

use crate::{
    EcsError,
    component::{Component, ComponentData, ComponentId, ComponentRegistry},
    entity::{Entity, EntityAllocator},
    rng::SimRng,
    storage::EntityRecord,
};

/// The ECS world - container for all entities and components.
#[derive(Clone, Default)]
pub struct World {
    /// Entity ID allocator.
    pub(crate) entities: EntityAllocator,
    /// Entity records indexed by entity ID.
    pub(crate) records: Vec<Option<EntityRecord>>,
    /// Component type registry.
    pub(crate) components: ComponentRegistry,
    /// Current simulation frame. Frame 0 means "nothing simulated yet".
    pub(crate) frame: u64,
    /// Deterministic RNG resource, if installed.
    pub(crate) rng: Option<SimRng>,
}

impl World {
    /// Create a new empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world that shares an existing registry's component ids.
    #[must_use]
    pub fn with_registry(components: ComponentRegistry) -> Self {
        Self {
            components,
            ..Self::default()
        }
    }

    // ==================== Entity Operations ====================

    /// Spawn a new, enabled, empty entity.
    pub fn spawn_empty(&mut self) -> Entity {
        self.spawn_with_state(true)
    }

    /// Spawn a new empty entity with the given enabled state.
    pub fn spawn_with_state(&mut self, enabled: bool) -> Entity {
        let entity = self.entities.allocate();
        let id = entity.id() as usize;

        // Ensure record vec is large enough
        if id >= self.records.len() {
            self.records.resize_with(id + 1, || None);
        }
        self.records[id] = Some(EntityRecord::new(enabled));

        entity
    }

    /// Spawn an enabled entity with a single component.
    pub fn spawn<T: Component>(&mut self, component: T) -> Entity {
        let entity = self.spawn_empty();
        self.insert(entity, component);
        entity
    }

    /// Despawn an entity, removing it and all its components.
    ///
    /// Returns `true` if the entity existed and was removed.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.deallocate(entity) {
            return false;
        }
        self.records[entity.id() as usize] = None;
        true
    }

    /// Despawn every entity and forget all allocated slots.
    ///
    /// Entity ids allocated afterwards follow the same sequence as in a
    /// freshly constructed world. Registry, frame and RNG are kept.
    pub fn clear_entities(&mut self) {
        self.entities.reset();
        self.records.clear();
    }

    /// Check if an entity is alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Get the number of alive entities.
    #[must_use]
    pub fn entity_count(&self) -> u32 {
        self.entities.alive_count()
    }

    /// Iterate over alive entities in ascending slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    fn record(&self, entity: Entity) -> Option<&EntityRecord> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.records.get(entity.id() as usize)?.as_ref()
    }

    fn record_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.records.get_mut(entity.id() as usize)?.as_mut()
    }

    /// Whether an entity is alive and enabled.
    #[must_use]
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.record(entity).is_some_and(EntityRecord::is_enabled)
    }

    /// Set an entity's enabled flag.
    ///
    /// Returns `false` if the entity is not alive.
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> bool {
        match self.record_mut(entity) {
            Some(record) => {
                record.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    // ==================== Component Operations ====================

    /// Register a component type under the next free ID.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.components.register::<T>()
    }

    /// Register a component type under an explicit, stable ID.
    pub fn register_with_id<T: Component>(&mut self, id: ComponentId) -> Result<ComponentId, EcsError> {
        self.components.register_with_id::<T>(id)
    }

    /// Get the component ID for a type.
    #[must_use]
    pub fn component_id<T: 'static>(&self) -> Option<ComponentId> {
        self.components.get_id::<T>()
    }

    /// Get the component registry.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Add a component to an entity, registering its type if needed.
    ///
    /// If the entity already has this component type, it is replaced.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let comp_id = self.components.register::<T>();
        match self.record_mut(entity) {
            Some(record) => {
                record.components.insert(comp_id, Box::new(component));
                true
            }
            None => false,
        }
    }

    /// Remove a component from an entity.
    ///
    /// Returns the removed component if it existed.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let comp_id = self.components.get_id::<T>()?;
        let boxed = self.record_mut(entity)?.components.remove(comp_id)?;
        boxed.into_any().downcast::<T>().ok().map(|b| *b)
    }

    /// Get an owned copy of an entity's component.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<T> {
        self.get_ref::<T>(entity).cloned()
    }

    /// Get a reference to an entity's component.
    #[must_use]
    pub fn get_ref<T: Component>(&self, entity: Entity) -> Option<&T> {
        let comp_id = self.components.get_id::<T>()?;
        self.record(entity)?
            .components
            .get(comp_id)?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Check if an entity has a component.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.components
            .get_id::<T>()
            .is_some_and(|id| self.has_component(entity, id))
    }

    /// Check if an entity has a component, by ID.
    #[must_use]
    pub fn has_component(&self, entity: Entity, id: ComponentId) -> bool {
        self.record(entity)
            .is_some_and(|record| record.components.contains(id))
    }

    /// Attach a component built from plain data.
    ///
    /// The type must be registered; an existing component is replaced.
    pub fn insert_data(
        &mut self,
        entity: Entity,
        id: ComponentId,
        data: ComponentData,
    ) -> Result<(), EcsError> {
        let info = self
            .components
            .get_info(id)
            .ok_or(EcsError::UnknownComponent(id))?;
        let value = info.build(data)?;
        let record = self
            .record_mut(entity)
            .ok_or(EcsError::EntityNotAlive(entity))?;
        record.components.insert(id, value);
        Ok(())
    }

    /// Detach a component by ID.
    ///
    /// Returns `true` if a component was removed.
    pub fn remove_component(&mut self, entity: Entity, id: ComponentId) -> bool {
        self.record_mut(entity)
            .is_some_and(|record| record.components.remove(id).is_some())
    }

    /// Read a component as plain data.
    pub fn component_data(
        &self,
        entity: Entity,
        id: ComponentId,
    ) -> Result<Option<ComponentData>, EcsError> {
        let Some(value) = self.record(entity).and_then(|r| r.components.get(id)) else {
            return Ok(None);
        };
        value.to_data().map(Some).map_err(|source| EcsError::Serialize {
            component: self.component_name(id),
            source,
        })
    }

    /// Component ids attached to an entity, ascending.
    #[must_use]
    pub fn component_ids(&self, entity: Entity) -> Vec<ComponentId> {
        self.record(entity)
            .map(|r| r.components.ids().collect())
            .unwrap_or_default()
    }

    pub(crate) fn component_name(&self, id: ComponentId) -> String {
        self.components
            .get_info(id)
            .map_or_else(|| id.to_string(), |info| info.name().to_string())
    }

    // ==================== Frame & Resources ====================

    /// Current frame number.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Overwrite the frame number.
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Advance to the next frame and return it.
    pub fn advance_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    /// Install (or replace) the RNG resource.
    pub fn insert_rng(&mut self, rng: SimRng) {
        self.rng = Some(rng);
    }

    /// Remove the RNG resource.
    pub fn remove_rng(&mut self) -> Option<SimRng> {
        self.rng.take()
    }

    /// The RNG resource, if installed.
    #[must_use]
    pub fn rng(&self) -> Option<&SimRng> {
        self.rng.as_ref()
    }

    /// Mutable access to the RNG resource, if installed.
    pub fn rng_mut(&mut self) -> Option<&mut SimRng> {
        self.rng.as_mut()
    }

    // ==================== Digest ====================

    /// Hash of the world's entity contents, independent of entity ids.
    ///
    /// Each alive entity contributes the hash of its enabled flag and its
    /// components' plain data; the per-entity hashes are sorted before being
    /// combined, so two worlds holding the same multiset of entities agree
    /// even when their allocators handed out different ids. Components that
    /// fail to serialize contribute only their type ID.
    #[must_use]
    pub fn content_digest(&self) -> u64 {
        let mut per_entity: Vec<u64> = self
            .entities()
            .filter_map(|entity| self.record(entity))
            .map(|record| {
                let mut hasher = Xxh3::new();
                record.is_enabled().hash(&mut hasher);
                for (id, data) in record.components.to_data() {
                    id.as_raw().hash(&mut hasher);
                    match data {
                        Ok(data) => hasher.update(data.to_string().as_bytes()),
                        Err(err) => warn!(component = %id, %err, "component skipped in digest"),
                    }
                }
                hasher.finish()
            })
            .collect();
        per_entity.sort_unstable();

        let bytes: Vec<u8> = per_entity.iter().flat_map(|h| h.to_le_bytes()).collect();
        xxh3_64(&bytes)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("frame", &self.frame)
            .field("entity_count", &self.entities.alive_count())
            .field("component_types", &self.components.len())
            .field("rng", &self.rng)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f64,
        y: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Health(u32);

    #[test]
    fn test_spawn_and_despawn() {
        let mut world = World::new();
        let e = world.spawn(Position { x: 1.0, y: 2.0 });

        assert!(world.is_alive(e));
        assert!(world.is_enabled(e));
        assert_eq!(world.entity_count(), 1);

        assert!(world.despawn(e));
        assert!(!world.is_alive(e));
        assert!(!world.despawn(e));
        assert_eq!(world.get::<Position>(e), None);
    }

    #[test]
    fn test_typed_component_access() {
        let mut world = World::new();
        let e = world.spawn_empty();

        assert!(world.insert(e, Health(10)));
        assert_eq!(world.get::<Health>(e), Some(Health(10)));
        assert!(world.has::<Health>(e));

        assert!(world.insert(e, Health(7)));
        assert_eq!(world.get_ref::<Health>(e), Some(&Health(7)));

        assert_eq!(world.remove::<Health>(e), Some(Health(7)));
        assert!(!world.has::<Health>(e));
        assert_eq!(world.remove::<Health>(e), None);
    }

    #[test]
    fn test_disabled_spawn() {
        let mut world = World::new();
        let e = world.spawn_with_state(false);
        assert!(world.is_alive(e));
        assert!(!world.is_enabled(e));

        assert!(world.set_enabled(e, true));
        assert!(world.is_enabled(e));
    }

    #[test]
    fn test_dynamic_component_access() {
        let mut world = World::new();
        let pos_id = world.register::<Position>();
        let e = world.spawn_empty();

        world
            .insert_data(e, pos_id, serde_json::json!({"x": 3.0, "y": 4.0}))
            .unwrap();
        assert_eq!(world.get::<Position>(e), Some(Position { x: 3.0, y: 4.0 }));
        assert_eq!(
            world.component_data(e, pos_id).unwrap(),
            Some(serde_json::json!({"x": 3.0, "y": 4.0}))
        );

        assert!(world.remove_component(e, pos_id));
        assert!(!world.has_component(e, pos_id));
        assert_eq!(world.component_data(e, pos_id).unwrap(), None);
    }

    #[test]
    fn test_insert_data_errors() {
        let mut world = World::new();
        let pos_id = world.register::<Position>();
        let e = world.spawn_empty();

        assert!(matches!(
            world.insert_data(e, ComponentId::from_raw(99), serde_json::json!(1)),
            Err(EcsError::UnknownComponent(_))
        ));
        assert!(matches!(
            world.insert_data(e, pos_id, serde_json::json!("bad")),
            Err(EcsError::Deserialize { .. })
        ));

        world.despawn(e);
        assert!(matches!(
            world.insert_data(e, pos_id, serde_json::json!({"x": 0.0, "y": 0.0})),
            Err(EcsError::EntityNotAlive(_))
        ));
    }

    #[test]
    fn test_clear_entities_restarts_id_sequence() {
        let mut world = World::new();
        let first = world.spawn_empty();
        let second = world.spawn_empty();
        world.despawn(first);
        world.set_frame(5);

        world.clear_entities();
        assert_eq!(world.entity_count(), 0);
        assert!(!world.is_alive(second));
        assert_eq!(world.frame(), 5);

        let fresh = World::new().spawn_empty();
        assert_eq!(world.spawn_empty(), fresh);
    }

    #[test]
    fn test_content_digest_ignores_ids() {
        let mut a = World::new();
        let a1 = a.spawn(Health(1));
        a.spawn(Health(2));
        a.set_enabled(a1, false);

        // Same contents, different allocation history
        let mut b = World::new();
        let junk = b.spawn_empty();
        b.despawn(junk);
        b.spawn(Health(2));
        let b1 = b.spawn(Health(1));
        b.set_enabled(b1, false);

        assert_eq!(a.content_digest(), b.content_digest());

        b.insert(b1, Health(3));
        assert_ne!(a.content_digest(), b.content_digest());
    }

    #[test]
    fn test_frame_and_rng() {
        let mut world = World::new();
        assert_eq!(world.frame(), 0);
        assert_eq!(world.advance_frame(), 1);
        assert!(world.rng().is_none());

        world.insert_rng(SimRng::from_state(9));
        assert_eq!(world.rng().map(SimRng::state), Some(9));
        assert!(world.remove_rng().is_some());
    }
}
