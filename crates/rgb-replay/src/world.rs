//! The world-storage contract replay is written against.
//!
//! `Replayer` and `CheckpointRing` only need a handful of storage
//! operations, so they are generic over [`ReplayWorld`] rather than tied to
//! `rgb_ecs::World`. The ECS world implements it directly.

use rgb_ecs::{ComponentData, ComponentId, EcsError, Entity, SimRng, World};

/// Storage operations needed to apply a command log.
pub trait ReplayWorld {
    /// Allocate a new entity with the given enabled state.
    fn create_entity(&mut self, enabled: bool) -> Entity;

    /// Destroy an entity. Returns `false` if it was not alive.
    fn destroy_entity(&mut self, entity: Entity) -> bool;

    /// Set an entity's enabled flag. Returns `false` if it was not alive.
    fn set_enabled(&mut self, entity: Entity, enabled: bool) -> bool;

    /// Whether a component type ID is known to this world.
    fn is_registered(&self, type_id: ComponentId) -> bool;

    /// Whether an entity has a component.
    fn has_component(&self, entity: Entity, type_id: ComponentId) -> bool;

    /// Attach a component built from plain data, replacing any existing one.
    fn add_component(
        &mut self,
        entity: Entity,
        type_id: ComponentId,
        data: &ComponentData,
    ) -> Result<(), EcsError>;

    /// Detach a component. Returns `false` if it was not attached.
    fn remove_component(&mut self, entity: Entity, type_id: ComponentId) -> bool;

    /// All alive entities.
    fn alive_entities(&self) -> Vec<Entity>;

    /// Current frame.
    fn frame(&self) -> u64;

    /// Overwrite the current frame.
    fn set_frame(&mut self, frame: u64);

    /// Scalar state of the world's RNG resource, if it has one.
    fn rng_seed(&self) -> Option<u64>;

    /// Restore the RNG resource to an exact scalar state.
    fn restore_rng_seed(&mut self, seed: u64);

    /// Destroy every alive entity and reset the frame to 0.
    fn clear(&mut self) {
        for entity in self.alive_entities() {
            self.destroy_entity(entity);
        }
        self.set_frame(0);
    }
}

impl ReplayWorld for World {
    fn create_entity(&mut self, enabled: bool) -> Entity {
        self.spawn_with_state(enabled)
    }

    fn destroy_entity(&mut self, entity: Entity) -> bool {
        self.despawn(entity)
    }

    fn set_enabled(&mut self, entity: Entity, enabled: bool) -> bool {
        Self::set_enabled(self, entity, enabled)
    }

    fn is_registered(&self, type_id: ComponentId) -> bool {
        self.components().contains(type_id)
    }

    fn has_component(&self, entity: Entity, type_id: ComponentId) -> bool {
        Self::has_component(self, entity, type_id)
    }

    fn add_component(
        &mut self,
        entity: Entity,
        type_id: ComponentId,
        data: &ComponentData,
    ) -> Result<(), EcsError> {
        self.insert_data(entity, type_id, data.clone())
    }

    fn remove_component(&mut self, entity: Entity, type_id: ComponentId) -> bool {
        Self::remove_component(self, entity, type_id)
    }

    fn alive_entities(&self) -> Vec<Entity> {
        self.entities().collect()
    }

    fn frame(&self) -> u64 {
        Self::frame(self)
    }

    fn set_frame(&mut self, frame: u64) {
        Self::set_frame(self, frame);
    }

    fn rng_seed(&self) -> Option<u64> {
        self.rng().map(SimRng::state)
    }

    fn restore_rng_seed(&mut self, seed: u64) {
        match self.rng_mut() {
            Some(rng) => rng.set_state(seed),
            None => self.insert_rng(SimRng::from_state(seed)),
        }
    }

    /// Also resets the allocator, so a replay into a cleared world hands out
    /// the same entity ids as the recording did.
    fn clear(&mut self) {
        self.clear_entities();
        Self::set_frame(self, 0);
    }
}
