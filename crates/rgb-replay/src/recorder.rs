//! Capture of world mutations into a [`CommandLog`].
//!
//! A [`Recorder`] is fed one hook call per mutation and seals the pending
//! operations into a [`FrameBatch`] at the end of each frame.
//! [`RecordingWorld`] pairs a world with a recorder so every mutation is
//! applied and captured in one call:
//!
//! ```ignore
//! let mut recorder = Recorder::new();
//! recorder.start_recording();
//!
//! world.advance_frame();
//! recorder.begin_frame();
//! let mut rec = RecordingWorld::new(&mut world, &mut recorder);
//! let e = rec.spawn(true);
//! rec.insert(e, Position { x: 1.0, y: 2.0 });
//! recorder.end_frame(&world);
//! ```

use rgb_ecs::{Component, ComponentData, ComponentId, Entity, SimRng, World};
use serde::Serialize;
use tracing::{trace, warn};

use crate::{
    log::{CommandLog, FrameBatch, Operation},
    world::ReplayWorld,
};

/// Turns world mutation notifications into operations.
///
/// Recording starts disabled. While disabled every `on_*` hook is a no-op.
#[derive(Debug, Default)]
pub struct Recorder {
    log: CommandLog,
    pending: Vec<Operation>,
    recording: bool,
}

impl Recorder {
    /// Create a recorder with an empty log. Recording is off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder that appends to an existing log.
    #[must_use]
    pub fn with_log(log: CommandLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Enable capture.
    pub fn start_recording(&mut self) {
        self.recording = true;
    }

    /// Disable capture. Pending operations are kept.
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    /// Whether hooks currently capture.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    /// Start a new in-progress batch, dropping anything left pending.
    pub fn begin_frame(&mut self) {
        self.pending.clear();
    }

    /// Seal the in-progress batch at the world's current frame.
    ///
    /// The world's RNG state, if present, is captured with the batch.
    /// Returns the sealed frame.
    pub fn end_frame<W: ReplayWorld + ?Sized>(&mut self, world: &W) -> u64 {
        let frame = world.frame();
        let ops = std::mem::take(&mut self.pending);
        trace!(frame, ops = ops.len(), "sealing frame batch");
        self.log.push(FrameBatch::new(frame, ops, world.rng_seed()));
        frame
    }

    fn capture(&mut self, op: Operation) {
        if self.recording {
            self.pending.push(op);
        }
    }

    /// An entity was created.
    pub fn on_create(&mut self, entity: Entity, enabled: bool) {
        self.capture(Operation::Create { entity, enabled });
    }

    /// An entity was destroyed.
    pub fn on_destroy(&mut self, entity: Entity) {
        self.capture(Operation::Destroy { entity });
    }

    /// An entity's enabled flag changed.
    pub fn on_set_enabled(&mut self, entity: Entity, enabled: bool) {
        self.capture(Operation::SetEnabled { entity, enabled });
    }

    /// A component was attached. `data` is owned by the log from here on.
    pub fn on_add(&mut self, entity: Entity, type_id: ComponentId, data: ComponentData) {
        self.capture(Operation::AddComponent {
            entity,
            type_id,
            data,
        });
    }

    /// A component was attached, given as a typed value.
    ///
    /// The value is serialized into an independent copy. If serialization
    /// fails the operation is still captured, with a `null` payload.
    pub fn on_add_component<T: Serialize + ?Sized>(
        &mut self,
        entity: Entity,
        type_id: ComponentId,
        value: &T,
    ) {
        if !self.recording {
            return;
        }
        let data = serde_json::to_value(value).unwrap_or_else(|err| {
            warn!(
                %entity,
                component = %type_id,
                %err,
                "NonSerializableComponent: recording opaque payload"
            );
            ComponentData::Null
        });
        self.on_add(entity, type_id, data);
    }

    /// A component was detached.
    pub fn on_remove(&mut self, entity: Entity, type_id: ComponentId) {
        self.capture(Operation::RemoveComponent { entity, type_id });
    }

    /// Operations captured since the last `begin_frame`/`end_frame`.
    #[must_use]
    pub fn pending_ops(&self) -> &[Operation] {
        &self.pending
    }

    /// The owned log.
    #[must_use]
    pub const fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Mutable access to the owned log.
    pub fn log_mut(&mut self) -> &mut CommandLog {
        &mut self.log
    }

    /// Hand the log to the caller, leaving an empty one behind.
    pub fn export_log(&mut self) -> CommandLog {
        std::mem::take(&mut self.log)
    }

    /// Replace the owned log.
    pub fn import_log(&mut self, log: CommandLog) {
        self.log = log;
    }
}

/// A world whose mutations are applied and recorded together.
pub struct RecordingWorld<'a> {
    world: &'a mut World,
    recorder: &'a mut Recorder,
}

impl<'a> RecordingWorld<'a> {
    /// Pair a world with a recorder.
    pub fn new(world: &'a mut World, recorder: &'a mut Recorder) -> Self {
        Self { world, recorder }
    }

    /// Spawn an empty entity.
    pub fn spawn(&mut self, enabled: bool) -> Entity {
        let entity = self.world.spawn_with_state(enabled);
        self.recorder.on_create(entity, enabled);
        entity
    }

    /// Despawn an entity. Nothing is recorded if it was not alive.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let removed = self.world.despawn(entity);
        if removed {
            self.recorder.on_destroy(entity);
        }
        removed
    }

    /// Set an entity's enabled flag.
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> bool {
        let changed = self.world.set_enabled(entity, enabled);
        if changed {
            self.recorder.on_set_enabled(entity, enabled);
        }
        changed
    }

    /// Attach or replace a component.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.world.is_alive(entity) {
            return false;
        }
        let type_id = self.world.register::<T>();
        self.recorder.on_add_component(entity, type_id, &component);
        self.world.insert(entity, component)
    }

    /// Detach a component, returning it.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let type_id = self.world.component_id::<T>()?;
        let removed = self.world.remove::<T>(entity)?;
        self.recorder.on_remove(entity, type_id);
        Some(removed)
    }

    /// Read-only access to the underlying world.
    #[must_use]
    pub fn world(&self) -> &World {
        self.world
    }

    /// The world's RNG resource, if installed.
    ///
    /// Draws advance the state that `end_frame` captures.
    pub fn rng(&mut self) -> Option<&mut SimRng> {
        self.world.rng_mut()
    }

    /// The recorder.
    #[must_use]
    pub fn recorder(&self) -> &Recorder {
        self.recorder
    }
}
