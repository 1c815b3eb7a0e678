//! Deterministic reconstruction of a world from a [`CommandLog`].
//!
//! Logs name entities by their *recorded* identity. While applying a log the
//! replayer keeps a bidirectional map from recorded to actual entities, so a
//! log replays correctly into a world whose allocator hands out different
//! ids.

use rgb_ecs::Entity;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    ReplayError,
    log::{CommandLog, Frame, FrameBatch, Operation},
    world::ReplayWorld,
};

/// Counters reported by a completed replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Batches applied.
    pub frames_applied: usize,
    /// Operations applied.
    pub ops_applied: usize,
    /// Operations skipped because their component type is unknown or their
    /// payload was recorded as opaque.
    pub ops_skipped: usize,
    /// The world's frame after the replay.
    pub final_frame: Frame,
}

/// Applies command logs to a target world.
pub struct Replayer<'w, W: ReplayWorld + ?Sized> {
    world: &'w mut W,
    recorded_to_actual: FxHashMap<Entity, Entity>,
    actual_to_recorded: FxHashMap<Entity, Entity>,
}

impl<'w, W: ReplayWorld + ?Sized> Replayer<'w, W> {
    /// Bind a replayer to a world.
    pub fn new(world: &'w mut W) -> Self {
        Self {
            world,
            recorded_to_actual: FxHashMap::default(),
            actual_to_recorded: FxHashMap::default(),
        }
    }

    /// The target world.
    pub fn world(&self) -> &W {
        &*self.world
    }

    /// Mutable access to the target world.
    pub fn world_mut(&mut self) -> &mut W {
        &mut *self.world
    }

    /// Destroy every alive entity, reset the frame to 0 and forget all
    /// entity mappings.
    pub fn clear_world(&mut self) {
        self.world.clear();
        self.recorded_to_actual.clear();
        self.actual_to_recorded.clear();
    }

    /// Replay the whole log into a cleared world.
    ///
    /// The world ends at the last applied batch's frame, or at the log's
    /// start frame if it has no batches.
    pub fn load(&mut self, log: &CommandLog) -> Result<ReplayStats, ReplayError> {
        let final_frame = log.batches().last().map_or(log.start_frame(), |b| b.frame);
        self.replay(log, Frame::MAX, final_frame)
    }

    /// Replay every batch with `frame <= target` into a cleared world, then
    /// set the world's frame to `target`.
    pub fn load_to_frame(&mut self, log: &CommandLog, target: Frame) -> Result<ReplayStats, ReplayError> {
        self.replay(log, target, target)
    }

    fn replay(
        &mut self,
        log: &CommandLog,
        target: Frame,
        final_frame: Frame,
    ) -> Result<ReplayStats, ReplayError> {
        self.clear_world();

        let mut stats = ReplayStats::default();
        for batch in log.iter().take_while(|b| b.frame <= target) {
            self.apply_batch(batch, &mut stats)?;
            stats.frames_applied += 1;
        }

        self.world.set_frame(final_frame);
        stats.final_frame = final_frame;
        debug!(
            frames = stats.frames_applied,
            ops = stats.ops_applied,
            skipped = stats.ops_skipped,
            frame = final_frame,
            "replay complete"
        );
        Ok(stats)
    }

    fn apply_batch(&mut self, batch: &FrameBatch, stats: &mut ReplayStats) -> Result<(), ReplayError> {
        if let Some(seed) = batch.rng_seed {
            self.world.restore_rng_seed(seed);
        }

        for (index, op) in batch.ops.iter().enumerate() {
            if self.apply_op(batch.frame, index, op)? {
                stats.ops_applied += 1;
            } else {
                stats.ops_skipped += 1;
            }
        }
        Ok(())
    }

    /// Apply one operation. Returns `false` if it was skipped.
    fn apply_op(&mut self, frame: Frame, index: usize, op: &Operation) -> Result<bool, ReplayError> {
        match op {
            Operation::Create { entity, enabled } => {
                if self.recorded_to_actual.contains_key(entity) {
                    return Err(ReplayError::DuplicateEntity {
                        frame,
                        index,
                        entity: *entity,
                    });
                }
                let actual = self.world.create_entity(*enabled);
                self.recorded_to_actual.insert(*entity, actual);
                self.actual_to_recorded.insert(actual, *entity);
            }
            Operation::Destroy { entity } => {
                let actual = self.resolve(frame, index, *entity)?;
                self.world.destroy_entity(actual);
                self.recorded_to_actual.remove(entity);
                self.actual_to_recorded.remove(&actual);
            }
            Operation::SetEnabled { entity, enabled } => {
                let actual = self.resolve(frame, index, *entity)?;
                self.world.set_enabled(actual, *enabled);
            }
            Operation::AddComponent {
                entity,
                type_id,
                data,
            } => {
                let actual = self.resolve(frame, index, *entity)?;
                if !self.world.is_registered(*type_id) {
                    warn!(frame, index, op = op.kind(), component = %type_id, "UnknownComponentType: skipping");
                    return Ok(false);
                }
                if let Err(source) = self.world.add_component(actual, *type_id, data) {
                    // Null is what the recorder writes for values it could not serialize
                    if data.is_null() {
                        warn!(frame, index, component = %type_id, %source, "opaque payload: skipping add");
                        return Ok(false);
                    }
                    return Err(ReplayError::World {
                        frame,
                        index,
                        source,
                    });
                }
            }
            Operation::RemoveComponent { entity, type_id } => {
                let actual = self.resolve(frame, index, *entity)?;
                if !self.world.is_registered(*type_id) {
                    warn!(frame, index, op = op.kind(), component = %type_id, "UnknownComponentType: skipping");
                    return Ok(false);
                }
                if self.world.has_component(actual, *type_id) {
                    self.world.remove_component(actual, *type_id);
                }
            }
        }
        Ok(true)
    }

    fn resolve(&self, frame: Frame, index: usize, entity: Entity) -> Result<Entity, ReplayError> {
        self.recorded_to_actual
            .get(&entity)
            .copied()
            .ok_or(ReplayError::UnmappedEntity {
                frame,
                index,
                entity,
            })
    }

    /// The live entity a recorded entity maps to.
    #[must_use]
    pub fn get_actual_entity(&self, recorded: Entity) -> Option<Entity> {
        self.recorded_to_actual.get(&recorded).copied()
    }

    /// The recorded entity a live entity was created from.
    #[must_use]
    pub fn get_recorded_entity(&self, actual: Entity) -> Option<Entity> {
        self.actual_to_recorded.get(&actual).copied()
    }

    /// All live `(recorded, actual)` pairs, sorted by recorded entity.
    #[must_use]
    pub fn entity_mappings(&self) -> Vec<(Entity, Entity)> {
        let mut pairs: Vec<_> = self
            .recorded_to_actual
            .iter()
            .map(|(recorded, actual)| (*recorded, *actual))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

/// Structural equality of two logs.
///
/// Frames, RNG seeds and operations must match pairwise. Entities are
/// compared as recorded.
#[must_use]
pub fn validate_replay(a: &CommandLog, b: &CommandLog) -> bool {
    if a.len() != b.len() {
        debug!(left = a.len(), right = b.len(), "logs differ in batch count");
        return false;
    }

    for (left, right) in a.iter().zip(b.iter()) {
        if left.frame != right.frame {
            debug!(left = left.frame, right = right.frame, "logs differ in frame number");
            return false;
        }
        if left.rng_seed != right.rng_seed {
            debug!(frame = left.frame, "logs differ in rng seed");
            return false;
        }
        if left.ops != right.ops {
            debug!(frame = left.frame, "logs differ in operations");
            return false;
        }
    }
    true
}
