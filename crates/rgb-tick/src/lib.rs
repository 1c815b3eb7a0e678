//! Frame driver for recorded RGB simulations.
//!
//! # Tick Model
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Phase 1: Advance world.frame to N                          │
//! │  Phase 2: Recorder::begin_frame                             │
//! │  Phase 3: Run the tick closure against a RecordingWorld     │
//! │  Phase 4: Recorder::end_frame (seal batch + RNG state)      │
//! │  Phase 5: Checkpoint if N == 1 or N % interval == 0         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The driven world must be empty at frame 0 and every mutation must go
//! through the [`RecordingWorld`] handed to the closure; anything else is
//! invisible to replay.

use rgb_ecs::World;
use rgb_replay::{
    CheckpointRing, CommandLog, Frame, Recorder, RecordingWorld, ReplayError, Replayer,
    SnapshotError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Checkpoint settings for a [`TickDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Take a checkpoint every this many frames. 0 disables periodic
    /// checkpoints; frame 1 is always captured.
    pub checkpoint_interval: u64,
    /// Number of checkpoints retained.
    pub checkpoint_capacity: usize,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 10,
            checkpoint_capacity: CheckpointRing::DEFAULT_CAPACITY,
        }
    }
}

impl TickConfig {
    fn wants_checkpoint(&self, frame: Frame) -> bool {
        frame == 1 || (self.checkpoint_interval > 0 && frame % self.checkpoint_interval == 0)
    }
}

/// Advances a world frame by frame while recording and checkpointing it.
#[derive(Debug)]
pub struct TickDriver {
    config: TickConfig,
    recorder: Recorder,
    checkpoints: CheckpointRing,
}

impl Default for TickDriver {
    fn default() -> Self {
        Self::new(TickConfig::default())
    }
}

impl TickDriver {
    /// Create a driver with recording enabled.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        let mut recorder = Recorder::new();
        recorder.start_recording();
        Self {
            config,
            recorder,
            checkpoints: CheckpointRing::new(config.checkpoint_capacity),
        }
    }

    /// Run one frame.
    ///
    /// The closure's return value is passed through. Fails only if a due
    /// checkpoint cannot be taken; the frame is recorded either way.
    pub fn tick<R>(
        &mut self,
        world: &mut World,
        system: impl FnOnce(&mut RecordingWorld<'_>) -> R,
    ) -> Result<R, SnapshotError> {
        let frame = world.advance_frame();
        self.recorder.begin_frame();

        let result = {
            let mut recording = RecordingWorld::new(world, &mut self.recorder);
            system(&mut recording)
        };

        self.recorder.end_frame(&*world);

        if self.config.wants_checkpoint(frame) {
            self.checkpoints.snapshot(&*world)?;
        }
        Ok(result)
    }

    /// Take a checkpoint of the world outside the regular schedule.
    pub fn checkpoint(&mut self, world: &World) -> Result<Frame, SnapshotError> {
        self.checkpoints.snapshot(world)
    }

    /// Roll the world back to `frame` and continue recording from there.
    ///
    /// On success the log and checkpoints newer than `frame` are discarded,
    /// so the next `tick` records `frame + 1` again. Returns `false` if no
    /// checkpoint covers `frame`; the world and log are then untouched.
    pub fn rollback_to(&mut self, world: &mut World, frame: Frame) -> Result<bool, ReplayError> {
        if frame > self.recorder.log().latest_frame() {
            warn!(frame, latest = self.recorder.log().latest_frame(), "rollback target is in the future");
            return Ok(false);
        }

        if !self.checkpoints.rollback_to(world, frame, self.recorder.log())? {
            return Ok(false);
        }

        let dropped_batches = self.recorder.log_mut().truncate_after(frame);
        let dropped_checkpoints = self.checkpoints.discard_after(frame);
        self.recorder.begin_frame();
        info!(frame, dropped_batches, dropped_checkpoints, "resuming from rollback");
        Ok(true)
    }

    /// Replay the log into `fresh` and check it matches `live`.
    ///
    /// `fresh` must share `live`'s component registry.
    pub fn verify(&self, live: &World, fresh: &mut World) -> Result<bool, ReplayError> {
        Replayer::new(&mut *fresh).load(self.recorder.log())?;

        let matches = fresh.frame() == live.frame() && fresh.content_digest() == live.content_digest();
        if matches {
            debug!(frame = live.frame(), "replay verified");
        } else {
            warn!(
                live_frame = live.frame(),
                replay_frame = fresh.frame(),
                "replay diverged from live world"
            );
        }
        Ok(matches)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TickConfig {
        &self.config
    }

    /// The recorder.
    #[must_use]
    pub const fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Mutable access to the recorder, e.g. to pause capture.
    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    /// The recorded log.
    #[must_use]
    pub const fn log(&self) -> &CommandLog {
        self.recorder.log()
    }

    /// The checkpoint ring.
    #[must_use]
    pub const fn checkpoints(&self) -> &CheckpointRing {
        &self.checkpoints
    }
}

#[cfg(test)]
mod tests {
    use rgb_ecs::SimRng;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter(u32);

    fn spawn_counter(rec: &mut RecordingWorld<'_>) {
        let frame = rec.world().frame() as u32;
        let e = rec.spawn(frame % 2 == 0);
        rec.insert(e, Counter(frame));
    }

    fn driver(interval: u64, capacity: usize) -> TickDriver {
        TickDriver::new(TickConfig {
            checkpoint_interval: interval,
            checkpoint_capacity: capacity,
        })
    }

    #[test]
    fn test_default_config() {
        let config = TickConfig::default();
        assert_eq!(config.checkpoint_interval, 10);
        assert_eq!(config.checkpoint_capacity, 8);
        assert!(TickDriver::default().recorder().is_recording());
    }

    #[test]
    fn test_tick_records_each_frame() {
        let mut world = World::new();
        let mut driver = driver(10, 4);

        for _ in 0..3 {
            driver.tick(&mut world, spawn_counter).unwrap();
        }

        assert_eq!(world.frame(), 3);
        assert_eq!(driver.log().len(), 3);
        assert_eq!(driver.log().latest_frame(), 3);
        assert_eq!(driver.log().total_ops(), 6);
    }

    #[test]
    fn test_checkpoint_schedule() {
        let mut world = World::new();
        let mut driver = driver(4, 8);

        for _ in 0..12 {
            driver.tick(&mut world, |_| ()).unwrap();
        }

        let frames: Vec<Frame> = driver.checkpoints().checkpoints().iter().map(|c| c.frame()).collect();
        assert_eq!(frames, vec![1, 4, 8, 12]);
    }

    #[test]
    fn test_zero_interval_only_first_frame() {
        let mut world = World::new();
        let mut driver = driver(0, 8);
        for _ in 0..5 {
            driver.tick(&mut world, |_| ()).unwrap();
        }
        assert_eq!(driver.checkpoints().len(), 1);
    }

    #[test]
    fn test_rollback_truncates_history() {
        let mut world = World::new();
        let mut driver = driver(5, 8);
        for _ in 0..12 {
            driver.tick(&mut world, spawn_counter).unwrap();
        }

        assert!(driver.rollback_to(&mut world, 7).unwrap());
        assert_eq!(world.frame(), 7);
        assert_eq!(world.entity_count(), 7);
        assert_eq!(driver.log().latest_frame(), 7);
        let frames: Vec<Frame> = driver.checkpoints().checkpoints().iter().map(|c| c.frame()).collect();
        assert_eq!(frames, vec![1, 5]);

        driver.tick(&mut world, spawn_counter).unwrap();
        assert_eq!(driver.log().latest_frame(), 8);
        assert_eq!(world.entity_count(), 8);
    }

    #[test]
    fn test_rollback_beyond_log_fails() {
        let mut world = World::new();
        let mut driver = driver(5, 8);
        driver.tick(&mut world, spawn_counter).unwrap();

        assert!(!driver.rollback_to(&mut world, 9).unwrap());
        assert_eq!(world.frame(), 1);
    }

    #[test]
    fn test_verify() {
        let mut world = World::new();
        world.insert_rng(SimRng::from_state(5));
        let mut driver = driver(3, 4);
        for _ in 0..6 {
            driver.tick(&mut world, spawn_counter).unwrap();
        }

        let mut fresh = World::with_registry(world.components().clone());
        assert!(driver.verify(&world, &mut fresh).unwrap());

        // Unrecorded mutation is a divergence
        world.spawn(Counter(99));
        let mut fresh = World::with_registry(world.components().clone());
        assert!(!driver.verify(&world, &mut fresh).unwrap());
    }
}
