//! Bounded ring of full-world snapshots for rollback.
//!
//! The ring keeps the last `N` snapshots in write order. Any frame at or
//! after the oldest retained checkpoint can be reconstructed by restoring
//! the nearest checkpoint and, if that is not the exact frame, replaying the
//! command log.
//!
//! # Example
//!
//! ```ignore
//! let mut ring = CheckpointRing::new(8);
//! ring.snapshot(&world)?;
//! // ... simulate and record more frames ...
//! ring.rollback_to(&mut world, 7, recorder.log())?;
//! ```

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::{
    ReplayError, SnapshotError,
    log::{CommandLog, Frame},
    replayer::Replayer,
    serializer::{BincodeSerializer, WorldSerializer},
    world::ReplayWorld,
};

/// One retained snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    frame: Frame,
    snapshot: Bytes,
    hash: u64,
}

impl Checkpoint {
    fn new(frame: Frame, snapshot: Vec<u8>) -> Self {
        let hash = xxh3_64(&snapshot);
        Self {
            frame,
            snapshot: Bytes::from(snapshot),
            hash,
        }
    }

    /// Frame the snapshot was taken at.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// The serialized world.
    #[must_use]
    pub const fn snapshot(&self) -> &Bytes {
        &self.snapshot
    }

    /// `xxh3_64` of the snapshot bytes.
    #[must_use]
    pub const fn hash(&self) -> u64 {
        self.hash
    }
}

/// Summary of one checkpoint in [`CheckpointDebugInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointSummary {
    pub frame: Frame,
    pub bytes: usize,
    pub hash: u64,
}

/// Ring state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointDebugInfo {
    pub capacity: usize,
    pub size: usize,
    pub write_index: usize,
    pub oldest_frame: Option<Frame>,
    pub newest_frame: Option<Frame>,
    pub total_bytes: usize,
    /// Sorted by frame.
    pub checkpoints: Vec<CheckpointSummary>,
}

/// Fixed-capacity circular buffer of world snapshots.
///
/// When full, the next snapshot overwrites the slot written longest ago,
/// regardless of frame numbers.
#[derive(Debug, Clone)]
pub struct CheckpointRing<S = BincodeSerializer> {
    slots: Vec<Option<Checkpoint>>,
    write_index: usize,
    serializer: S,
}

impl CheckpointRing {
    /// Default number of retained checkpoints.
    pub const DEFAULT_CAPACITY: usize = 8;

    /// Create a ring using the bincode serializer. A capacity of 0 is
    /// treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_serializer(capacity, BincodeSerializer)
    }

    /// A new log with batches in `(start_frame, end_frame]`.
    ///
    /// Use this to ship only the tail of a log to a peer that already holds
    /// the checkpoint at `start_frame`.
    #[must_use]
    pub fn create_log_subset(log: &CommandLog, start_frame: Frame, end_frame: Frame) -> CommandLog {
        log.subset(start_frame, end_frame)
    }
}

impl Default for CheckpointRing {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl<S> CheckpointRing<S> {
    /// Create a ring with a custom serializer.
    pub fn with_serializer(capacity: usize, serializer: S) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            write_index: 0,
            serializer,
        }
    }

    /// Capture the world into the next slot. Returns the captured frame.
    pub fn snapshot<W>(&mut self, world: &W) -> Result<Frame, SnapshotError>
    where
        W: ReplayWorld + ?Sized,
        S: WorldSerializer<W>,
    {
        let frame = world.frame();
        let blob = self.serializer.save(world)?;
        let checkpoint = Checkpoint::new(frame, blob);
        debug!(
            frame,
            slot = self.write_index,
            bytes = checkpoint.snapshot.len(),
            hash = checkpoint.hash,
            "checkpoint taken"
        );

        if let Some(evicted) = self.slots[self.write_index].replace(checkpoint) {
            debug!(frame = evicted.frame, "checkpoint evicted");
        }
        self.write_index = (self.write_index + 1) % self.slots.len();
        Ok(frame)
    }

    /// The checkpoint with the greatest frame `<= target`.
    #[must_use]
    pub fn closest_checkpoint(&self, target: Frame) -> Option<&Checkpoint> {
        self.slots
            .iter()
            .flatten()
            .filter(|c| c.frame <= target)
            .max_by_key(|c| c.frame)
    }

    /// Restore the checkpoint nearest at or before `target`.
    ///
    /// Returns the restored frame, or `None` with the world untouched if no
    /// checkpoint qualifies. The serializer replaces the world state
    /// wholesale, so a blob that fails to decode also leaves it untouched.
    pub fn restore_nearest<W>(&self, world: &mut W, target: Frame) -> Result<Option<Frame>, SnapshotError>
    where
        W: ReplayWorld + ?Sized,
        S: WorldSerializer<W>,
    {
        let Some(checkpoint) = self.closest_checkpoint(target) else {
            return Ok(None);
        };

        self.serializer.load(world, &checkpoint.snapshot)?;
        world.set_frame(checkpoint.frame);
        debug!(frame = checkpoint.frame, target, "checkpoint restored");
        Ok(Some(checkpoint.frame))
    }

    /// Reconstruct the world at `target`.
    ///
    /// Restores the nearest checkpoint; if it is not exactly `target`, the
    /// whole `log` is replayed up to `target`. Returns `false` if no
    /// checkpoint exists at or before `target`.
    pub fn rollback_to<W>(&self, world: &mut W, target: Frame, log: &CommandLog) -> Result<bool, ReplayError>
    where
        W: ReplayWorld + ?Sized,
        S: WorldSerializer<W>,
    {
        let Some(checkpoint_frame) = self.restore_nearest(world, target)? else {
            warn!(target, "CheckpointNotFound: cannot roll back");
            return Ok(false);
        };

        if checkpoint_frame == target {
            info!(frame = target, "rolled back to exact checkpoint");
            return Ok(true);
        }

        // Replays from the start of the log: checkpoints do not carry the
        // recorded-to-actual entity mapping a partial replay would need.
        let stats = Replayer::new(&mut *world).load_to_frame(log, target)?;
        world.set_frame(target);
        info!(
            frame = target,
            checkpoint = checkpoint_frame,
            replayed = stats.frames_applied,
            "rolled back via replay"
        );
        Ok(true)
    }

    /// Drop every checkpoint newer than `frame`. Returns how many were removed.
    pub fn discard_after(&mut self, frame: Frame) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|c| c.frame > frame) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    /// Retained checkpoints sorted by frame.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<&Checkpoint> {
        let mut checkpoints: Vec<_> = self.slots.iter().flatten().collect();
        checkpoints.sort_by_key(|c| c.frame);
        checkpoints
    }

    /// Ring state for diagnostics.
    #[must_use]
    pub fn debug_info(&self) -> CheckpointDebugInfo {
        let checkpoints: Vec<CheckpointSummary> = self
            .checkpoints()
            .into_iter()
            .map(|c| CheckpointSummary {
                frame: c.frame,
                bytes: c.snapshot.len(),
                hash: c.hash,
            })
            .collect();

        CheckpointDebugInfo {
            capacity: self.capacity(),
            size: self.len(),
            write_index: self.write_index,
            oldest_frame: checkpoints.first().map(|c| c.frame),
            newest_frame: checkpoints.last().map(|c| c.frame),
            total_bytes: checkpoints.iter().map(|c| c.bytes).sum(),
            checkpoints,
        }
    }

    /// Number of retained checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether no checkpoints are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Maximum number of retained checkpoints.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether every slot is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Drop all checkpoints.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.write_index = 0;
    }
}
