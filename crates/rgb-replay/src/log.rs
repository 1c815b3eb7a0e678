//! The command log: per-frame batches of world operations.
//!
//! A `CommandLog` is the durable record of a simulation run. Its JSON shape
//! is stable enough to compare runs across processes and machines:
//!
//! ```text
//! {
//!   "startFrame": 0,
//!   "batches": [
//!     { "frame": 1,
//!       "ops": [ { "op": "create", "entity": 100, "enabled": true } ],
//!       "rngSeed": 42 }
//!   ]
//! }
//! ```

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use rgb_ecs::{ComponentData, ComponentId, Entity};
use serde::{Deserialize, Serialize};

use crate::PersistError;

/// A frame number. Frame 0 is never recorded.
pub type Frame = u64;

/// One atomic world mutation.
///
/// `entity` is always the *recorded* identity: the id the entity had in the
/// world that produced the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Allocate an entity with an initial enabled state.
    Create { entity: Entity, enabled: bool },
    /// Destroy an entity and all its components.
    Destroy { entity: Entity },
    /// Change an entity's enabled flag.
    SetEnabled { entity: Entity, enabled: bool },
    /// Attach (or replace) a component built from plain data.
    #[serde(rename = "add")]
    AddComponent {
        entity: Entity,
        #[serde(rename = "typeId")]
        type_id: ComponentId,
        data: ComponentData,
    },
    /// Detach a component.
    #[serde(rename = "remove")]
    RemoveComponent {
        entity: Entity,
        #[serde(rename = "typeId")]
        type_id: ComponentId,
    },
}

impl Operation {
    /// The recorded entity this operation targets.
    #[must_use]
    pub const fn entity(&self) -> Entity {
        match self {
            Self::Create { entity, .. }
            | Self::Destroy { entity }
            | Self::SetEnabled { entity, .. }
            | Self::AddComponent { entity, .. }
            | Self::RemoveComponent { entity, .. } => *entity,
        }
    }

    /// Short name for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Destroy { .. } => "destroy",
            Self::SetEnabled { .. } => "set_enabled",
            Self::AddComponent { .. } => "add",
            Self::RemoveComponent { .. } => "remove",
        }
    }
}

/// All operations captured during one frame, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameBatch {
    /// Frame the batch was sealed at.
    pub frame: Frame,
    /// Totally ordered operations for this frame.
    pub ops: Vec<Operation>,
    /// RNG state at the end of the frame, if the world had an RNG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl FrameBatch {
    /// Create a batch.
    #[must_use]
    pub fn new(frame: Frame, ops: Vec<Operation>, rng_seed: Option<u64>) -> Self {
        Self {
            frame,
            ops,
            rng_seed,
        }
    }
}

/// Append-only, frame-indexed sequence of sealed batches.
///
/// Batches must be pushed with strictly increasing frame numbers. This is
/// the caller's responsibility and is not checked; lookups assume it.
///
/// A log may cover only `(start_frame, latest_frame]`, where `start_frame`
/// is the exclusive lower bound already captured by some checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLog {
    #[serde(default)]
    start_frame: Frame,
    batches: Vec<FrameBatch>,
}

impl CommandLog {
    /// Create an empty log starting at frame 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log whose history begins after `start_frame`.
    #[must_use]
    pub fn starting_after(start_frame: Frame) -> Self {
        Self {
            start_frame,
            batches: Vec::new(),
        }
    }

    /// Exclusive lower bound of the frames this log covers.
    #[must_use]
    pub const fn start_frame(&self) -> Frame {
        self.start_frame
    }

    /// Append a sealed batch.
    pub fn push(&mut self, batch: FrameBatch) {
        self.batches.push(batch);
    }

    /// The batch recorded for `frame`, if any.
    #[must_use]
    pub fn get_frame(&self, frame: Frame) -> Option<&FrameBatch> {
        self.batches
            .binary_search_by_key(&frame, |b| b.frame)
            .ok()
            .map(|idx| &self.batches[idx])
    }

    /// All batches with `start <= frame <= end`, in log order.
    #[must_use]
    pub fn get_frame_range(&self, start: Frame, end: Frame) -> &[FrameBatch] {
        if start > end {
            return &[];
        }
        let lo = self.batches.partition_point(|b| b.frame < start);
        let hi = self.batches.partition_point(|b| b.frame <= end);
        &self.batches[lo..hi]
    }

    /// Frame of the newest batch, or 0 for an empty log.
    #[must_use]
    pub fn latest_frame(&self) -> Frame {
        self.batches.last().map_or(0, |b| b.frame)
    }

    /// Discard all batches.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Drop every batch newer than `frame`, returning how many were removed.
    pub fn truncate_after(&mut self, frame: Frame) -> usize {
        let keep = self.batches.partition_point(|b| b.frame <= frame);
        let removed = self.batches.len() - keep;
        self.batches.truncate(keep);
        removed
    }

    /// A new log with batches in `(start_frame, end_frame]`, bounded below by
    /// `start_frame`.
    #[must_use]
    pub fn subset(&self, start_frame: Frame, end_frame: Frame) -> Self {
        Self {
            start_frame,
            batches: self
                .batches
                .iter()
                .filter(|b| b.frame > start_frame && b.frame <= end_frame)
                .cloned()
                .collect(),
        }
    }

    /// All batches in log order.
    #[must_use]
    pub fn batches(&self) -> &[FrameBatch] {
        &self.batches
    }

    /// Iterate over batches in log order.
    pub fn iter(&self) -> std::slice::Iter<'_, FrameBatch> {
        self.batches.iter()
    }

    /// Number of batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the log has no batches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of operations across all batches.
    #[must_use]
    pub fn total_ops(&self) -> usize {
        self.batches.iter().map(|b| b.ops.len()).sum()
    }

    // ==================== Persistence ====================

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write as JSON to any writer.
    pub fn write_json(&self, writer: impl Write) -> Result<(), PersistError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read JSON from any reader.
    pub fn read_json(reader: impl Read) -> Result<Self, PersistError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the log to a file, replacing it if it exists.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a log previously written with [`CommandLog::save`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        Self::read_json(BufReader::new(File::open(path)?))
    }
}

impl<'a> IntoIterator for &'a CommandLog {
    type Item = &'a FrameBatch;
    type IntoIter = std::slice::Iter<'a, FrameBatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.iter()
    }
}
