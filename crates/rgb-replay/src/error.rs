//! Error types for recording, replay and checkpoint operations.

use rgb_ecs::{EcsError, Entity};
use thiserror::Error;

/// Errors from encoding or decoding a world snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be encoded.
    #[error("snapshot encode failed: {0}")]
    Encode(#[source] bincode::Error),

    /// The blob is not a valid snapshot encoding.
    #[error("snapshot decode failed: {0}")]
    Decode(#[source] bincode::Error),

    /// The world refused to capture or restore the snapshot.
    #[error("world rejected snapshot: {0}")]
    World(#[from] EcsError),
}

/// Errors that abort a replay or rollback.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// An operation names a recorded entity with no live mapping.
    ///
    /// Either the log is corrupt (double destroy, reordered ops) or a subset
    /// log was applied without the state it depends on.
    #[error("log integrity: frame {frame} op #{index} references unmapped recorded entity {entity}")]
    UnmappedEntity {
        frame: u64,
        index: usize,
        entity: Entity,
    },

    /// A `Create` names a recorded entity that is already alive.
    #[error("log integrity: frame {frame} op #{index} recreates live recorded entity {entity}")]
    DuplicateEntity {
        frame: u64,
        index: usize,
        entity: Entity,
    },

    /// The target world rejected an operation.
    #[error("world rejected frame {frame} op #{index}: {source}")]
    World {
        frame: u64,
        index: usize,
        #[source]
        source: EcsError,
    },

    /// Restoring a checkpoint failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl ReplayError {
    /// Whether this error means the log itself is inconsistent.
    #[must_use]
    pub const fn is_log_integrity(&self) -> bool {
        matches!(self, Self::UnmappedEntity { .. } | Self::DuplicateEntity { .. })
    }
}

/// Errors from persisting or loading a command log.
#[derive(Debug, Error)]
pub enum PersistError {
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
