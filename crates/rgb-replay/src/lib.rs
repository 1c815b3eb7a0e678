#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! RGB Replay - deterministic record, replay and rollback for RGB worlds.
//!
//! # Architecture
//!
//! ```text
//!  live world ──on_*──▶ Recorder ──end_frame──▶ CommandLog
//!                                                  │
//!      CheckpointRing ◀──snapshot── world          │ load / load_to_frame
//!            │                                     ▼
//!            └──restore_nearest──▶ world ◀──── Replayer
//! ```
//!
//! - [`Recorder`] captures every mutation of a frame as an [`Operation`] and
//!   seals them, with the RNG state, into a [`FrameBatch`].
//! - [`Replayer`] clears a world and re-applies a [`CommandLog`], remapping
//!   recorded entity ids onto whatever ids the target world allocates.
//! - [`CheckpointRing`] keeps the last `N` full snapshots; `rollback_to`
//!   restores the nearest one and replays the log to reach the exact frame.
//!
//! All of this runs on one thread, inside frame boundaries.

mod checkpoint;
mod error;
mod log;
mod recorder;
mod replayer;
mod serializer;
mod world;

pub use checkpoint::{Checkpoint, CheckpointDebugInfo, CheckpointRing, CheckpointSummary};
pub use error::{PersistError, ReplayError, SnapshotError};
pub use log::{CommandLog, Frame, FrameBatch, Operation};
pub use recorder::{Recorder, RecordingWorld};
pub use replayer::{ReplayStats, Replayer, validate_replay};
pub use serializer::{BincodeSerializer, WorldSerializer};
pub use world::ReplayWorld;
