//! Full-world serializers used by checkpoints.

use rgb_ecs::{World, WorldSnapshot};

use crate::SnapshotError;

/// Saves a whole world to an opaque blob and loads it back.
///
/// Implementations must be lossless for every registered component type and
/// deterministic: the same world state always produces the same bytes.
pub trait WorldSerializer<W: ?Sized> {
    /// Encode the world.
    fn save(&self, world: &W) -> Result<Vec<u8>, SnapshotError>;

    /// Replace the world's state with a blob produced by [`save`](Self::save).
    fn load(&self, world: &mut W, blob: &[u8]) -> Result<(), SnapshotError>;
}

/// Encodes [`WorldSnapshot`]s with bincode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

impl WorldSerializer<World> for BincodeSerializer {
    fn save(&self, world: &World) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = world.capture_snapshot()?;
        bincode::serialize(&snapshot).map_err(SnapshotError::Encode)
    }

    fn load(&self, world: &mut World, blob: &[u8]) -> Result<(), SnapshotError> {
        let snapshot: WorldSnapshot = bincode::deserialize(blob).map_err(SnapshotError::Decode)?;
        world.restore_snapshot(&snapshot)?;
        Ok(())
    }
}
