//! World snapshot and restore support.
//!
//! [`WorldSnapshot`] is a fully serializable representation of the world:
//! allocator state (so entity ids survive a restore), frame, RNG state and
//! every alive entity with its components as JSON text. Component payloads
//! are stored as text rather than `serde_json::Value` so the snapshot also
//! round-trips through non-self-describing formats such as bincode.
//!
//! Ordered maps are used throughout, so equal worlds produce byte-identical
//! encodings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    EcsError,
    component::ComponentId,
    entity::{AllocatorState, Entity, EntityAllocator},
    rng::SimRng,
    storage::EntityRecord,
    world::World,
};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable snapshot of a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The entity's ID (index + generation).
    pub entity: Entity,
    /// Enabled flag.
    pub enabled: bool,
    /// Component ID -> JSON text of the component value.
    pub components: BTreeMap<ComponentId, String>,
}

/// A complete, serializable snapshot of the world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Layout version, see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Frame at capture time.
    pub frame: u64,
    /// RNG state at capture time, if the resource was installed.
    pub rng_state: Option<u64>,
    /// Allocator state (generations, alive flags, free list).
    pub allocator: AllocatorState,
    /// All alive entities in slot order.
    pub entities: Vec<EntitySnapshot>,
}

impl World {
    /// Capture a complete snapshot of the world state.
    pub fn capture_snapshot(&self) -> Result<WorldSnapshot, EcsError> {
        let mut entities = Vec::with_capacity(self.entity_count() as usize);

        for entity in self.entities() {
            let Some(Some(record)) = self.records.get(entity.id() as usize) else {
                continue;
            };

            let mut components = BTreeMap::new();
            for (id, data) in record.components.to_data() {
                let data = data.map_err(|source| EcsError::Serialize {
                    component: self.component_name(id),
                    source,
                })?;
                components.insert(id, data.to_string());
            }

            entities.push(EntitySnapshot {
                entity,
                enabled: record.is_enabled(),
                components,
            });
        }

        Ok(WorldSnapshot {
            version: SNAPSHOT_VERSION,
            frame: self.frame,
            rng_state: self.rng.as_ref().map(SimRng::state),
            allocator: self.entities.state(),
            entities,
        })
    }

    /// Replace this world's entities, frame and RNG with a snapshot.
    ///
    /// Component ids must be registered in this world. Components of
    /// unregistered types are dropped with a warning. On error the world
    /// is left unchanged.
    pub fn restore_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<(), EcsError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EcsError::InvalidSnapshot(format!(
                "unsupported version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let entities = EntityAllocator::from_state(&snapshot.allocator)
            .ok_or_else(|| EcsError::InvalidSnapshot("inconsistent allocator state".into()))?;

        let mut records: Vec<Option<EntityRecord>> = Vec::new();
        records.resize_with(entities.capacity(), || None);

        for saved in &snapshot.entities {
            if !entities.is_alive(saved.entity) {
                return Err(EcsError::InvalidSnapshot(format!(
                    "entity {} is not alive in the allocator state",
                    saved.entity
                )));
            }

            let mut record = EntityRecord::new(saved.enabled);
            for (&id, text) in &saved.components {
                let Some(info) = self.components.get_info(id) else {
                    warn!(component = %id, entity = %saved.entity, "dropping unregistered component from snapshot");
                    continue;
                };
                let data = serde_json::from_str(text).map_err(|source| EcsError::Deserialize {
                    component: info.name().to_string(),
                    source,
                })?;
                record.components.insert(id, info.build(data)?);
            }
            records[saved.entity.id() as usize] = Some(record);
        }

        if records.iter().filter(|r| r.is_some()).count() != entities.alive_count() as usize {
            return Err(EcsError::InvalidSnapshot(
                "alive entities missing from snapshot".into(),
            ));
        }

        self.entities = entities;
        self.records = records;
        self.frame = snapshot.frame;
        self.rng = snapshot.rng_state.map(SimRng::from_state);
        Ok(())
    }
}
