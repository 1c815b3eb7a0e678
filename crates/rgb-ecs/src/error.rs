//! Error types for world operations.

use thiserror::Error;

use crate::{ComponentId, Entity};

/// Errors that can occur when mutating or snapshotting a world.
#[derive(Debug, Error)]
pub enum EcsError {
    /// Entity is not alive in this world.
    #[error("entity not alive: {0}")]
    EntityNotAlive(Entity),

    /// Component type was not found in the registry.
    #[error("component type not registered: {0}")]
    UnknownComponent(ComponentId),

    /// A different type already owns this component ID.
    #[error("component id {id} already registered as {existing}")]
    IdConflict { id: ComponentId, existing: String },

    /// The type is already registered under another ID.
    #[error("component {component} already registered with id {id}")]
    AlreadyRegistered { component: String, id: ComponentId },

    /// Plain data could not be turned back into a component.
    #[error("deserialization failed for {component}: {source}")]
    Deserialize {
        component: String,
        #[source]
        source: serde_json::Error,
    },

    /// A component could not be turned into plain data.
    #[error("serialization failed for {component}: {source}")]
    Serialize {
        component: String,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot contents are inconsistent with themselves.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
