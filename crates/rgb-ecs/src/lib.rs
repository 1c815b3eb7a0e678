#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! RGB ECS - Entity Component System for frame-stepped simulation.
//!
//! Designed so that a world can be recorded, replayed and snapshotted
//! deterministically.
//!
//! # Key Concepts
//!
//! - **Entity**: A generational identifier for a game object
//! - **Component**: Plain-data values attached to entities (e.g., Position, Velocity)
//! - **ComponentId**: A stable numeric type id, owned by a `ComponentRegistry`
//! - **SimRng**: The world's deterministic RNG resource with a scalar state
//! - **WorldSnapshot**: Lossless, deterministic capture of the whole world
//!
//! # Access Patterns
//!
//! All typed component access returns owned values:
//! - `get<T>()` - Returns owned `T` (requires `Clone`)
//! - `insert<T>()` - Add or replace a component
//! - `remove<T>()` - Remove and return component
//!
//! Tooling that only knows ids and plain data uses `insert_data`,
//! `component_data` and `remove_component` instead:
//! ```ignore
//! let id = world.register::<Position>();
//! world.insert_data(entity, id, serde_json::json!({"x": 1.0, "y": 2.0}))?;
//! ```

mod component;
mod entity;
mod error;
mod rng;
mod snapshot;
mod storage;
mod world;

pub use component::{Component, ComponentData, ComponentId, ComponentInfo, ComponentRegistry};
pub use entity::{AllocatorState, Entity, EntityAllocator, EntityId, Generation};
pub use error::EcsError;
pub use rng::{DEFAULT_SEED, SimRng};
pub use snapshot::{EntitySnapshot, SNAPSHOT_VERSION, WorldSnapshot};
pub use storage::{ComponentTable, EntityFlags, EntityRecord};
pub use world::World;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Component, ComponentId, Entity, SimRng, World};
}
