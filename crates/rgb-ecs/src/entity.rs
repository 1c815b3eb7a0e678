//! Entity identifiers with generational indices.
//!
//! Entities use a generational index pattern to safely reuse IDs
//! while detecting use-after-free scenarios. The packed `u64` form
//! (`to_bits`) is what recorded logs and snapshots carry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Generation counter to detect stale entity references.
/// Incremented each time an entity slot is recycled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u32);

impl Generation {
    /// Create a new generation (starts at 0).
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create a generation from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Increment the generation counter.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Get the raw generation value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Raw entity index into the entity storage.
pub type EntityId = u32;

/// A unique identifier for an entity in the world.
///
/// Serializes as the packed `u64` produced by [`Entity::to_bits`], so a
/// log entry reads `"entity": 4294967296` rather than a nested record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Entity {
    /// Generation counter for this slot.
    generation: Generation,
    /// Index into the entity array.
    id: EntityId,
}

impl Entity {
    /// Create a new entity with the given ID and generation.
    #[must_use]
    pub const fn new(id: EntityId, generation: Generation) -> Self {
        Self { generation, id }
    }

    /// Get the entity's index.
    #[must_use]
    pub const fn id(self) -> EntityId {
        self.id
    }

    /// Get the entity's generation.
    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }

    /// Pack entity into a single u64 for efficient storage/transmission.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation.0 as u64) << 32) | (self.id as u64)
    }

    /// Unpack entity from a u64.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            id: bits as u32,
            generation: Generation((bits >> 32) as u32),
        }
    }
}

impl From<u64> for Entity {
    fn from(bits: u64) -> Self {
        Self::from_bits(bits)
    }
}

impl From<Entity> for u64 {
    fn from(entity: Entity) -> Self {
        entity.to_bits()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id, self.generation.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation.0)
    }
}

/// Serializable allocator state, captured by world snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocatorState {
    /// Generation for each entity slot.
    pub generations: Vec<u32>,
    /// Alive flag for each entity slot.
    pub alive: Vec<bool>,
    /// Free list, in pop order from the back.
    pub free_list: Vec<EntityId>,
}

/// Allocator for entity IDs with generation tracking.
///
/// Maintains a free list of recycled entity slots and tracks
/// the current generation for each slot. Allocation order depends only
/// on the sequence of allocate/deallocate calls, which is what makes
/// replay into a freshly reset allocator reproduce the same ids.
#[derive(Debug, Clone, Default)]
pub struct EntityAllocator {
    /// Generation for each entity slot.
    generations: Vec<Generation>,
    /// Whether each slot currently holds a live entity.
    alive: Vec<bool>,
    /// Free list of available entity IDs.
    free_list: Vec<EntityId>,
    /// Number of currently alive entities.
    alive_count: u32,
}

impl EntityAllocator {
    /// Create a new entity allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            alive_count: 0,
        }
    }

    /// Allocate a new entity.
    pub fn allocate(&mut self) -> Entity {
        self.alive_count += 1;

        if let Some(id) = self.free_list.pop() {
            // Reuse a recycled slot
            let generation = self.generations[id as usize];
            self.alive[id as usize] = true;
            Entity::new(id, generation)
        } else {
            // Allocate a new slot
            let id = self.generations.len() as EntityId;
            let generation = Generation::new();
            self.generations.push(generation);
            self.alive.push(true);
            Entity::new(id, generation)
        }
    }

    /// Deallocate an entity, making its slot available for reuse.
    ///
    /// Returns `true` if the entity was valid and deallocated.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let id = entity.id() as usize;

        // Increment generation to invalidate existing references
        self.generations[id] = self.generations[id].next();
        self.alive[id] = false;
        self.free_list.push(entity.id());
        self.alive_count -= 1;
        true
    }

    /// Check if an entity is currently alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        let id = entity.id() as usize;
        id < self.generations.len() && self.alive[id] && self.generations[id] == entity.generation()
    }

    /// Get the number of currently alive entities.
    #[must_use]
    pub const fn alive_count(&self) -> u32 {
        self.alive_count
    }

    /// Get the total capacity (including recycled slots).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Iterate over alive entities in ascending slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.generations
            .iter()
            .zip(&self.alive)
            .enumerate()
            .filter(|(_, (_, alive))| **alive)
            .map(|(id, (generation, _))| Entity::new(id as EntityId, *generation))
    }

    /// Forget every slot, as if freshly constructed.
    pub fn reset(&mut self) {
        self.generations.clear();
        self.alive.clear();
        self.free_list.clear();
        self.alive_count = 0;
    }

    /// Capture the allocator state.
    #[must_use]
    pub fn state(&self) -> AllocatorState {
        AllocatorState {
            generations: self.generations.iter().map(|g| g.get()).collect(),
            alive: self.alive.clone(),
            free_list: self.free_list.clone(),
        }
    }

    /// Rebuild an allocator from a captured state.
    ///
    /// Returns `None` if the state is internally inconsistent.
    #[must_use]
    pub fn from_state(state: &AllocatorState) -> Option<Self> {
        if state.generations.len() != state.alive.len() {
            return None;
        }
        let in_range = state
            .free_list
            .iter()
            .all(|&id| (id as usize) < state.alive.len() && !state.alive[id as usize]);
        if !in_range {
            return None;
        }

        Some(Self {
            generations: state.generations.iter().copied().map(Generation).collect(),
            alive: state.alive.clone(),
            free_list: state.free_list.clone(),
            alive_count: state.alive.iter().filter(|a| **a).count() as u32,
        })
    }
}
