//! Per-entity component storage.
//!
//! Each live entity owns an `EntityRecord`: its enabled flag plus a
//! table of type-erased components keyed by `ComponentId`. Tables are
//! ordered maps so that iteration (and therefore snapshots and digests)
//! never depends on hash seeds.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::component::{ComponentData, ComponentId, ErasedComponent};

bitflags! {
    /// Per-entity state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntityFlags: u8 {
        /// Entity is excluded from enabled-only iteration.
        const DISABLED = 1 << 0;
    }
}

/// Components attached to one entity, ordered by ID.
#[derive(Clone, Default)]
pub struct ComponentTable {
    columns: BTreeMap<ComponentId, Box<dyn ErasedComponent>>,
}

impl ComponentTable {
    pub(crate) fn insert(&mut self, id: ComponentId, value: Box<dyn ErasedComponent>) {
        self.columns.insert(id, value);
    }

    pub(crate) fn remove(&mut self, id: ComponentId) -> Option<Box<dyn ErasedComponent>> {
        self.columns.remove(&id)
    }

    pub(crate) fn get(&self, id: ComponentId) -> Option<&dyn ErasedComponent> {
        self.columns.get(&id).map(|value| &**value)
    }

    /// Whether a component of this type is attached.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.columns.contains_key(&id)
    }

    /// Attached component ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.columns.keys().copied()
    }

    /// Number of attached components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no components are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Convert every component to plain data, in ID order.
    pub(crate) fn to_data(
        &self,
    ) -> impl Iterator<Item = (ComponentId, Result<ComponentData, serde_json::Error>)> + '_ {
        self.columns.iter().map(|(id, value)| (*id, value.to_data()))
    }
}

/// Storage for a single live entity.
#[derive(Clone, Default)]
pub struct EntityRecord {
    pub(crate) flags: EntityFlags,
    pub(crate) components: ComponentTable,
}

impl EntityRecord {
    pub(crate) fn new(enabled: bool) -> Self {
        let mut record = Self::default();
        record.set_enabled(enabled);
        record
    }

    /// Whether the entity is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.flags.contains(EntityFlags::DISABLED)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(EntityFlags::DISABLED, !enabled);
    }

    /// The entity's components.
    #[must_use]
    pub fn components(&self) -> &ComponentTable {
        &self.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_flag() {
        let mut record = EntityRecord::new(true);
        assert!(record.is_enabled());

        record.set_enabled(false);
        assert!(!record.is_enabled());
        assert!(record.flags.contains(EntityFlags::DISABLED));

        record.set_enabled(true);
        assert!(record.is_enabled());
    }

    #[test]
    fn test_table_orders_by_id() {
        let mut table = ComponentTable::default();
        table.insert(ComponentId::from_raw(5), Box::new(5u32));
        table.insert(ComponentId::from_raw(1), Box::new(1u32));
        table.insert(ComponentId::from_raw(3), Box::new(3u32));

        let ids: Vec<u32> = table.ids().map(ComponentId::as_raw).collect();
        assert_eq!(ids, vec![1, 3, 5]);

        let data: Vec<_> = table.to_data().map(|(_, v)| v.unwrap()).collect();
        assert_eq!(data, vec![serde_json::json!(1), serde_json::json!(3), serde_json::json!(5)]);
    }

    #[test]
    fn test_table_remove() {
        let mut table = ComponentTable::default();
        let id = ComponentId::from_raw(2);
        table.insert(id, Box::new(String::from("x")));
        assert!(table.contains(id));
        assert!(table.remove(id).is_some());
        assert!(table.is_empty());
        assert!(table.remove(id).is_none());
    }
}
