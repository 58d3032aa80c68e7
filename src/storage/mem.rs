//! Heap-resident kernel used by tests and by [`crate::db::MemGraph`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use super::kernel::{EntityStore, IdGenerator, PropertyStore, RelationshipRecord};
use crate::types::{EntityKind, EntityRef, KeyId, NodeId, RelId, Result, SpiError, Value};

#[derive(Default)]
struct Tables {
    nodes: FxHashMap<NodeId, BTreeSet<RelId>>,
    relationships: FxHashMap<RelId, RelationshipRecord>,
}

impl Tables {
    fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Node(id) => self.nodes.contains_key(&id),
            EntityRef::Relationship(id) => self.relationships.contains_key(&id),
        }
    }
}

type PropertyMap = FxHashMap<EntityRef, FxHashMap<KeyId, Value>>;

/// In-memory implementation of every kernel interface.
///
/// Locks are always taken tables-then-properties.
#[derive(Default)]
pub struct MemStore {
    next_node: AtomicU64,
    next_relationship: AtomicU64,
    tables: RwLock<Tables>,
    properties: RwLock<PropertyMap>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.tables.read().nodes.len()
    }

    /// Number of live relationships.
    pub fn relationship_count(&self) -> usize {
        self.tables.read().relationships.len()
    }
}

impl IdGenerator for MemStore {
    fn next_id(&self, kind: EntityKind) -> Result<u64> {
        let counter = match kind {
            EntityKind::Node => &self.next_node,
            EntityKind::Relationship => &self.next_relationship,
        };
        Ok(counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl EntityStore for MemStore {
    fn create_node(&self, id: NodeId) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.nodes.contains_key(&id) {
            return Err(SpiError::Invalid("node id already in use"));
        }
        tables.nodes.insert(id, BTreeSet::new());
        trace!(node = id.0, "mem.node.create");
        Ok(())
    }

    fn delete_node(&self, id: NodeId) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.nodes.remove(&id).is_none() {
            return Err(SpiError::NodeNotFound(id));
        }
        self.properties.write().remove(&EntityRef::Node(id));
        trace!(node = id.0, "mem.node.delete");
        Ok(())
    }

    fn create_relationship(&self, record: RelationshipRecord) -> Result<()> {
        let mut tables = self.tables.write();
        for node in [record.start, record.end] {
            if !tables.nodes.contains_key(&node) {
                return Err(SpiError::NodeNotFound(node));
            }
        }
        if tables.relationships.contains_key(&record.id) {
            return Err(SpiError::Invalid("relationship id already in use"));
        }
        for node in [record.start, record.end] {
            if let Some(adjacent) = tables.nodes.get_mut(&node) {
                adjacent.insert(record.id);
            }
        }
        tables.relationships.insert(record.id, record);
        trace!(rel = record.id.0, start = record.start.0, end = record.end.0, "mem.rel.create");
        Ok(())
    }

    fn delete_relationship(&self, id: RelId) -> Result<()> {
        let mut tables = self.tables.write();
        let record = tables
            .relationships
            .remove(&id)
            .ok_or(SpiError::RelationshipNotFound(id))?;
        for node in [record.start, record.end] {
            // endpoints deleted earlier no longer carry an adjacency set
            if let Some(adjacent) = tables.nodes.get_mut(&node) {
                adjacent.remove(&id);
            }
        }
        self.properties.write().remove(&EntityRef::Relationship(id));
        trace!(rel = id.0, "mem.rel.delete");
        Ok(())
    }

    fn node_exists(&self, id: NodeId) -> Result<bool> {
        Ok(self.tables.read().nodes.contains_key(&id))
    }

    fn relationship(&self, id: RelId) -> Result<Option<RelationshipRecord>> {
        Ok(self.tables.read().relationships.get(&id).copied())
    }

    fn relationships_of(&self, node: NodeId) -> Result<Vec<RelationshipRecord>> {
        let tables = self.tables.read();
        let adjacent = tables.nodes.get(&node).ok_or(SpiError::NodeNotFound(node))?;
        Ok(adjacent
            .iter()
            .filter_map(|id| tables.relationships.get(id).copied())
            .collect())
    }
}

impl PropertyStore for MemStore {
    fn get(&self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        let tables = self.tables.read();
        if !tables.contains(entity) {
            return Err(SpiError::entity_not_found(entity));
        }
        let properties = self.properties.read();
        Ok(properties
            .get(&entity)
            .and_then(|props| props.get(&key))
            .cloned())
    }

    fn set(&self, entity: EntityRef, key: KeyId, value: Value) -> Result<Option<Value>> {
        let tables = self.tables.read();
        if !tables.contains(entity) {
            return Err(SpiError::entity_not_found(entity));
        }
        let mut properties = self.properties.write();
        Ok(properties.entry(entity).or_default().insert(key, value))
    }

    fn remove(&self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        let tables = self.tables.read();
        if !tables.contains(entity) {
            return Err(SpiError::entity_not_found(entity));
        }
        let mut properties = self.properties.write();
        Ok(properties
            .get_mut(&entity)
            .and_then(|props| props.remove(&key)))
    }
}
