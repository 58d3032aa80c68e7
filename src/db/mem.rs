use std::sync::Arc;

use super::{GraphDatabase, Relationship};
use crate::storage::catalog::{KeyCatalog, SharedKeyCatalog};
use crate::storage::kernel::{EntityStore, IdGenerator, PropertyStore, RelationshipRecord};
use crate::storage::mem::MemStore;
use crate::types::{
    EntityKind, EntityRef, KeyId, NodeId, RelId, Result, SpiError, Value,
};

/// [`GraphDatabase`] over a [`MemStore`], with its own name catalogs.
pub struct MemGraph {
    store: Arc<MemStore>,
    property_keys: SharedKeyCatalog,
    relationship_types: SharedKeyCatalog,
}

impl Default for MemGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemStore::new()))
    }

    /// Creates a graph over an existing store.
    pub fn with_store(store: Arc<MemStore>) -> Self {
        Self {
            store,
            property_keys: SharedKeyCatalog::new(),
            relationship_types: SharedKeyCatalog::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<MemStore> {
        &self.store
    }

    fn to_relationship(&self, record: RelationshipRecord) -> Result<Relationship> {
        let rel_type = self
            .relationship_types
            .name_for(record.rel_type)
            .ok_or(SpiError::RelationshipTypeNotFound(record.rel_type))?;
        Ok(Relationship {
            id: record.id,
            start: record.start,
            end: record.end,
            rel_type,
        })
    }

    fn read_property(&self, entity: EntityRef, key: &str) -> Result<Option<Value>> {
        match self.property_keys.id_for(key) {
            Some(key) => self.store.get(entity, key),
            None => self.require(entity).map(|_| None),
        }
    }

    fn remove_property(&self, entity: EntityRef, key: &str) -> Result<Option<Value>> {
        match self.property_keys.id_for(key) {
            Some(key) => self.store.remove(entity, key),
            None => self.require(entity).map(|_| None),
        }
    }

    fn write_property(&self, entity: EntityRef, key: &str, value: Value) -> Result<Option<Value>> {
        self.require(entity)?;
        let key: KeyId = self.property_keys.add_if_absent(key)?;
        self.store.set(entity, key, value)
    }

    fn require(&self, entity: EntityRef) -> Result<()> {
        let exists = match entity {
            EntityRef::Node(id) => self.store.node_exists(id)?,
            EntityRef::Relationship(id) => self.store.relationship(id)?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(SpiError::entity_not_found(entity))
        }
    }
}

impl GraphDatabase for MemGraph {
    fn create_node(&self) -> Result<NodeId> {
        let id = NodeId(self.store.next_id(EntityKind::Node)?);
        self.store.create_node(id)?;
        Ok(id)
    }

    fn delete_node(&self, id: NodeId) -> Result<()> {
        self.store.delete_node(id)
    }

    fn node_exists(&self, id: NodeId) -> Result<bool> {
        self.store.node_exists(id)
    }

    fn node_property(&self, id: NodeId, key: &str) -> Result<Option<Value>> {
        self.read_property(EntityRef::Node(id), key)
    }

    fn set_node_property(&self, id: NodeId, key: &str, value: Value) -> Result<Option<Value>> {
        self.write_property(EntityRef::Node(id), key, value)
    }

    fn remove_node_property(&self, id: NodeId, key: &str) -> Result<Option<Value>> {
        self.remove_property(EntityRef::Node(id), key)
    }

    fn create_relationship(&self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId> {
        for node in [start, end] {
            self.require(EntityRef::Node(node))?;
        }
        let rel_type = self.relationship_types.add_if_absent(rel_type)?;
        let id = RelId(self.store.next_id(EntityKind::Relationship)?);
        self.store.create_relationship(RelationshipRecord {
            id,
            start,
            end,
            rel_type,
        })?;
        Ok(id)
    }

    fn delete_relationship(&self, id: RelId) -> Result<()> {
        self.store.delete_relationship(id)
    }

    fn relationship(&self, id: RelId) -> Result<Option<Relationship>> {
        self.store
            .relationship(id)?
            .map(|record| self.to_relationship(record))
            .transpose()
    }

    fn relationship_property(&self, id: RelId, key: &str) -> Result<Option<Value>> {
        self.read_property(EntityRef::Relationship(id), key)
    }

    fn set_relationship_property(
        &self,
        id: RelId,
        key: &str,
        value: Value,
    ) -> Result<Option<Value>> {
        self.write_property(EntityRef::Relationship(id), key, value)
    }

    fn remove_relationship_property(&self, id: RelId, key: &str) -> Result<Option<Value>> {
        self.remove_property(EntityRef::Relationship(id), key)
    }

    fn relationships(&self, node: NodeId) -> Result<Vec<Relationship>> {
        self.store
            .relationships_of(node)?
            .into_iter()
            .map(|record| self.to_relationship(record))
            .collect()
    }
}
