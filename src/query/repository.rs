//! Repositories translating query-level operations into kernel calls.
//!
//! They hold no state of their own. Each step of a multi-step mutation is
//! logged at `debug` so the enclosing transaction can roll it back.

use std::sync::Arc;

use tracing::debug;

use crate::storage::catalog::KeyCatalog;
use crate::storage::kernel::{EntityStore, IdGenerator, PropertyStore, RelationshipRecord};
use crate::types::{EntityKind, EntityRef, KeyId, NodeId, RelId, Result, SpiError, Value};

/// Node creation and deletion.
#[derive(Clone)]
pub struct NodeRepository {
    ids: Arc<dyn IdGenerator>,
    store: Arc<dyn EntityStore>,
}

impl NodeRepository {
    /// Creates a repository over the given id source and store.
    pub fn new(ids: Arc<dyn IdGenerator>, store: Arc<dyn EntityStore>) -> Self {
        Self { ids, store }
    }

    /// Allocates an id and persists the node under it.
    pub fn create_node(&self) -> Result<NodeId> {
        let id = NodeId(self.ids.next_id(EntityKind::Node)?);
        debug!(node = id.0, "repo.node.id_allocated");
        self.store.create_node(id)?;
        debug!(node = id.0, "repo.node.created");
        Ok(id)
    }

    /// Deletes the node; its relationships are left in place.
    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        self.store.delete_node(id)?;
        debug!(node = id.0, "repo.node.deleted");
        Ok(())
    }

    /// Whether the node is stored.
    pub fn exists(&self, id: NodeId) -> Result<bool> {
        self.store.node_exists(id)
    }
}

/// Relationship creation, deletion and listing, plus the database-wide
/// relationship type catalog.
#[derive(Clone)]
pub struct RelationshipRepository {
    ids: Arc<dyn IdGenerator>,
    store: Arc<dyn EntityStore>,
    types: Arc<dyn KeyCatalog>,
}

impl RelationshipRepository {
    /// Creates a repository resolving types through `types`.
    pub fn new(
        ids: Arc<dyn IdGenerator>,
        store: Arc<dyn EntityStore>,
        types: Arc<dyn KeyCatalog>,
    ) -> Self {
        Self { ids, store, types }
    }

    /// # Errors
    /// `KeyNotFound` if no relationship type has that name.
    pub fn get_relationship_type(&self, name: &str) -> Result<KeyId> {
        self.types
            .id_for(name)
            .ok_or_else(|| SpiError::KeyNotFound(name.to_owned()))
    }

    /// Returns the type id for `name`, registering it if absent.
    pub fn get_or_create_relationship_type(&self, name: &str) -> Result<KeyId> {
        self.types.add_if_absent(name)
    }

    /// # Errors
    /// `RelationshipTypeNotFound` if `id` was never assigned.
    pub fn type_name(&self, id: KeyId) -> Result<String> {
        self.types
            .name_for(id)
            .ok_or(SpiError::RelationshipTypeNotFound(id))
    }

    /// Allocates an id and persists the relationship. Endpoints are checked
    /// by the store.
    pub fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: KeyId,
    ) -> Result<RelationshipRecord> {
        let id = RelId(self.ids.next_id(EntityKind::Relationship)?);
        debug!(rel = id.0, "repo.rel.id_allocated");
        let record = RelationshipRecord {
            id,
            start,
            end,
            rel_type,
        };
        self.store.create_relationship(record)?;
        debug!(
            rel = id.0,
            start = start.0,
            end = end.0,
            rel_type = rel_type.0,
            "repo.rel.created"
        );
        Ok(record)
    }

    /// Deletes the relationship.
    pub fn delete_relationship(&self, id: RelId) -> Result<()> {
        self.store.delete_relationship(id)?;
        debug!(rel = id.0, "repo.rel.deleted");
        Ok(())
    }

    /// Loads a relationship record.
    pub fn relationship(&self, id: RelId) -> Result<Option<RelationshipRecord>> {
        self.store.relationship(id)
    }

    /// Every relationship attached to `node`.
    pub fn relationships_for(&self, node: NodeId) -> Result<Vec<RelationshipRecord>> {
        self.store.relationships_of(node)
    }
}

/// Property keys and values.
#[derive(Clone)]
pub struct PropertyRepository {
    keys: Arc<dyn KeyCatalog>,
    store: Arc<dyn PropertyStore>,
}

impl PropertyRepository {
    /// Creates a repository resolving keys through `keys`.
    pub fn new(keys: Arc<dyn KeyCatalog>, store: Arc<dyn PropertyStore>) -> Self {
        Self { keys, store }
    }

    /// Returns the key id for `name`, registering it if absent.
    pub fn get_or_create_key(&self, name: &str) -> Result<KeyId> {
        self.keys.add_if_absent(name)
    }

    /// # Errors
    /// `KeyNotFound` if the key was never registered.
    pub fn key_id(&self, name: &str) -> Result<KeyId> {
        self.keys
            .id_for(name)
            .ok_or_else(|| SpiError::KeyNotFound(name.to_owned()))
    }

    /// # Errors
    /// `KeyIdNotFound` if `id` was never assigned.
    pub fn key_name(&self, id: KeyId) -> Result<String> {
        self.keys.name_for(id).ok_or(SpiError::KeyIdNotFound(id))
    }

    /// Reads a property.
    pub fn get(&self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        self.store.get(entity, key)
    }

    /// Writes a property, returning the previous value.
    pub fn set(&self, entity: EntityRef, key: KeyId, value: Value) -> Result<Option<Value>> {
        let previous = self.store.set(entity, key, value)?;
        debug!(%entity, key = key.0, replaced = previous.is_some(), "repo.prop.set");
        Ok(previous)
    }

    /// Removes a property, returning the previous value.
    pub fn remove(&self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        let previous = self.store.remove(entity, key)?;
        debug!(%entity, key = key.0, removed = previous.is_some(), "repo.prop.removed");
        Ok(previous)
    }
}
