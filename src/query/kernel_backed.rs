//! [`QueryContext`] over kernel repositories with two lock scopes.
//!
//! Every mutation first takes the transaction-scoped lock on the entity it
//! touches, then the query-scoped lock. Relationship creation locks both
//! endpoint nodes in ascending id order. Reads take no locks; they go
//! through the context's [`ReadSnapshot`].

use std::sync::Arc;

use tracing::{debug, warn};

use super::context::{select, QueryContext, RelationshipCursor};
use super::direction::Direction;
use super::options::ContextOptions;
use super::repository::{NodeRepository, PropertyRepository, RelationshipRepository};
use super::snapshot::ReadSnapshot;
use crate::primitives::concurrency::{CancelToken, LockClient, LockConfig, LockManager, LockService};
use crate::storage::catalog::{KeyCatalog, SharedKeyCatalog};
use crate::storage::kernel::{EntityStore, IdGenerator, PropertyStore, RelationshipRecord};
use crate::storage::mem::MemStore;
use crate::types::{EntityRef, KeyId, NodeId, RelId, Result, SpiError, Value};

/// Collaborators shared by every kernel-backed context of one database.
#[derive(Clone)]
pub struct KernelParts {
    /// Entity id allocation.
    pub ids: Arc<dyn IdGenerator>,
    /// Entity persistence and reads.
    pub entities: Arc<dyn EntityStore>,
    /// Property persistence.
    pub properties: Arc<dyn PropertyStore>,
    /// Database-wide property key catalog.
    pub property_keys: Arc<dyn KeyCatalog>,
    /// Database-wide relationship type catalog.
    pub relationship_types: Arc<dyn KeyCatalog>,
    /// Lock table for query-scoped locks.
    pub query_locks: LockManager,
    /// Lock table for transaction-scoped locks.
    pub transaction_locks: LockManager,
}

impl KernelParts {
    /// Builds parts over a fresh [`MemStore`].
    pub fn in_memory(config: LockConfig) -> Self {
        Self::over_store(Arc::new(MemStore::new()), config)
    }

    /// Builds parts over `store` with new catalogs and lock tables.
    pub fn over_store(store: Arc<MemStore>, config: LockConfig) -> Self {
        Self {
            ids: store.clone(),
            entities: store.clone(),
            properties: store,
            property_keys: Arc::new(SharedKeyCatalog::new()),
            relationship_types: Arc::new(SharedKeyCatalog::new()),
            query_locks: LockManager::new(config.clone()),
            transaction_locks: LockManager::new(config),
        }
    }

    /// Registers a transaction-scoped lock owner. The host releases its
    /// locks by dropping it (or calling `unlock_all`) at transaction end.
    pub fn begin_transaction(&self) -> Arc<LockClient> {
        Arc::new(self.transaction_locks.client())
    }

    /// Like [`KernelParts::begin_transaction`], but every wait of the
    /// transaction's owner aborts once `token` is cancelled.
    pub fn begin_transaction_with_cancel(&self, token: CancelToken) -> Arc<LockClient> {
        Arc::new(self.transaction_locks.client_with_cancel(token))
    }
}

/// Repository-backed query context.
pub struct KernelQueryContext {
    nodes: NodeRepository,
    relationships: RelationshipRepository,
    properties: PropertyRepository,
    transaction_locks: Arc<dyn LockService>,
    query_locks: Box<dyn LockService>,
    snapshot: ReadSnapshot,
    options: ContextOptions,
    closed: bool,
}

impl KernelQueryContext {
    /// Creates a context with explicit lock services for both scopes.
    pub fn new(
        parts: &KernelParts,
        transaction_locks: Arc<dyn LockService>,
        query_locks: Box<dyn LockService>,
        options: ContextOptions,
    ) -> Self {
        Self {
            nodes: NodeRepository::new(parts.ids.clone(), parts.entities.clone()),
            relationships: RelationshipRepository::new(
                parts.ids.clone(),
                parts.entities.clone(),
                parts.relationship_types.clone(),
            ),
            properties: PropertyRepository::new(
                parts.property_keys.clone(),
                parts.properties.clone(),
            ),
            transaction_locks,
            query_locks,
            snapshot: ReadSnapshot::new(options.metrics.clone()),
            options,
            closed: false,
        }
    }

    /// Creates a context holding query-scoped locks on `parts.query_locks`.
    pub fn from_parts(
        parts: &KernelParts,
        transaction_locks: Arc<dyn LockService>,
        options: ContextOptions,
    ) -> Self {
        Self::new(parts, transaction_locks, Box::new(parts.query_locks.client()), options)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(SpiError::Closed)
        } else {
            Ok(())
        }
    }

    fn lock(&self, target: EntityRef) -> Result<()> {
        self.options.check_cancel()?;
        match &self.options.cancel {
            Some(token) => {
                self.transaction_locks.lock_with_cancel(target, token)?;
                self.query_locks.lock_with_cancel(target, token)?;
            }
            None => {
                self.transaction_locks.lock(target)?;
                self.query_locks.lock(target)?;
            }
        }
        debug!(%target, "query.lock.acquired");
        Ok(())
    }

    fn require_node(&mut self, id: NodeId) -> Result<()> {
        let nodes = &self.nodes;
        if self.snapshot.node_exists(id, || nodes.exists(id))? {
            Ok(())
        } else {
            Err(SpiError::NodeNotFound(id))
        }
    }

    fn require_relationship(&mut self, id: RelId) -> Result<RelationshipRecord> {
        let relationships = &self.relationships;
        self.snapshot
            .relationship(id, || relationships.relationship(id))?
            .ok_or(SpiError::RelationshipNotFound(id))
    }

    fn require_entity(&mut self, entity: EntityRef) -> Result<()> {
        match entity {
            EntityRef::Node(id) => self.require_node(id),
            EntityRef::Relationship(id) => self.require_relationship(id).map(|_| ()),
        }
    }

    fn observed_property(&mut self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        let properties = &self.properties;
        self.snapshot
            .property(entity, key, || properties.get(entity, key))
    }

    fn read_property(&mut self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        self.check_open()?;
        self.properties.key_name(key)?;
        self.require_entity(entity)?;
        self.observed_property(entity, key)
    }

    fn write_property(&mut self, entity: EntityRef, key: KeyId, value: Value) -> Result<()> {
        self.check_open()?;
        self.properties.key_name(key)?;
        self.require_entity(entity)?;
        self.lock(entity)?;
        self.properties.set(entity, key, value.clone())?;
        self.snapshot.property_written(entity, key, Some(value));
        Ok(())
    }

    fn remove_property(&mut self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        self.check_open()?;
        self.properties.key_name(key)?;
        self.require_entity(entity)?;
        self.lock(entity)?;
        let previous = self.observed_property(entity, key)?;
        self.properties.remove(entity, key)?;
        self.snapshot.property_written(entity, key, None);
        Ok(previous)
    }
}

impl QueryContext for KernelQueryContext {
    fn get_or_create_property_key_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.properties.get_or_create_key(name)
    }

    fn get_property_key_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.properties.key_id(name)
    }

    fn create_node(&mut self) -> Result<NodeId> {
        self.check_open()?;
        self.options.check_cancel()?;
        let id = self.nodes.create_node()?;
        self.lock(EntityRef::Node(id))?;
        self.snapshot.node_created(id);
        self.options.metrics.node_created();
        Ok(id)
    }

    fn delete_node(&mut self, id: NodeId) -> Result<()> {
        self.check_open()?;
        self.require_node(id)?;
        self.lock(EntityRef::Node(id))?;
        self.nodes.delete_node(id)?;
        self.snapshot.node_deleted(id);
        self.options.metrics.node_deleted();
        Ok(())
    }

    fn node_exists(&mut self, id: NodeId) -> Result<bool> {
        self.check_open()?;
        let nodes = &self.nodes;
        self.snapshot.node_exists(id, || nodes.exists(id))
    }

    fn set_node_property(&mut self, id: NodeId, key: KeyId, value: Value) -> Result<()> {
        self.write_property(EntityRef::Node(id), key, value)
    }

    fn get_node_property(&mut self, id: NodeId, key: KeyId) -> Result<Option<Value>> {
        self.read_property(EntityRef::Node(id), key)
    }

    fn remove_node_property(&mut self, id: NodeId, key: KeyId) -> Result<Option<Value>> {
        self.remove_property(EntityRef::Node(id), key)
    }

    fn get_relationship_type_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.relationships.get_relationship_type(name)
    }

    fn get_or_create_relationship_type_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.relationships.get_or_create_relationship_type(name)
    }

    fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: KeyId,
    ) -> Result<RelId> {
        self.check_open()?;
        self.relationships.type_name(rel_type)?;
        self.require_node(start)?;
        self.require_node(end)?;
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        self.lock(EntityRef::Node(low))?;
        if high != low {
            self.lock(EntityRef::Node(high))?;
        }
        let record = self.relationships.create_relationship(start, end, rel_type)?;
        self.lock(EntityRef::Relationship(record.id))?;
        self.snapshot.relationship_created(record);
        self.options.metrics.relationship_created();
        Ok(record.id)
    }

    fn delete_relationship(&mut self, id: RelId) -> Result<()> {
        self.check_open()?;
        let record = self.require_relationship(id)?;
        self.lock(EntityRef::Relationship(id))?;
        self.relationships.delete_relationship(id)?;
        self.snapshot.relationship_deleted(record);
        self.options.metrics.relationship_deleted();
        Ok(())
    }

    fn relationship(&mut self, id: RelId) -> Result<RelationshipRecord> {
        self.check_open()?;
        self.require_relationship(id)
    }

    fn set_relationship_property(&mut self, id: RelId, key: KeyId, value: Value) -> Result<()> {
        self.write_property(EntityRef::Relationship(id), key, value)
    }

    fn get_relationship_property(&mut self, id: RelId, key: KeyId) -> Result<Option<Value>> {
        self.read_property(EntityRef::Relationship(id), key)
    }

    fn remove_relationship_property(&mut self, id: RelId, key: KeyId) -> Result<Option<Value>> {
        self.remove_property(EntityRef::Relationship(id), key)
    }

    fn get_relationships_for(
        &mut self,
        node: NodeId,
        direction: Direction,
        types: &[KeyId],
    ) -> Result<RelationshipCursor> {
        self.check_open()?;
        self.options.check_cancel()?;
        for rel_type in types {
            self.relationships.type_name(*rel_type)?;
        }
        self.require_node(node)?;
        let relationships = &self.relationships;
        let records = self
            .snapshot
            .relationships_of(node, || relationships.relationships_for(node))?;
        let ids = select(node, records, direction, types);
        self.options.metrics.relationship_scan(direction);
        debug!(node = node.0, dir = direction.as_str(), count = ids.len(), "query.rels.listed");
        Ok(RelationshipCursor::new(ids, self.options.cancel.clone()))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.query_locks.unlock_all();
        self.snapshot.clear();
        debug!("query.context.closed");
        Ok(())
    }
}

impl Drop for KernelQueryContext {
    fn drop(&mut self) {
        if !self.closed {
            warn!("query.context.dropped_open");
            let _ = self.close();
        }
    }
}
