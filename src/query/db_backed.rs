//! [`QueryContext`] delegating to a [`GraphDatabase`] handle.
//!
//! The handle is already transactional, so this backing takes no locks.
//! Property keys and relationship types are numbered by two private
//! [`KeyIndex`]es that live as long as the context; the same name can get
//! different ids in different contexts.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::context::{select, QueryContext, RelationshipCursor};
use super::direction::Direction;
use super::options::ContextOptions;
use super::snapshot::ReadSnapshot;
use crate::db::{GraphDatabase, Relationship};
use crate::storage::catalog::KeyIndex;
use crate::storage::kernel::RelationshipRecord;
use crate::types::{EntityRef, KeyId, NodeId, RelId, Result, SpiError, Value};

/// Query context over a high-level graph database handle.
pub struct GraphDbQueryContext {
    db: Arc<dyn GraphDatabase>,
    property_keys: KeyIndex,
    relationship_types: KeyIndex,
    snapshot: ReadSnapshot,
    options: ContextOptions,
    closed: bool,
}

impl GraphDbQueryContext {
    /// Creates a context over `db` with empty key indexes.
    pub fn new(db: Arc<dyn GraphDatabase>, options: ContextOptions) -> Self {
        Self {
            db,
            property_keys: KeyIndex::new(),
            relationship_types: KeyIndex::new(),
            snapshot: ReadSnapshot::new(options.metrics.clone()),
            options,
            closed: false,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(SpiError::Closed)
        } else {
            Ok(())
        }
    }

    fn key_name(&self, key: KeyId) -> Result<String> {
        self.property_keys.get_key(key).map(str::to_owned)
    }

    fn type_name(&self, rel_type: KeyId) -> Result<&str> {
        self.relationship_types
            .get_key(rel_type)
            .map_err(|_| SpiError::RelationshipTypeNotFound(rel_type))
    }

    fn require_node(&mut self, id: NodeId) -> Result<()> {
        let db = &self.db;
        if self.snapshot.node_exists(id, || db.node_exists(id))? {
            Ok(())
        } else {
            Err(SpiError::NodeNotFound(id))
        }
    }

    fn require_relationship(&mut self, id: RelId) -> Result<RelationshipRecord> {
        let db = &self.db;
        let types = &mut self.relationship_types;
        self.snapshot
            .relationship(id, || {
                db.relationship(id)?
                    .map(|rel| to_record(types, rel))
                    .transpose()
            })?
            .ok_or(SpiError::RelationshipNotFound(id))
    }

    fn require_entity(&mut self, entity: EntityRef) -> Result<()> {
        match entity {
            EntityRef::Node(id) => self.require_node(id),
            EntityRef::Relationship(id) => self.require_relationship(id).map(|_| ()),
        }
    }

    fn observed_property(
        &mut self,
        entity: EntityRef,
        key: KeyId,
        name: &str,
    ) -> Result<Option<Value>> {
        let db = &self.db;
        self.snapshot.property(entity, key, || match entity {
            EntityRef::Node(id) => db.node_property(id, name),
            EntityRef::Relationship(id) => db.relationship_property(id, name),
        })
    }

    fn read_property(&mut self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        self.check_open()?;
        let name = self.key_name(key)?;
        self.require_entity(entity)?;
        self.observed_property(entity, key, &name)
    }

    fn write_property(&mut self, entity: EntityRef, key: KeyId, value: Value) -> Result<()> {
        self.check_open()?;
        let name = self.key_name(key)?;
        self.require_entity(entity)?;
        match entity {
            EntityRef::Node(id) => self.db.set_node_property(id, &name, value.clone())?,
            EntityRef::Relationship(id) => {
                self.db.set_relationship_property(id, &name, value.clone())?
            }
        };
        debug!(%entity, key = %name, "query.prop.set");
        self.snapshot.property_written(entity, key, Some(value));
        Ok(())
    }

    fn remove_property(&mut self, entity: EntityRef, key: KeyId) -> Result<Option<Value>> {
        self.check_open()?;
        let name = self.key_name(key)?;
        self.require_entity(entity)?;
        let previous = self.observed_property(entity, key, &name)?;
        match entity {
            EntityRef::Node(id) => self.db.remove_node_property(id, &name)?,
            EntityRef::Relationship(id) => self.db.remove_relationship_property(id, &name)?,
        };
        debug!(%entity, key = %name, "query.prop.removed");
        self.snapshot.property_written(entity, key, None);
        Ok(previous)
    }
}

/// Numbers the relationship's type name in this context's index.
fn to_record(types: &mut KeyIndex, rel: Relationship) -> Result<RelationshipRecord> {
    Ok(RelationshipRecord {
        id: rel.id,
        start: rel.start,
        end: rel.end,
        rel_type: types.get_or_create(&rel.rel_type)?,
    })
}

impl QueryContext for GraphDbQueryContext {
    fn get_or_create_property_key_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.property_keys.get_or_create(name)
    }

    fn get_property_key_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.property_keys.get_index(name)
    }

    fn create_node(&mut self) -> Result<NodeId> {
        self.check_open()?;
        self.options.check_cancel()?;
        let id = self.db.create_node()?;
        debug!(node = id.0, "query.node.created");
        self.snapshot.node_created(id);
        self.options.metrics.node_created();
        Ok(id)
    }

    fn delete_node(&mut self, id: NodeId) -> Result<()> {
        self.check_open()?;
        self.options.check_cancel()?;
        self.require_node(id)?;
        self.db.delete_node(id)?;
        debug!(node = id.0, "query.node.deleted");
        self.snapshot.node_deleted(id);
        self.options.metrics.node_deleted();
        Ok(())
    }

    fn node_exists(&mut self, id: NodeId) -> Result<bool> {
        self.check_open()?;
        let db = &self.db;
        self.snapshot.node_exists(id, || db.node_exists(id))
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
        self.relationship_types.get_index(name)
    }

    fn get_or_create_relationship_type_id(&mut self, name: &str) -> Result<KeyId> {
        self.check_open()?;
        self.relationship_types.get_or_create(name)
    }

    fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: KeyId,
    ) -> Result<RelId> {
        self.check_open()?;
        self.options.check_cancel()?;
        let type_name = self.type_name(rel_type)?.to_owned();
        self.require_node(start)?;
        self.require_node(end)?;
        let id = self.db.create_relationship(start, end, &type_name)?;
        debug!(rel = id.0, start = start.0, end = end.0, rel_type = %type_name, "query.rel.created");
        self.snapshot.relationship_created(RelationshipRecord {
            id,
            start,
            end,
            rel_type,
        });
        self.options.metrics.relationship_created();
        Ok(id)
    }

    fn delete_relationship(&mut self, id: RelId) -> Result<()> {
        self.check_open()?;
        self.options.check_cancel()?;
        let record = self.require_relationship(id)?;
        self.db.delete_relationship(id)?;
        debug!(rel = id.0, "query.rel.deleted");
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
            self.type_name(*rel_type)?;
        }
        self.require_node(node)?;
        let db = &self.db;
        let index = &mut self.relationship_types;
        let records = self.snapshot.relationships_of(node, || {
            let rels = db.relationships(node)?;
            trace!(node = node.0, count = rels.len(), "query.rels.loaded");
            rels.into_iter().map(|rel| to_record(index, rel)).collect()
        })?;
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
        self.snapshot.clear();
        debug!(
            property_keys = self.property_keys.len(),
            relationship_types = self.relationship_types.len(),
            "query.context.closed"
        );
        Ok(())
    }
}

impl Drop for GraphDbQueryContext {
    fn drop(&mut self) {
        if !self.closed {
            warn!("query.context.dropped_open");
            let _ = self.close();
        }
    }
}
