//! Per-context read memo giving repeatable reads.
//!
//! The first observation of a node, relationship, property or adjacency
//! list is remembered for the life of the context. Later reads are served
//! from the memo so concurrent writers are invisible; the context's own
//! writes are folded in through the write hooks.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use super::metrics::ContextMetrics;
use crate::storage::kernel::RelationshipRecord;
use crate::types::{EntityRef, KeyId, NodeId, RelId, Result, Value};

pub(crate) struct ReadSnapshot {
    nodes: FxHashMap<NodeId, bool>,
    relationships: FxHashMap<RelId, Option<RelationshipRecord>>,
    properties: FxHashMap<(EntityRef, KeyId), Option<Value>>,
    /// Sorted by relationship id.
    adjacency: FxHashMap<NodeId, Vec<RelationshipRecord>>,
    metrics: Arc<dyn ContextMetrics>,
}

impl ReadSnapshot {
    pub(crate) fn new(metrics: Arc<dyn ContextMetrics>) -> Self {
        Self {
            nodes: FxHashMap::default(),
            relationships: FxHashMap::default(),
            properties: FxHashMap::default(),
            adjacency: FxHashMap::default(),
            metrics,
        }
    }

    pub(crate) fn node_exists(
        &mut self,
        id: NodeId,
        load: impl FnOnce() -> Result<bool>,
    ) -> Result<bool> {
        if let Some(&exists) = self.nodes.get(&id) {
            self.hit();
            return Ok(exists);
        }
        self.miss();
        let exists = load()?;
        trace!(node = id.0, exists, "snapshot.node.observe");
        self.nodes.insert(id, exists);
        Ok(exists)
    }

    pub(crate) fn relationship(
        &mut self,
        id: RelId,
        load: impl FnOnce() -> Result<Option<RelationshipRecord>>,
    ) -> Result<Option<RelationshipRecord>> {
        if let Some(record) = self.relationships.get(&id) {
            self.hit();
            return Ok(*record);
        }
        self.miss();
        let record = load()?;
        trace!(rel = id.0, found = record.is_some(), "snapshot.rel.observe");
        self.relationships.insert(id, record);
        Ok(record)
    }

    /// Whether `entity` exists in this view.
    pub(crate) fn entity_exists(
        &mut self,
        entity: EntityRef,
        load_node: impl FnOnce() -> Result<bool>,
        load_relationship: impl FnOnce() -> Result<Option<RelationshipRecord>>,
    ) -> Result<bool> {
        match entity {
            EntityRef::Node(id) => self.node_exists(id, load_node),
            EntityRef::Relationship(id) => {
                self.relationship(id, load_relationship).map(|r| r.is_some())
            }
        }
    }

    pub(crate) fn property(
        &mut self,
        entity: EntityRef,
        key: KeyId,
        load: impl FnOnce() -> Result<Option<Value>>,
    ) -> Result<Option<Value>> {
        if let Some(value) = self.properties.get(&(entity, key)) {
            self.hit();
            return Ok(value.clone());
        }
        self.miss();
        let value = match load() {
            Ok(value) => value,
            // Deleted by another context after we saw it; still unset here.
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };
        self.properties.insert((entity, key), value.clone());
        Ok(value)
    }

    pub(crate) fn relationships_of(
        &mut self,
        node: NodeId,
        load: impl FnOnce() -> Result<Vec<RelationshipRecord>>,
    ) -> Result<&[RelationshipRecord]> {
        if self.adjacency.contains_key(&node) {
            self.hit();
        } else {
            self.miss();
            let mut records = match load() {
                Ok(records) => records,
                // Seen as existing, deleted elsewhere since; nothing attached here.
                Err(err) if err.is_not_found() && self.nodes.get(&node) == Some(&true) => {
                    Vec::new()
                }
                Err(err) => return Err(err),
            };
            records.sort_by_key(|r| r.id);
            records.dedup_by_key(|r| r.id);
            for record in &records {
                self.relationships.entry(record.id).or_insert(Some(*record));
            }
            trace!(node = node.0, count = records.len(), "snapshot.adjacency.observe");
            self.adjacency.insert(node, records);
        }
        Ok(self.adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub(crate) fn node_created(&mut self, id: NodeId) {
        self.nodes.insert(id, true);
        self.adjacency.insert(id, Vec::new());
    }

    pub(crate) fn node_deleted(&mut self, id: NodeId) {
        self.nodes.insert(id, false);
        self.adjacency.remove(&id);
        self.properties
            .retain(|(entity, _), _| *entity != EntityRef::Node(id));
    }

    pub(crate) fn property_written(&mut self, entity: EntityRef, key: KeyId, value: Option<Value>) {
        self.properties.insert((entity, key), value);
    }

    pub(crate) fn relationship_created(&mut self, record: RelationshipRecord) {
        self.relationships.insert(record.id, Some(record));
        for node in endpoints(&record) {
            if let Some(list) = self.adjacency.get_mut(&node) {
                if let Err(pos) = list.binary_search_by_key(&record.id, |r| r.id) {
                    list.insert(pos, record);
                }
            }
        }
    }

    pub(crate) fn relationship_deleted(&mut self, record: RelationshipRecord) {
        self.relationships.insert(record.id, None);
        for node in endpoints(&record) {
            if let Some(list) = self.adjacency.get_mut(&node) {
                list.retain(|r| r.id != record.id);
            }
        }
        self.properties
            .retain(|(entity, _), _| *entity != EntityRef::Relationship(record.id));
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
        self.properties.clear();
        self.adjacency.clear();
    }

    fn hit(&self) {
        self.metrics.snapshot_hit();
    }

    fn miss(&self) {
        self.metrics.snapshot_miss();
    }
}

fn endpoints(record: &RelationshipRecord) -> impl Iterator<Item = NodeId> {
    let end = (record.end != record.start).then_some(record.end);
    std::iter::once(record.start).chain(end)
}
