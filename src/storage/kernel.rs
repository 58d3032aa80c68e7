//! Interfaces the query layer needs from the storage kernel.
//!
//! The kernel owns durability, on-disk layout and commit. Query contexts only
//! allocate ids, write entities and properties through these traits, and read
//! back what the enclosing transaction can see.

use crate::types::{EntityKind, EntityRef, KeyId, NodeId, RelId, Result, Value};

/// Hands out entity ids. Node and relationship ids come from separate spaces
/// and are never reused.
pub trait IdGenerator: Send + Sync {
    /// Allocates the next id for `kind`.
    fn next_id(&self, kind: EntityKind) -> Result<u64>;
}

/// A stored relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RelationshipRecord {
    /// Relationship id.
    pub id: RelId,
    /// Node the relationship starts at.
    pub start: NodeId,
    /// Node the relationship ends at.
    pub end: NodeId,
    /// Relationship type id.
    pub rel_type: KeyId,
}

impl RelationshipRecord {
    /// Returns the endpoint opposite `node`, or `None` if `node` is not an endpoint.
    pub fn other_node(&self, node: NodeId) -> Option<NodeId> {
        if self.start == node {
            Some(self.end)
        } else if self.end == node {
            Some(self.start)
        } else {
            None
        }
    }
}

/// Persists entity creation and deletion, and reads entities back.
///
/// Deleting a node does not touch its relationships.
pub trait EntityStore: Send + Sync {
    /// Records a new node under a freshly allocated id.
    fn create_node(&self, id: NodeId) -> Result<()>;

    /// Deletes a node and its properties. Fails with `NodeNotFound` if absent.
    fn delete_node(&self, id: NodeId) -> Result<()>;

    /// Records a new relationship. Fails with `NodeNotFound` if an endpoint is absent.
    fn create_relationship(&self, record: RelationshipRecord) -> Result<()>;

    /// Deletes a relationship and its properties. Fails with `RelationshipNotFound` if absent.
    fn delete_relationship(&self, id: RelId) -> Result<()>;

    /// Whether the node exists.
    fn node_exists(&self, id: NodeId) -> Result<bool>;

    /// Reads one relationship.
    fn relationship(&self, id: RelId) -> Result<Option<RelationshipRecord>>;

    /// Reads every relationship incident on `node`, in ascending id order.
    fn relationships_of(&self, node: NodeId) -> Result<Vec<RelationshipRecord>>;
}

/// Stores property values keyed by entity and property-key id.
pub trait PropertyStore: Send + Sync {
    /// Reads a property. Fails with `NotFound` if the entity is absent.
    fn get(&self, entity: EntityRef, key: KeyId) -> Result<Option<Value>>;

    /// Writes a property and returns the previous value.
    fn set(&self, entity: EntityRef, key: KeyId, value: Value) -> Result<Option<Value>>;

    /// Removes a property and returns the previous value.
    fn remove(&self, entity: EntityRef, key: KeyId) -> Result<Option<Value>>;
}
