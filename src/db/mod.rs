//! High-level graph database handle.
//!
//! [`GraphDatabase`] is the name-addressed API an embedding application
//! already uses. Every call runs inside whatever transaction the host has
//! open; the handle never commits or rolls back on its own.

use crate::types::{NodeId, RelId, Result, Value};

mod mem;

pub use mem::MemGraph;

/// Relationship as seen through the high-level API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship id.
    pub id: RelId,
    /// Start node.
    pub start: NodeId,
    /// End node.
    pub end: NodeId,
    /// Relationship type name.
    pub rel_type: String,
}

/// Name-addressed graph operations.
///
/// Property keys and relationship types are passed by name; the database
/// keeps its own mapping to internal ids.
pub trait GraphDatabase: Send + Sync {
    /// Creates a node.
    fn create_node(&self) -> Result<NodeId>;

    /// Deletes a node. Incident relationships are left in place.
    fn delete_node(&self, id: NodeId) -> Result<()>;

    /// Whether the node exists.
    fn node_exists(&self, id: NodeId) -> Result<bool>;

    /// Reads a node property.
    fn node_property(&self, id: NodeId, key: &str) -> Result<Option<Value>>;

    /// Writes a node property, returning the previous value.
    fn set_node_property(&self, id: NodeId, key: &str, value: Value) -> Result<Option<Value>>;

    /// Removes a node property, returning the previous value.
    fn remove_node_property(&self, id: NodeId, key: &str) -> Result<Option<Value>>;

    /// Creates a relationship of type `rel_type` from `start` to `end`.
    fn create_relationship(&self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId>;

    /// Deletes a relationship.
    fn delete_relationship(&self, id: RelId) -> Result<()>;

    /// Reads one relationship.
    fn relationship(&self, id: RelId) -> Result<Option<Relationship>>;

    /// Reads a relationship property.
    fn relationship_property(&self, id: RelId, key: &str) -> Result<Option<Value>>;

    /// Writes a relationship property, returning the previous value.
    fn set_relationship_property(&self, id: RelId, key: &str, value: Value)
        -> Result<Option<Value>>;

    /// Removes a relationship property, returning the previous value.
    fn remove_relationship_property(&self, id: RelId, key: &str) -> Result<Option<Value>>;

    /// Every relationship incident on `node`, in ascending id order.
    fn relationships(&self, node: NodeId) -> Result<Vec<Relationship>>;
}
