use super::direction::Direction;
use crate::primitives::concurrency::CancelToken;
use crate::storage::kernel::RelationshipRecord;
use crate::types::{KeyId, NodeId, RelId, Result, SpiError, Value};

/// Graph primitives available to one query execution.
///
/// Everything is addressed by id. A context is driven by one thread at a
/// time and sees a repeatable-read view of the graph: reading the same
/// entity, property or adjacency twice gives the same answer unless this
/// context changed it in between.
///
/// Contexts never commit or roll back. Each mutation is logged at `debug`
/// step by step so the host transaction can undo partial work.
///
/// After [`QueryContext::close`] every operation fails with
/// [`SpiError::Closed`].
pub trait QueryContext: Send {
    /// Returns the id of property key `name`, registering it if needed.
    fn get_or_create_property_key_id(&mut self, name: &str) -> Result<KeyId>;

    /// Returns the id of property key `name`.
    ///
    /// # Errors
    /// `KeyNotFound` if the key was never registered.
    fn get_property_key_id(&mut self, name: &str) -> Result<KeyId>;

    /// Creates a node and returns its fresh id.
    fn create_node(&mut self) -> Result<NodeId>;

    /// Deletes a node. Relationships touching it are left in place.
    ///
    /// # Errors
    /// `NodeNotFound` if the node does not exist in this context's view.
    fn delete_node(&mut self, id: NodeId) -> Result<()>;

    /// Whether the node exists in this context's view.
    fn node_exists(&mut self, id: NodeId) -> Result<bool>;

    /// Writes a node property.
    fn set_node_property(&mut self, id: NodeId, key: KeyId, value: Value) -> Result<()>;

    /// Reads a node property; `None` when unset.
    fn get_node_property(&mut self, id: NodeId, key: KeyId) -> Result<Option<Value>>;

    /// Removes a node property and returns the value it had.
    fn remove_node_property(&mut self, id: NodeId, key: KeyId) -> Result<Option<Value>>;

    /// Returns the id of relationship type `name`.
    ///
    /// # Errors
    /// `KeyNotFound` if the type was never registered.
    fn get_relationship_type_id(&mut self, name: &str) -> Result<KeyId>;

    /// Returns the id of relationship type `name`, registering it if needed.
    fn get_or_create_relationship_type_id(&mut self, name: &str) -> Result<KeyId>;

    /// Creates a relationship from `start` to `end`.
    ///
    /// # Errors
    /// `NodeNotFound` for a missing endpoint, `RelationshipTypeNotFound` for
    /// an unknown type id.
    fn create_relationship(&mut self, start: NodeId, end: NodeId, rel_type: KeyId)
        -> Result<RelId>;

    /// Deletes a relationship and its properties.
    fn delete_relationship(&mut self, id: RelId) -> Result<()>;

    /// Reads a relationship's endpoints and type.
    fn relationship(&mut self, id: RelId) -> Result<RelationshipRecord>;

    /// Writes a relationship property.
    fn set_relationship_property(&mut self, id: RelId, key: KeyId, value: Value) -> Result<()>;

    /// Reads a relationship property; `None` when unset.
    fn get_relationship_property(&mut self, id: RelId, key: KeyId) -> Result<Option<Value>>;

    /// Removes a relationship property and returns the value it had.
    fn remove_relationship_property(&mut self, id: RelId, key: KeyId) -> Result<Option<Value>>;

    /// Lists relationships incident on `node` in `direction`, in ascending
    /// id order. An empty `types` slice matches every type.
    ///
    /// # Errors
    /// `NodeNotFound` if the node is absent, `RelationshipTypeNotFound` if a
    /// filter id is unknown.
    fn get_relationships_for(
        &mut self,
        node: NodeId,
        direction: Direction,
        types: &[KeyId],
    ) -> Result<RelationshipCursor>;

    /// Releases query-scoped locks and cached state. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Relationship ids produced by [`QueryContext::get_relationships_for`].
///
/// The listing is materialized when the cursor is created. Iteration stops
/// with a single `Err(Cancelled)` once the context's cancel token fires.
pub struct RelationshipCursor {
    ids: Vec<RelId>,
    index: usize,
    cancel: Option<CancelToken>,
    done: bool,
}

impl RelationshipCursor {
    pub(crate) fn new(ids: Vec<RelId>, cancel: Option<CancelToken>) -> Self {
        Self {
            ids,
            index: 0,
            cancel,
            done: false,
        }
    }

    /// Ids not yet yielded.
    pub fn len(&self) -> usize {
        if self.done {
            0
        } else {
            self.ids.len() - self.index
        }
    }

    /// Whether no ids remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for RelationshipCursor {
    type Item = Result<RelId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.done = true;
            return Some(Err(SpiError::Cancelled));
        }
        if self.index >= self.ids.len() {
            self.done = true;
            return None;
        }
        let id = self.ids[self.index];
        self.index += 1;
        Some(Ok(id))
    }
}

/// Keeps the records matching `direction` and `types`.
pub(crate) fn select(
    node: NodeId,
    records: &[RelationshipRecord],
    direction: Direction,
    types: &[KeyId],
) -> Vec<RelId> {
    records
        .iter()
        .filter(|r| direction.admits(node, r))
        .filter(|r| types.is_empty() || types.contains(&r.rel_type))
        .map(|r| r.id)
        .collect()
}
