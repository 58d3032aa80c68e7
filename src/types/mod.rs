//! Identifier newtypes, property values and the crate error type.

use std::fmt;

use thiserror::Error;

mod value;

pub use value::{ArrayValue, Value};

/// Identifier of a node. Node ids come from their own id space.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u64);

/// Identifier of a relationship. Relationship ids come from their own id space.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct RelId(pub u64);

/// Dense identifier of a property key or relationship type.
///
/// Assigned in first-use order starting at 0 by whichever key index or
/// catalog owns the mapping domain.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct KeyId(pub u32);

/// Kind of entity an id refers to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EntityKind {
    /// A node.
    Node,
    /// A relationship.
    Relationship,
}

/// Entity addressed by a lock or by a property operation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EntityRef {
    /// A node id.
    Node(NodeId),
    /// A relationship id.
    Relationship(RelId),
}

impl EntityRef {
    /// Returns the kind of the referenced entity.
    pub fn kind(self) -> EntityKind {
        match self {
            EntityRef::Node(_) => EntityKind::Node,
            EntityRef::Relationship(_) => EntityKind::Relationship,
        }
    }

    /// Returns the raw id of the referenced entity.
    pub fn raw(self) -> u64 {
        match self {
            EntityRef::Node(id) => id.0,
            EntityRef::Relationship(id) => id.0,
        }
    }

    fn not_found(self) -> SpiError {
        match self {
            EntityRef::Node(id) => SpiError::NodeNotFound(id),
            EntityRef::Relationship(id) => SpiError::RelationshipNotFound(id),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Relationship => write!(f, "relationship"),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw())
    }
}

impl From<NodeId> for EntityRef {
    fn from(value: NodeId) -> Self {
        EntityRef::Node(value)
    }
}

impl From<RelId> for EntityRef {
    fn from(value: RelId) -> Self {
        EntityRef::Relationship(value)
    }
}

impl From<u32> for KeyId {
    fn from(value: u32) -> Self {
        KeyId(value)
    }
}

impl From<KeyId> for u32 {
    fn from(value: KeyId) -> Self {
        value.0
    }
}

/// Errors surfaced by query contexts and their collaborators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpiError {
    /// No node with this id exists.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// No relationship with this id exists.
    #[error("relationship {0} not found")]
    RelationshipNotFound(RelId),
    /// The key was never registered.
    #[error("no key named '{0}'")]
    KeyNotFound(String),
    /// The key id was never assigned.
    #[error("no key with id {0}")]
    KeyIdNotFound(KeyId),
    /// The relationship type id was never assigned.
    #[error("no relationship type with id {0}")]
    RelationshipTypeNotFound(KeyId),
    /// The entity is locked by another owner and the lock service fails fast.
    #[error("{target} is locked by another context")]
    Conflict {
        /// Entity whose lock could not be taken.
        target: EntityRef,
    },
    /// Waiting for a lock exceeded the configured timeout.
    #[error("timed out waiting for lock on {target}")]
    LockTimeout {
        /// Entity whose lock could not be taken.
        target: EntityRef,
    },
    /// The host cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// The query context was already closed.
    #[error("query context is closed")]
    Closed,
    /// The caller violated an API precondition.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The storage collaborator failed.
    #[error("storage: {0}")]
    Storage(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpiError>;

impl SpiError {
    /// Returns the `NotFound` error for the given entity.
    pub fn entity_not_found(entity: impl Into<EntityRef>) -> Self {
        entity.into().not_found()
    }

    /// Returns a machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SpiError::NodeNotFound(_)
            | SpiError::RelationshipNotFound(_)
            | SpiError::KeyNotFound(_)
            | SpiError::KeyIdNotFound(_)
            | SpiError::RelationshipTypeNotFound(_) => "NotFound",
            SpiError::Conflict { .. } => "Conflict",
            SpiError::LockTimeout { .. } => "Timeout",
            SpiError::Cancelled => "Cancelled",
            SpiError::Closed => "Closed",
            SpiError::Invalid(_) => "Invalid",
            SpiError::Storage(_) => "Storage",
        }
    }

    /// Whether this error reports an unknown key, id or entity.
    pub fn is_not_found(&self) -> bool {
        self.code() == "NotFound"
    }

    /// Whether this error reports a lock held by another owner.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SpiError::Conflict { .. })
    }
}
