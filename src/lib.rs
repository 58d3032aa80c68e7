//! Id-addressed graph primitives between a query engine and a storage kernel.
//!
//! The query engine sees only [`query::QueryContext`]: create and delete
//! nodes and relationships, read and write properties, and list a node's
//! relationships by direction and type. Names of property keys and
//! relationship types are resolved to dense [`types::KeyId`]s once and every
//! later call uses ids.
//!
//! Two context implementations exist. [`query::KernelQueryContext`] works
//! on the kernel interfaces in [`storage::kernel`] and serializes writers
//! with the lock tables in [`primitives::concurrency`].
//! [`query::GraphDbQueryContext`] wraps a transactional
//! [`db::GraphDatabase`] handle.

#![warn(missing_docs)]

pub mod db;
pub mod primitives;
pub mod query;
pub mod storage;
pub mod types;

pub use primitives::concurrency::{
    CancelToken, LockClient, LockConfig, LockManager, LockMode, LockService,
};
pub use query::{
    ContextOptions, Direction, GraphDbQueryContext, KernelParts, KernelQueryContext,
    QueryContext, RelationshipCursor,
};
pub use types::{EntityKind, EntityRef, KeyId, NodeId, RelId, Result, SpiError, Value};
