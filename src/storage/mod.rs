//! Storage-facing side of the query layer.
//!
//! Holds the key catalogs, the interfaces to the storage kernel, and an
//! in-memory kernel implementation.

/// Property-key and relationship-type catalogs.
///
/// Maps symbolic names to dense ids, either per query or database-wide.
pub mod catalog;

/// Interfaces to the storage kernel.
///
/// Id generation, entity persistence and property storage.
pub mod kernel;

/// In-memory kernel.
pub mod mem;

pub use catalog::{KeyCatalog, KeyIndex, SharedKeyCatalog};
pub use kernel::{EntityStore, IdGenerator, PropertyStore, RelationshipRecord};
pub use mem::MemStore;
