//! Query-facing graph primitives.
//!
//! A query engine talks to the graph only through [`QueryContext`]. Two
//! backings implement it: [`KernelQueryContext`] drives kernel repositories
//! with transaction- and query-scoped locks, and [`GraphDbQueryContext`]
//! delegates to a [`crate::db::GraphDatabase`] handle. Both give
//! repeatable reads for the lifetime of the context.

/// The [`QueryContext`] trait and relationship cursors.
pub mod context;
/// Backing over a [`crate::db::GraphDatabase`] handle.
pub mod db_backed;
/// Relationship direction.
pub mod direction;
/// Backing over kernel repositories and lock services.
pub mod kernel_backed;
/// Counters reported by query contexts.
pub mod metrics;
/// Context construction options.
pub mod options;
/// Repositories translating query operations into kernel calls.
pub mod repository;
mod snapshot;

pub use context::{QueryContext, RelationshipCursor};
pub use db_backed::GraphDbQueryContext;
pub use direction::Direction;
pub use kernel_backed::{KernelParts, KernelQueryContext};
pub use metrics::{default_metrics, ContextMetrics, CounterMetrics, NoopMetrics};
pub use options::ContextOptions;
pub use repository::{NodeRepository, PropertyRepository, RelationshipRepository};
