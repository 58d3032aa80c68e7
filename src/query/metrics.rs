use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::direction::Direction;

/// Receives counters from query contexts.
///
/// Implementations are shared by every context created with the same
/// [`super::ContextOptions`] and must be thread-safe.
pub trait ContextMetrics: Send + Sync {
    /// A node was created.
    fn node_created(&self);

    /// A node was deleted.
    fn node_deleted(&self);

    /// A relationship was created.
    fn relationship_created(&self);

    /// A relationship was deleted.
    fn relationship_deleted(&self);

    /// A relationship listing was produced in `direction`.
    fn relationship_scan(&self, direction: Direction);

    /// A read was answered from the context's snapshot.
    fn snapshot_hit(&self);

    /// A read went to the backing store and was added to the snapshot.
    fn snapshot_miss(&self);
}

/// Discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl ContextMetrics for NoopMetrics {
    fn node_created(&self) {}
    fn node_deleted(&self) {}
    fn relationship_created(&self) {}
    fn relationship_deleted(&self) {}
    fn relationship_scan(&self, _direction: Direction) {}
    fn snapshot_hit(&self) {}
    fn snapshot_miss(&self) {}
}

/// Atomic counters for every [`ContextMetrics`] event.
#[derive(Default)]
pub struct CounterMetrics {
    /// Nodes created.
    pub nodes_created: AtomicU64,
    /// Nodes deleted.
    pub nodes_deleted: AtomicU64,
    /// Relationships created.
    pub relationships_created: AtomicU64,
    /// Relationships deleted.
    pub relationships_deleted: AtomicU64,
    /// Outgoing listings.
    pub scans_out: AtomicU64,
    /// Incoming listings.
    pub scans_in: AtomicU64,
    /// Listings in both directions.
    pub scans_both: AtomicU64,
    /// Reads served from a snapshot.
    pub snapshot_hits: AtomicU64,
    /// Reads that went to the store.
    pub snapshot_misses: AtomicU64,
}

impl CounterMetrics {
    /// Reads a counter.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl ContextMetrics for CounterMetrics {
    fn node_created(&self) {
        self.nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn node_deleted(&self) {
        self.nodes_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn relationship_created(&self) {
        self.relationships_created.fetch_add(1, Ordering::Relaxed);
    }

    fn relationship_deleted(&self) {
        self.relationships_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn relationship_scan(&self, direction: Direction) {
        let counter = match direction {
            Direction::Outgoing => &self.scans_out,
            Direction::Incoming => &self.scans_in,
            Direction::Both => &self.scans_both,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot_hit(&self) {
        self.snapshot_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot_miss(&self) {
        self.snapshot_misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics sink, a [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn ContextMetrics> {
    Arc::new(NoopMetrics)
}
