//! Name-to-id catalogs for property keys and relationship types.
//!
//! [`KeyIndex`] is the plain, single-owner mapping used when ids only need to
//! be stable for one query context. [`KeyCatalog`] is the strategy for
//! mapping domains that must be visible database-wide; [`SharedKeyCatalog`]
//! is its in-process implementation.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::types::{KeyId, Result};

mod key_index;

pub use key_index::KeyIndex;

/// Database-wide name-to-id mapping.
///
/// Implementations must make [`KeyCatalog::add_if_absent`] atomic: two
/// concurrent calls for the same new name return the same id.
pub trait KeyCatalog: Send + Sync {
    /// Returns the id registered for `name`.
    fn id_for(&self, name: &str) -> Option<KeyId>;

    /// Returns the id for `name`, registering it if absent.
    ///
    /// Fails only when the id space is exhausted.
    fn add_if_absent(&self, name: &str) -> Result<KeyId>;

    /// Returns the name registered at `id`.
    fn name_for(&self, id: KeyId) -> Option<String>;
}

/// Lookup and insert counters of a [`SharedKeyCatalog`].
#[derive(Default)]
pub struct CatalogMetrics {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

/// Point-in-time copy of [`CatalogMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogMetricsSnapshot {
    /// Name lookups.
    pub lookups: u64,
    /// Lookups that found the name.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Names registered.
    pub inserts: u64,
}

impl CatalogMetricsSnapshot {
    /// Fraction of lookups that hit; 0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / self.lookups as f64
    }
}

impl CatalogMetrics {
    /// Reads every counter.
    pub fn snapshot(&self) -> CatalogMetricsSnapshot {
        CatalogMetricsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
        }
    }

    fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// [`KeyCatalog`] backed by a [`KeyIndex`] behind a reader-writer lock.
#[derive(Default)]
pub struct SharedKeyCatalog {
    index: RwLock<KeyIndex>,
    metrics: CatalogMetrics,
}

impl SharedKeyCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Whether no name has been registered.
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Registered names in id order.
    pub fn names(&self) -> Vec<String> {
        self.index
            .read()
            .iter()
            .map(|(_, name)| name.to_owned())
            .collect()
    }

    /// Current lookup and insert counters.
    pub fn metrics_snapshot(&self) -> CatalogMetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl KeyCatalog for SharedKeyCatalog {
    fn id_for(&self, name: &str) -> Option<KeyId> {
        self.metrics.inc(&self.metrics.lookups);
        let found = self.index.read().lookup(name);
        if found.is_some() {
            self.metrics.inc(&self.metrics.hits);
        } else {
            self.metrics.inc(&self.metrics.misses);
        }
        found
    }

    fn add_if_absent(&self, name: &str) -> Result<KeyId> {
        if let Some(id) = self.id_for(name) {
            trace!(id = id.0, "catalog.add.hit");
            return Ok(id);
        }
        let mut index = self.index.write();
        // another writer may have registered the name since the read above
        if let Some(id) = index.lookup(name) {
            return Ok(id);
        }
        let id = index.get_or_create(name)?;
        self.metrics.inc(&self.metrics.inserts);
        trace!(id = id.0, len = name.len(), "catalog.add.insert");
        Ok(id)
    }

    fn name_for(&self, id: KeyId) -> Option<String> {
        self.index.read().get_key(id).ok().map(str::to_owned)
    }
}
