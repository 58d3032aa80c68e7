//! Exclusive entity locks shared between query contexts.
//!
//! A [`LockManager`] owns one lock table. Every party that takes locks gets
//! its own [`LockClient`] from the manager; the client is the lock owner and
//! remembers what it holds so [`LockService::unlock_all`] can release it in
//! one call. Whether a conflicting request blocks or fails is decided by the
//! manager's [`LockConfig`].
//!
//! There is no deadlock detection. Callers that take several locks must take
//! them in a fixed order (ascending id is what the query contexts use).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::types::{EntityRef, NodeId, RelId, Result, SpiError};

/// Takes and releases exclusive locks on nodes and relationships.
pub trait LockService: Send + Sync {
    /// Acquires the lock on `target` for this owner.
    ///
    /// Re-acquiring a lock the owner already holds succeeds immediately.
    fn lock(&self, target: EntityRef) -> Result<()>;

    /// Acquires the lock on `target`, aborting a wait with
    /// [`SpiError::Cancelled`] once `cancel` is cancelled.
    ///
    /// The default checks the token once and then calls [`LockService::lock`].
    fn lock_with_cancel(&self, target: EntityRef, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        self.lock(target)
    }

    /// Releases a lock this owner holds.
    fn unlock(&self, target: EntityRef) -> Result<()>;

    /// Releases every lock this owner holds.
    fn unlock_all(&self);

    /// Acquires the lock on a node.
    fn lock_node(&self, id: NodeId) -> Result<()> {
        self.lock(EntityRef::Node(id))
    }

    /// Acquires the lock on a relationship.
    fn lock_relationship(&self, id: RelId) -> Result<()> {
        self.lock(EntityRef::Relationship(id))
    }

    /// Releases the lock on a node.
    fn unlock_node(&self, id: NodeId) -> Result<()> {
        self.unlock(EntityRef::Node(id))
    }

    /// Releases the lock on a relationship.
    fn unlock_relationship(&self, id: RelId) -> Result<()> {
        self.unlock(EntityRef::Relationship(id))
    }
}

/// Cooperative cancellation flag shared between a host and in-flight work.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns [`SpiError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SpiError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// What a lock request does when another owner holds the lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Return [`SpiError::Conflict`] immediately.
    FailFast,
    /// Block until the holder releases the lock.
    Wait,
}

/// Lock table configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Conflict policy.
    pub mode: LockMode,
    /// Upper bound on a single wait in [`LockMode::Wait`]; `None` waits forever.
    pub wait_timeout_ms: Option<u64>,
    /// How often a waiter re-checks its cancel token.
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            mode: LockMode::Wait,
            wait_timeout_ms: None,
            poll_interval_ms: 10,
        }
    }
}

impl LockConfig {
    /// Configuration that fails fast with `Conflict`.
    pub fn fail_fast() -> Self {
        Self {
            mode: LockMode::FailFast,
            ..Self::default()
        }
    }

    /// Configuration that waits, optionally bounded by `timeout`.
    pub fn wait(timeout: Option<Duration>) -> Self {
        Self {
            mode: LockMode::Wait,
            wait_timeout_ms: timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            ..Self::default()
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Snapshot of a lock table for observability.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSnapshot {
    /// Number of entities currently locked.
    pub held: usize,
    /// Number of distinct owners holding at least one lock.
    pub owners: usize,
}

struct LockTable {
    owners: Mutex<FxHashMap<EntityRef, u64>>,
    released: Condvar,
    next_owner: AtomicU64,
    config: LockConfig,
}

impl LockTable {
    fn release(&self, owner: u64, targets: impl IntoIterator<Item = EntityRef>) {
        let mut owners = self.owners.lock();
        for target in targets {
            if owners.get(&target) == Some(&owner) {
                owners.remove(&target);
                trace!(owner, %target, "lock.release");
            }
        }
        drop(owners);
        self.released.notify_all();
    }
}

/// Shared lock table handing out per-owner [`LockClient`]s.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<LockTable>,
}

impl LockManager {
    /// Creates an empty lock table.
    pub fn new(config: LockConfig) -> Self {
        Self {
            inner: Arc::new(LockTable {
                owners: Mutex::new(FxHashMap::default()),
                released: Condvar::new(),
                next_owner: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Returns the table configuration.
    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }

    /// Registers a new lock owner.
    pub fn client(&self) -> LockClient {
        self.client_inner(None)
    }

    /// Registers a new lock owner whose waits abort when `token` is cancelled.
    pub fn client_with_cancel(&self, token: CancelToken) -> LockClient {
        self.client_inner(Some(token))
    }

    fn client_inner(&self, cancel: Option<CancelToken>) -> LockClient {
        let owner = self.inner.next_owner.fetch_add(1, Ordering::Relaxed);
        LockClient {
            table: Arc::clone(&self.inner),
            owner,
            held: Mutex::new(FxHashSet::default()),
            cancel,
        }
    }

    /// Returns the owner currently holding `target`, if any.
    pub fn holder(&self, target: EntityRef) -> Option<u64> {
        self.inner.owners.lock().get(&target).copied()
    }

    /// Returns a snapshot of the current lock state.
    pub fn snapshot(&self) -> LockSnapshot {
        let owners = self.inner.owners.lock();
        let distinct: FxHashSet<u64> = owners.values().copied().collect();
        LockSnapshot {
            held: owners.len(),
            owners: distinct.len(),
        }
    }
}

/// One lock owner on a [`LockManager`] table.
///
/// Dropping the client releases everything it still holds.
pub struct LockClient {
    table: Arc<LockTable>,
    owner: u64,
    held: Mutex<FxHashSet<EntityRef>>,
    cancel: Option<CancelToken>,
}

impl LockClient {
    /// Owner id recorded in the lock table.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Number of locks this owner holds.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Whether this owner holds `target`.
    pub fn holds(&self, target: EntityRef) -> bool {
        self.held.lock().contains(&target)
    }

    fn check_cancel(&self, extra: Option<&CancelToken>) -> Result<()> {
        if let Some(token) = &self.cancel {
            token.check()?;
        }
        match extra {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    fn acquire(&self, target: EntityRef, extra: Option<&CancelToken>) -> Result<()> {
        let config = &self.table.config;
        let deadline = config
            .wait_timeout_ms
            .and_then(|ms| Instant::now().checked_add(Duration::from_millis(ms)));
        let mut owners = self.table.owners.lock();
        loop {
            match owners.get(&target) {
                None => {
                    owners.insert(target, self.owner);
                    break;
                }
                Some(&holder) if holder == self.owner => {
                    trace!(owner = self.owner, %target, "lock.reentrant");
                    return Ok(());
                }
                Some(&holder) => {
                    if config.mode == LockMode::FailFast {
                        trace!(owner = self.owner, holder, %target, "lock.conflict");
                        return Err(SpiError::Conflict { target });
                    }
                }
            }
            self.check_cancel(extra)?;
            let mut wait = config.poll_interval();
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    warn!(owner = self.owner, %target, "lock.timeout");
                    return Err(SpiError::LockTimeout { target });
                }
                wait = wait.min(deadline - now);
            }
            self.table.released.wait_for(&mut owners, wait);
        }
        drop(owners);
        self.held.lock().insert(target);
        trace!(owner = self.owner, %target, "lock.acquire");
        Ok(())
    }
}

impl LockService for LockClient {
    fn lock(&self, target: EntityRef) -> Result<()> {
        self.acquire(target, None)
    }

    fn lock_with_cancel(&self, target: EntityRef, cancel: &CancelToken) -> Result<()> {
        self.acquire(target, Some(cancel))
    }

    fn unlock(&self, target: EntityRef) -> Result<()> {
        if !self.held.lock().remove(&target) {
            return Err(SpiError::Invalid("lock not held by this owner"));
        }
        self.table.release(self.owner, [target]);
        Ok(())
    }

    fn unlock_all(&self) {
        let targets: Vec<EntityRef> = self.held.lock().drain().collect();
        if targets.is_empty() {
            return;
        }
        self.table.release(self.owner, targets);
    }
}

impl Drop for LockClient {
    fn drop(&mut self) {
        self.unlock_all();
    }
}
