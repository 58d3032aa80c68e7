//! Low-level primitives shared by the query contexts.

/// Entity locks and cancellation.
///
/// Lock tables shared between query contexts, per-owner lock handles, and
/// the cancellation token hosts use to abort waits and traversals.
pub mod concurrency;
