use std::sync::Arc;

use super::metrics::{default_metrics, ContextMetrics};
use crate::primitives::concurrency::CancelToken;

/// Options supplied when creating a query context.
#[derive(Clone)]
pub struct ContextOptions {
    /// Metrics sink shared with other contexts
    pub metrics: Arc<dyn ContextMetrics>,
    /// Token the host cancels to abort lock waits and relationship listings
    pub cancel: Option<CancelToken>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextOptions {
    /// Creates options with no-op metrics and no cancel token.
    pub fn new() -> Self {
        Self {
            metrics: default_metrics(),
            cancel: None,
        }
    }

    /// Sets the metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn ContextMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the cancel token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn check_cancel(&self) -> crate::types::Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}
