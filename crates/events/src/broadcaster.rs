//! Registry of per-query progress logs.
//!
//! The broadcaster owns one [`ProgressLog`] per active query and serves
//! subscriptions and snapshots against them. Closing marks a query's
//! stream complete but keeps the history replayable for late subscribers;
//! retiring evicts the log once the host application is done with it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use showrun_core::types::QueryId;

use crate::log::{ProgressLog, ProgressStream};
use crate::message::ProgressMessage;

/// Shared fan-out registry, keyed by query id.
///
/// Designed to be shared via `Arc<ProgressBroadcaster>` across the engine
/// and the HTTP layer.
#[derive(Default)]
pub struct ProgressBroadcaster {
    logs: RwLock<HashMap<QueryId, Arc<ProgressLog>>>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or return) the log for a query.
    ///
    /// Idempotent: registering an already-known query returns the existing
    /// log so the caller can never split a query's message sequence.
    pub async fn register(&self, query_id: QueryId) -> Arc<ProgressLog> {
        let mut logs = self.logs.write().await;
        let log = logs
            .entry(query_id)
            .or_insert_with(|| {
                tracing::debug!(%query_id, "registering progress log");
                Arc::new(ProgressLog::new(query_id))
            })
            .clone();
        log
    }

    /// The log for a query, if registered.
    pub async fn get(&self, query_id: QueryId) -> Option<Arc<ProgressLog>> {
        self.logs.read().await.get(&query_id).cloned()
    }

    /// Subscribe to a query's messages with replay from the start.
    pub async fn subscribe(&self, query_id: QueryId) -> Option<ProgressStream> {
        self.get(query_id).await.map(|log| log.subscribe())
    }

    /// All messages emitted so far for a query.
    pub async fn snapshot(&self, query_id: QueryId) -> Option<Vec<Arc<ProgressMessage>>> {
        match self.get(query_id).await {
            Some(log) => Some(log.snapshot().await),
            None => None,
        }
    }

    /// Close a query's log. Subscribers end once drained; the history
    /// stays available until [`retire`](Self::retire).
    pub async fn close(&self, query_id: QueryId) {
        if let Some(log) = self.get(query_id).await {
            tracing::debug!(%query_id, messages = log.len(), "closing progress log");
            log.close();
        }
    }

    /// Drop a query's log entirely. Closes it first so any remaining
    /// subscribers terminate. Returns `false` for unknown queries.
    pub async fn retire(&self, query_id: QueryId) -> bool {
        let removed = self.logs.write().await.remove(&query_id);
        match removed {
            Some(log) => {
                log.close();
                tracing::debug!(%query_id, "retired progress log");
                true
            }
            None => false,
        }
    }

    /// Number of registered logs (active plus closed-but-not-retired).
    pub async fn log_count(&self) -> usize {
        self.logs.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
