//! Per-query append-only progress log with replay-from-start subscription.
//!
//! The log is the ordering authority for a query's progress messages: a
//! single writer (the progress tracker) appends, any number of
//! [`ProgressStream`]s consume via their own cursor. A subscriber joining
//! mid-query first drains the history, then receives live messages, with
//! no duplication and no gap. Closing the log ends every stream once it
//! has drained.

use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use showrun_core::types::QueryId;

use crate::message::ProgressMessage;

// ---------------------------------------------------------------------------
// Log state signal
// ---------------------------------------------------------------------------

/// Compact log state carried on the watch channel: current length and
/// whether the writer has closed the log.
#[derive(Debug, Clone, Copy, Default)]
struct LogState {
    len: usize,
    closed: bool,
}

// ---------------------------------------------------------------------------
// ProgressLog
// ---------------------------------------------------------------------------

/// Append-only message log for one query.
///
/// Shared as `Arc<ProgressLog>`; messages are `Arc`ed so replay never
/// copies message bodies.
#[derive(Debug)]
pub struct ProgressLog {
    query_id: QueryId,
    messages: RwLock<Vec<Arc<ProgressMessage>>>,
    state_tx: watch::Sender<LogState>,
}

impl ProgressLog {
    pub fn new(query_id: QueryId) -> Self {
        let (state_tx, _) = watch::channel(LogState::default());
        Self {
            query_id,
            messages: RwLock::new(Vec::new()),
            state_tx,
        }
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    /// Append a message, assigning the next sequence id. Returns the id.
    ///
    /// The caller is the query's single writer; appends after `close` are
    /// a caller bug upheld by that discipline, not checked here.
    pub async fn append(&self, mut message: ProgressMessage) -> u64 {
        let mut messages = self.messages.write().await;
        let seq = messages.len() as u64;
        message.id = seq;
        messages.push(Arc::new(message));
        let len = messages.len();
        drop(messages);

        self.state_tx.send_modify(|state| state.len = len);
        seq
    }

    /// All messages appended so far, in order.
    pub async fn snapshot(&self) -> Vec<Arc<ProgressMessage>> {
        self.messages.read().await.clone()
    }

    /// Number of messages appended so far.
    pub fn len(&self) -> usize {
        self.state_tx.borrow().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the log complete. Streams end once they have drained;
    /// the history stays readable until the log is retired.
    pub fn close(&self) {
        self.state_tx.send_modify(|state| state.closed = true);
    }

    pub fn is_closed(&self) -> bool {
        self.state_tx.borrow().closed
    }

    /// Subscribe with replay from the first message.
    pub fn subscribe(self: &Arc<Self>) -> ProgressStream {
        ProgressStream {
            log: Arc::clone(self),
            cursor: 0,
            state_rx: self.state_tx.subscribe(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressStream
// ---------------------------------------------------------------------------

/// A consumer cursor over one query's log.
///
/// Each stream progresses independently; dropping it never affects the
/// log or other subscribers.
#[derive(Debug)]
pub struct ProgressStream {
    log: Arc<ProgressLog>,
    cursor: usize,
    state_rx: watch::Receiver<LogState>,
}

impl ProgressStream {
    /// The next message, in emission order.
    ///
    /// Replays history first, then waits for live appends. Returns `None`
    /// once the log is closed and fully drained.
    pub async fn next(&mut self) -> Option<Arc<ProgressMessage>> {
        loop {
            {
                let messages = self.log.messages.read().await;
                if self.cursor < messages.len() {
                    let message = Arc::clone(&messages[self.cursor]);
                    self.cursor += 1;
                    return Some(message);
                }
            }

            // Caught up; re-check under the watch in case an append landed
            // between the read above and here, then wait for a change.
            let state = *self.state_rx.borrow_and_update();
            if self.cursor < state.len {
                continue;
            }
            if state.closed {
                return None;
            }
            // The sender lives inside the log we hold, so this cannot fail.
            let _ = self.state_rx.changed().await;
        }
    }

    /// Messages consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ProgressKind;

    fn log() -> Arc<ProgressLog> {
        Arc::new(ProgressLog::new(QueryId::new_v4()))
    }

    fn msg(log: &ProgressLog, content: &str) -> ProgressMessage {
        ProgressMessage::new(log.query_id(), ProgressKind::Status, content)
    }

    // -- Append ---------------------------------------------------------------

    #[tokio::test]
    async fn append_assigns_dense_sequence_ids() {
        let log = log();
        assert_eq!(log.append(msg(&log, "a")).await, 0);
        assert_eq!(log.append(msg(&log, "b")).await, 1);
        assert_eq!(log.append(msg(&log, "c")).await, 2);
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn snapshot_returns_messages_in_order() {
        let log = log();
        log.append(msg(&log, "first")).await;
        log.append(msg(&log, "second")).await;
        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].content, "first");
        assert_eq!(snapshot[1].content, "second");
        assert_eq!(snapshot[1].id, 1);
    }

    // -- Subscription ---------------------------------------------------------

    #[tokio::test]
    async fn subscriber_receives_live_messages_in_order() {
        let log = log();
        let mut stream = log.subscribe();

        log.append(msg(&log, "a")).await;
        log.append(msg(&log, "b")).await;

        assert_eq!(stream.next().await.unwrap().content, "a");
        assert_eq!(stream.next().await.unwrap().content, "b");
    }

    #[tokio::test]
    async fn late_subscriber_replays_history_before_live() {
        let log = log();
        log.append(msg(&log, "h1")).await;
        log.append(msg(&log, "h2")).await;
        log.append(msg(&log, "h3")).await;

        let mut stream = log.subscribe();
        log.append(msg(&log, "live")).await;

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(stream.next().await.unwrap());
        }
        let ids: Vec<u64> = seen.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(seen[3].content, "live");
    }

    #[tokio::test]
    async fn streams_progress_independently() {
        let log = log();
        log.append(msg(&log, "a")).await;
        log.append(msg(&log, "b")).await;

        let mut s1 = log.subscribe();
        let mut s2 = log.subscribe();
        assert_eq!(s1.next().await.unwrap().id, 0);
        assert_eq!(s1.next().await.unwrap().id, 1);
        // s2 still starts at the beginning.
        assert_eq!(s2.next().await.unwrap().id, 0);
        assert_eq!(s1.position(), 2);
        assert_eq!(s2.position(), 1);
    }

    #[tokio::test]
    async fn waiting_subscriber_wakes_on_append() {
        let log = log();
        let mut stream = log.subscribe();

        let waiter = tokio::spawn(async move { stream.next().await });
        tokio::task::yield_now().await;
        log.append(msg(&log, "wake")).await;

        let received = waiter.await.unwrap().unwrap();
        assert_eq!(received.content, "wake");
    }

    // -- Close ----------------------------------------------------------------

    #[tokio::test]
    async fn closed_log_ends_stream_after_drain() {
        let log = log();
        log.append(msg(&log, "a")).await;
        log.append(msg(&log, "b")).await;
        log.close();

        let mut stream = log.subscribe();
        assert_eq!(stream.next().await.unwrap().content, "a");
        assert_eq!(stream.next().await.unwrap().content, "b");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_closed_log_ends_immediately() {
        let log = log();
        log.close();
        let mut stream = log.subscribe();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_waiting_subscriber() {
        let log = log();
        let mut stream = log.subscribe();

        let waiter = tokio::spawn(async move { stream.next().await });
        tokio::task::yield_now().await;
        log.close();

        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_remains_readable_after_close() {
        let log = log();
        log.append(msg(&log, "kept")).await;
        log.close();
        assert!(log.is_closed());
        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "kept");
    }

    // -- Ordering under concurrency -------------------------------------------

    #[tokio::test]
    async fn concurrent_subscriber_observes_emission_order() {
        let log = log();
        let mut stream = log.subscribe();

        let reader = tokio::spawn(async move {
            let mut ids = Vec::new();
            while let Some(message) = stream.next().await {
                ids.push(message.id);
            }
            ids
        });

        for i in 0..50 {
            log.append(msg(&log, &format!("m{i}"))).await;
            if i % 7 == 0 {
                tokio::task::yield_now().await;
            }
        }
        log.close();

        let ids = reader.await.unwrap();
        assert_eq!(ids, (0..50).collect::<Vec<u64>>());
    }
}
