//! Per-session message queue
//!
//! An ordered buffer of pending user messages with per-enqueue completion
//! signaling: `enqueue` resolves once its message has been consumed by the
//! stream's prompt source, or immediately when the queue is force-cleared
//! during teardown. Depth is bounded; a full queue rejects rather than
//! blocks.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::types::config::DEFAULT_QUEUE_DEPTH;
use crate::types::messages::UserMessage;

/// A pending user turn
#[derive(Debug)]
pub struct QueuedMessage {
    /// Unique id assigned at enqueue time
    pub id: Uuid,
    /// The user message payload
    pub message: UserMessage,
    /// When the message was enqueued
    pub enqueued_at: Instant,
}

/// Entry held inside the queue; the resolve sender is settled exactly once,
/// either at dequeue or when the queue is cleared.
struct PendingEntry {
    queued: QueuedMessage,
    resolve: oneshot::Sender<()>,
}

struct QueueInner {
    entries: VecDeque<PendingEntry>,
    closed: bool,
}

/// Ordered, depth-bounded buffer of pending user messages
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    ready: Notify,
    max_depth: usize,
}

impl MessageQueue {
    /// Create a queue with the given depth limit
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                entries: VecDeque::new(),
                closed: false,
            }),
            ready: Notify::new(),
            max_depth,
        }
    }

    /// Append a message and wait until it is consumed or cleared
    ///
    /// # Errors
    /// Returns `CapacityExceeded` if the queue is at its depth limit, or
    /// `SessionUnavailable` if the queue has been closed by disposal.
    pub async fn enqueue(&self, message: UserMessage) -> Result<()> {
        let (_id, consumed) = self.push(message)?;
        // A dropped sender counts as settled: the queue was torn down and
        // the caller must not hang.
        let _ = consumed.await;
        Ok(())
    }

    /// Append a message without waiting, returning its id and continuation
    ///
    /// The session races the continuation against stream termination and
    /// retracts the entry when the stream wound down first.
    pub(crate) fn push(&self, message: UserMessage) -> Result<(Uuid, oneshot::Receiver<()>)> {
        let (id, consumed) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(EngineError::session_unavailable("session disposed"));
            }
            if inner.entries.len() >= self.max_depth {
                return Err(EngineError::capacity_exceeded(self.max_depth));
            }
            let (resolve, consumed) = oneshot::channel();
            let id = Uuid::new_v4();
            inner.entries.push_back(PendingEntry {
                queued: QueuedMessage {
                    id,
                    message,
                    enqueued_at: Instant::now(),
                },
                resolve,
            });
            (id, consumed)
        };
        self.ready.notify_one();
        Ok((id, consumed))
    }

    /// Take back a pushed entry that was never consumed
    ///
    /// Returns false when the entry is gone already (dequeued or cleared),
    /// meaning its continuation was settled by someone else.
    pub(crate) fn retract(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.queued.id != id);
        inner.entries.len() != before
    }

    /// Pop the oldest pending message, settling its continuation
    pub fn dequeue_next(&self) -> Option<QueuedMessage> {
        let entry = self.inner.lock().entries.pop_front()?;
        let _ = entry.resolve.send(());
        Some(entry.queued)
    }

    /// Drain the queue, settling every pending continuation
    ///
    /// Returns the number of messages cleared. Used on abort and disposal so
    /// enqueue callers never hang on a stream that will not consume them.
    pub fn clear(&self) -> usize {
        let drained: Vec<PendingEntry> = self.inner.lock().entries.drain(..).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.resolve.send(());
        }
        count
    }

    /// Reject all future enqueues; pending entries are untouched
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Number of pending messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the queue has no pending messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Wait until a message may be available
    ///
    /// Wakeups are edge-triggered with a stored permit, so a notify that
    /// races this call is not lost; callers must re-check the queue after
    /// waking.
    pub(crate) async fn wait_ready(&self) {
        self.ready.notified().await;
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MessageQueue")
            .field("len", &inner.entries.len())
            .field("closed", &inner.closed)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
