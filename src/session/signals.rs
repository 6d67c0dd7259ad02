//! Lifecycle signaling primitives
//!
//! Readiness and termination are oneshot-style latches with multi-waiter
//! support. A fresh set is armed for every stream generation; latches are
//! never reused across restarts.

use tokio::sync::watch;

/// A set-once boolean signal
///
/// Opening is idempotent; any number of tasks can wait and all wake on open.
#[derive(Debug)]
pub(crate) struct Latch {
    tx: watch::Sender<bool>,
}

impl Latch {
    /// Create an unset latch
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Create a latch that is already open
    pub(crate) fn opened() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    /// Open the latch, waking all waiters
    pub(crate) fn open(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the latch is open
    pub(crate) fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the latch opens; returns immediately if already open
    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives inside self, so the channel cannot close while
        // this borrow is held.
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// Outcome of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadySignal {
    /// Stream construction still in progress
    Pending,
    /// Stream constructed; the queue is being consumed
    Ready,
    /// Stream construction failed; the session did not become active
    Failed,
}

/// A latch that settles to ready or failed exactly once
#[derive(Debug)]
pub(crate) struct ReadyLatch {
    tx: watch::Sender<ReadySignal>,
}

impl ReadyLatch {
    /// Create an unsettled latch
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadySignal::Pending);
        Self { tx }
    }

    /// Create a latch already settled as failed
    pub(crate) fn failed() -> Self {
        let (tx, _rx) = watch::channel(ReadySignal::Failed);
        Self { tx }
    }

    /// Settle as ready; no-op if already settled
    pub(crate) fn mark_ready(&self) {
        self.settle(ReadySignal::Ready);
    }

    /// Settle as failed; no-op if already settled
    pub(crate) fn mark_failed(&self) {
        self.settle(ReadySignal::Failed);
    }

    fn settle(&self, outcome: ReadySignal) {
        self.tx.send_if_modified(|signal| {
            if *signal == ReadySignal::Pending {
                *signal = outcome;
                true
            } else {
                false
            }
        });
    }

    /// Current value without waiting
    pub(crate) fn outcome(&self) -> ReadySignal {
        *self.tx.borrow()
    }

    /// Wait until settled and return the outcome
    pub(crate) async fn wait(&self) -> ReadySignal {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|signal| *signal != ReadySignal::Pending).await {
            Ok(signal) => *signal,
            // Unreachable while self holds the sender; treat as failed.
            Err(_) => ReadySignal::Failed,
        }
    }
}

/// Signals for one stream generation
///
/// Each (re)start arms a fresh epoch; stale loops keep their own epoch and
/// cannot disturb the signals of a newer generation.
#[derive(Debug)]
pub(crate) struct StreamEpoch {
    /// Generation token captured by the loop at start
    pub(crate) generation: u64,
    /// Settles once the provider stream is constructed (or fails)
    pub(crate) ready: ReadyLatch,
    /// Opens when the loop has fully unwound
    pub(crate) terminated: Latch,
    /// Cooperative cancellation flag for this generation
    pub(crate) abort: Latch,
}

impl StreamEpoch {
    /// Fresh signals for a starting stream
    pub(crate) fn armed(generation: u64) -> Self {
        Self {
            generation,
            ready: ReadyLatch::new(),
            terminated: Latch::new(),
            abort: Latch::new(),
        }
    }

    /// Pre-settled signals for a session that has never started a stream
    ///
    /// Termination is already open so dispose and reset on an idle, fresh
    /// session return immediately.
    pub(crate) fn settled() -> Self {
        Self {
            generation: 0,
            ready: ReadyLatch::failed(),
            terminated: Latch::opened(),
            abort: Latch::new(),
        }
    }
}
