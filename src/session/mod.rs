//! Per-conversation session lifecycle
//!
//! A [`Session`] owns one conversation end to end: its message queue, the
//! live provider stream (at most one at a time), per-stream correlation
//! state, cancellation flags, and readiness/termination signaling. Sessions
//! cycle `Idle → Starting → Active → Terminating → Idle` and may be
//! restarted any number of times until disposed.

mod signals;
mod stream;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{EngineError, Result};
use crate::markers::TranscriptScan;
use crate::provider::{OutputStore, ProviderClient, ProviderStreamControl, StreamOptions};
use crate::queue::MessageQueue;
use crate::types::config::SessionConfig;
use crate::types::events::{SessionEvent, SessionEventPayload};
use crate::types::identifiers::ConversationId;
use crate::types::messages::UserMessage;

use signals::{ReadySignal, StreamEpoch};

// ============================================================================
// Session Phase
// ============================================================================

/// Lifecycle phase of a session
///
/// There is no terminal phase: after teardown a session returns to `Idle`
/// and may be restarted, until it is disposed and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No stream; entry point for `queue_message`
    Idle,
    /// Provider stream being constructed; readiness waiters block here
    Starting,
    /// Stream-consumption loop executing
    Active,
    /// Abort raised; the loop exits at its next yield point
    Terminating,
}

/// Point-in-time view of a session for listing and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Conversation this session owns
    pub conversation_id: ConversationId,
    /// Current lifecycle phase
    pub phase: SessionPhase,
    /// Pending messages in the queue
    pub queued_messages: usize,
    /// Whether the provider is actively producing output
    pub is_responding: bool,
    /// Milliseconds since the last recorded activity
    pub idle_for_ms: u64,
    /// Milliseconds since the session was created
    pub uptime_ms: u64,
    /// Resume token issued by the provider, if any
    pub provider_session_id: Option<String>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Session
// ============================================================================

/// Owner of one conversation's provider stream, queue, and lifecycle
pub struct Session {
    conversation_id: ConversationId,
    config: SessionConfig,
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn OutputStore>,
    queue: MessageQueue,
    created_at: DateTime<Utc>,

    // Lifecycle. Lock order where several are held: phase, then epoch, then
    // control or events. None is ever held across an await.
    phase: Mutex<SessionPhase>,
    epoch: Mutex<Arc<StreamEpoch>>,
    generation: AtomicU64,
    disposed: AtomicBool,
    is_processing: AtomicBool,
    is_responding: AtomicBool,
    interrupting: AtomicBool,
    last_activity: Mutex<Instant>,

    // Per-stream and per-conversation working state.
    provider_session_id: Mutex<Option<String>>,
    resume_next: Mutex<Option<String>>,
    control: Mutex<Option<Arc<dyn ProviderStreamControl>>>,
    transcript: Mutex<TranscriptScan>,
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

impl Session {
    /// Create a session for one conversation
    ///
    /// The session starts `Idle` with no stream; the first `queue_message`
    /// starts one lazily.
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        config: SessionConfig,
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn OutputStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Arc<Self> {
        let queue_depth = config.queue_depth;
        Arc::new(Self {
            conversation_id: conversation_id.into(),
            config,
            provider,
            store,
            queue: MessageQueue::new(queue_depth),
            created_at: Utc::now(),
            phase: Mutex::new(SessionPhase::Idle),
            epoch: Mutex::new(Arc::new(StreamEpoch::settled())),
            generation: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            is_processing: AtomicBool::new(false),
            is_responding: AtomicBool::new(false),
            interrupting: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            provider_session_id: Mutex::new(None),
            resume_next: Mutex::new(None),
            control: Mutex::new(None),
            transcript: Mutex::new(TranscriptScan::new()),
            events: Mutex::new(Some(events)),
        })
    }

    /// Conversation this session owns
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Options the session was created with
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Enqueue a user message, lazily starting the provider stream
    ///
    /// Records activity, starts a stream if none is running, waits for
    /// readiness, then enqueues. Resolves once the message has been consumed
    /// by the stream's prompt source.
    ///
    /// The enqueue races the stream's termination latch: if the stream winds
    /// down before consuming the message (natural close or a reset landing
    /// in the readiness window), the entry is retracted and the whole
    /// start-and-enqueue cycle retried on a fresh generation, so the call
    /// settles on every path instead of parking a message no loop drains.
    ///
    /// # Errors
    /// Returns `SessionUnavailable` if the session is disposed, the stream
    /// failed to become active, or the stream keeps ending without consuming
    /// anything; `CapacityExceeded` if the queue is full.
    pub async fn queue_message(self: &Arc<Self>, message: impl Into<UserMessage>) -> Result<()> {
        let message = message.into();
        // One retry covers the close-vs-enqueue race; a provider that keeps
        // hanging up without consuming anything fails the call instead of
        // restarting forever.
        for _ in 0..2 {
            if self.is_disposed() {
                return Err(EngineError::session_unavailable("session disposed"));
            }
            self.touch();
            let epoch = self.ensure_streaming();
            match epoch.ready.wait().await {
                ReadySignal::Ready => {}
                ReadySignal::Pending | ReadySignal::Failed => {
                    return Err(EngineError::session_unavailable(
                        "provider stream failed to start",
                    ));
                }
            }
            let (id, consumed) = self.queue.push(message.clone())?;
            tokio::select! {
                _ = consumed => return Ok(()),
                () = epoch.terminated.wait() => {
                    if !self.queue.retract(id) {
                        // Dequeued or force-cleared in the same instant;
                        // the continuation was settled either way.
                        return Ok(());
                    }
                    if self.is_disposed() {
                        // Disposal resolves pending messages rather than
                        // erroring them; match that for the raced entry.
                        return Ok(());
                    }
                }
            }
        }
        Err(EngineError::session_unavailable(
            "stream ended before the message was consumed",
        ))
    }

    /// Ask the provider to stop producing the current turn
    ///
    /// Not a reset: the stream stays open and queued messages continue to
    /// flow. Re-entrant calls while an interrupt is in flight return `Ok`
    /// without issuing a second one.
    ///
    /// # Errors
    /// Returns `InterruptFailed` carrying the provider's own error if the
    /// interrupt call fails.
    pub async fn interrupt(&self) -> Result<()> {
        if self.interrupting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let control = self.control.lock().clone();
        let result = match control {
            Some(control) => control.interrupt().await.map_err(|err| match err {
                EngineError::InterruptFailed(_) => err,
                other => EngineError::interrupt_failed(other.to_string()),
            }),
            None => Ok(()),
        };
        self.interrupting.store(false, Ordering::SeqCst);
        result
    }

    /// Raise the cooperative abort flag without waiting for termination
    pub fn abort(&self) {
        let epoch = self.abort_current();
        log::debug!(
            "abort raised for {} (generation {})",
            self.conversation_id.as_str(),
            epoch.generation
        );
    }

    /// Tear the session down; terminal
    ///
    /// Aborts any live stream, waits for its loop to unwind (which emits the
    /// stopped notification for an in-flight response), then resolves every
    /// queued message and releases the event sink. A disposed session
    /// rejects further messages and is never restarted.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            // Second caller waits for the same teardown.
            self.current_epoch().terminated.wait().await;
            return;
        }
        log::debug!("disposing session {}", self.conversation_id.as_str());
        self.queue.close();
        let epoch = self.abort_current();
        epoch.terminated.wait().await;
        let cleared = self.queue.clear();
        if cleared > 0 {
            log::debug!(
                "resolved {cleared} queued message(s) while disposing {}",
                self.conversation_id.as_str()
            );
        }
        self.transcript.lock().clear();
        *self.control.lock() = None;
        *self.events.lock() = None;
    }

    /// Discard the current stream and arm the session for a fresh start
    ///
    /// Aborts, drains the queue, waits for termination, then clears all
    /// per-stream state. When `resume` is supplied the next stream start
    /// asks the provider to resume from that token instead of starting
    /// fresh.
    ///
    /// # Errors
    /// Returns `SessionUnavailable` if the session is already disposed.
    pub async fn reset(&self, resume: Option<String>) -> Result<()> {
        if self.is_disposed() {
            return Err(EngineError::session_unavailable("session disposed"));
        }
        log::debug!("resetting session {}", self.conversation_id.as_str());
        let epoch = self.abort_current();
        let cleared = self.queue.clear();
        if cleared > 0 {
            log::debug!(
                "resolved {cleared} queued message(s) while resetting {}",
                self.conversation_id.as_str()
            );
        }
        epoch.terminated.wait().await;
        self.transcript.lock().clear();
        *self.provider_session_id.lock() = None;
        *self.resume_next.lock() = resume;
        self.touch();
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Whether the stream-consumption loop is currently executing
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::SeqCst)
    }

    /// Whether the provider is actively producing output
    #[must_use]
    pub fn is_responding(&self) -> bool {
        self.is_responding.load(Ordering::SeqCst)
    }

    /// Whether the session has been disposed
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Idle means: loop not running, provider quiet, queue empty
    ///
    /// The only state in which eviction is permitted. A live loop with a
    /// quiet provider is not idle.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.is_processing() && !self.is_responding() && self.queue.is_empty()
    }

    /// Time since the last recorded activity
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock()
    }

    /// Number of pending messages in the queue
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.queue.len()
    }

    /// Resume token issued by the provider on stream init, if any
    #[must_use]
    pub fn provider_session_id(&self) -> Option<String> {
        self.provider_session_id.lock().clone()
    }

    /// Point-in-time view for listing and diagnostics
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            conversation_id: self.conversation_id.clone(),
            phase: self.phase(),
            queued_messages: self.queue.len(),
            is_responding: self.is_responding(),
            idle_for_ms: self.idle_for().as_millis() as u64,
            uptime_ms: (Utc::now() - self.created_at).num_milliseconds().max(0) as u64,
            provider_session_id: self.provider_session_id(),
            created_at: self.created_at,
        }
    }

    // ========================================================================
    // Internals shared with the stream task
    // ========================================================================

    /// Record activity, deferring idle eviction
    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Emit one event to the sink, if it is still attached
    fn emit(&self, payload: SessionEventPayload) {
        let guard = self.events.lock();
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(SessionEvent::now(self.conversation_id.clone(), payload));
        }
    }

    fn current_epoch(&self) -> Arc<StreamEpoch> {
        Arc::clone(&self.epoch.lock())
    }

    /// Raise abort on the current generation and return its epoch
    fn abort_current(&self) -> Arc<StreamEpoch> {
        let epoch = {
            let mut phase = self.phase.lock();
            let epoch = Arc::clone(&self.epoch.lock());
            if matches!(*phase, SessionPhase::Starting | SessionPhase::Active) {
                *phase = SessionPhase::Terminating;
            }
            epoch
        };
        epoch.abort.open();
        epoch
    }

    /// Start a stream if none is running; returns the epoch to wait on
    ///
    /// A `Terminating` session restarts immediately with a new generation;
    /// the old loop is silenced by its stale generation token rather than
    /// awaited here.
    fn ensure_streaming(self: &Arc<Self>) -> Arc<StreamEpoch> {
        let mut phase = self.phase.lock();
        match *phase {
            SessionPhase::Starting | SessionPhase::Active => Arc::clone(&self.epoch.lock()),
            SessionPhase::Idle | SessionPhase::Terminating => {
                if self.is_disposed() {
                    return Arc::clone(&self.epoch.lock());
                }
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let epoch = Arc::new(StreamEpoch::armed(generation));
                *self.epoch.lock() = Arc::clone(&epoch);
                *phase = SessionPhase::Starting;
                self.is_processing.store(true, Ordering::SeqCst);
                log::debug!(
                    "starting stream generation {generation} for {}",
                    self.conversation_id.as_str()
                );
                tokio::spawn(stream::run_stream(Arc::clone(self), Arc::clone(&epoch)));
                epoch
            }
        }
    }

    /// Options for the next stream start, consuming any pending resume token
    fn next_stream_options(&self) -> StreamOptions {
        StreamOptions {
            model: self.config.model.clone(),
            allowed_tools: self.config.allowed_tools.clone(),
            system_prompt: self.config.system_prompt.clone(),
            working_dir: self.config.working_dir.clone(),
            resume: self.resume_next.lock().take(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conversation_id", &self.conversation_id)
            .field("phase", &self.phase())
            .field("queued_messages", &self.queue.len())
            .field("is_responding", &self.is_responding())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
