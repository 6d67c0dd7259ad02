//! Session registry operations
//!
//! Creation under the concurrency ceiling, lookup, disposal, reset, and the
//! broadcast operations that fan out across every live session.

use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::session::Session;
use crate::types::config::SessionConfig;
use crate::types::identifiers::ConversationId;

use super::core::{SessionManager, sweep_idle_once};

impl SessionManager {
    /// Return the session for a conversation, creating it if absent
    ///
    /// The whole check-then-insert runs under one lock hold, so concurrent
    /// calls for the same unseen conversation id yield exactly one session.
    /// Existing sessions are returned regardless of the ceiling; only
    /// creation counts against it, and only sessions that are actively
    /// processing occupy a slot.
    ///
    /// # Errors
    /// Returns `ConcurrencyLimitExceeded` when a new session would push the
    /// actively processing count past the configured ceiling.
    pub async fn get_or_create(
        &self,
        conversation_id: impl Into<ConversationId>,
        config: SessionConfig,
    ) -> Result<Arc<Session>> {
        let conversation_id = conversation_id.into();
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(conversation_id.as_str()) {
            if existing.is_disposed() {
                // A caller holding the Arc disposed it directly; drop the
                // stale entry and create a replacement.
                sessions.remove(conversation_id.as_str());
            } else {
                return Ok(Arc::clone(existing));
            }
        }

        let active = sessions
            .values()
            .filter(|session| session.is_processing())
            .count();
        if active >= self.config.max_active_sessions {
            return Err(EngineError::concurrency_limit(
                self.config.max_active_sessions,
            ));
        }

        let session = Session::new(
            conversation_id.clone(),
            config,
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
            self.events.clone(),
        );
        sessions.insert(conversation_id.clone(), Arc::clone(&session));
        log::info!("created session {}", conversation_id.as_str());
        Ok(session)
    }

    /// Look up a session without creating it
    pub async fn get(&self, conversation_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(conversation_id).cloned()
    }

    /// Whether a session exists for the conversation
    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.sessions.lock().await.contains_key(conversation_id)
    }

    /// Remove and tear down one session
    ///
    /// The entry is removed under the map lock; teardown is awaited outside
    /// it so creation never blocks behind a slow disposal.
    ///
    /// # Errors
    /// Returns `SessionNotFound` if no session exists for the conversation.
    pub async fn dispose(&self, conversation_id: &str) -> Result<()> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .remove(conversation_id)
                .ok_or_else(|| EngineError::session_not_found(conversation_id))?
        };
        session.dispose().await;
        Ok(())
    }

    /// Reset one session, optionally arming a provider resume token
    ///
    /// # Errors
    /// Returns `SessionNotFound` if no session exists for the conversation,
    /// or the session's own reset error.
    pub async fn reset_session(&self, conversation_id: &str, resume: Option<String>) -> Result<()> {
        let session = self
            .get(conversation_id)
            .await
            .ok_or_else(|| EngineError::session_not_found(conversation_id))?;
        session.reset(resume).await
    }

    /// Sweep now: dispose every session idle for longer than the timeout
    ///
    /// Same predicate as the periodic sweep task. Returns the number of
    /// sessions disposed.
    pub async fn dispose_idle(&self) -> usize {
        sweep_idle_once(&self.sessions, self.config.idle_timeout).await
    }

    /// Dispose every session; returns how many were disposed
    pub async fn dispose_all(&self) -> usize {
        let victims: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        let count = victims.len();
        for session in victims {
            session.dispose().await;
        }
        count
    }

    /// Raise the abort flag on every session without waiting
    pub async fn abort_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.lock().await.values().cloned().collect();
        for session in sessions {
            session.abort();
        }
    }

    /// Interrupt every session currently producing output
    ///
    /// Sessions that are not responding are skipped. A failed interrupt is
    /// logged and does not stop the fan-out. Returns the number of sessions
    /// successfully interrupted.
    pub async fn interrupt_all_responding(&self) -> usize {
        let responding: Vec<Arc<Session>> = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|session| session.is_responding())
            .cloned()
            .collect();

        let mut interrupted = 0;
        for session in responding {
            match session.interrupt().await {
                Ok(()) => interrupted += 1,
                Err(err) => {
                    log::warn!(
                        "failed to interrupt {}: {err}",
                        session.conversation_id().as_str()
                    );
                }
            }
        }
        interrupted
    }
}
