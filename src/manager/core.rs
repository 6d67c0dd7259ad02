//! Core session manager structure and lifecycle management
//!
//! Provides the main `SessionManager` struct with initialization, the idle
//! sweep task, and shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use crate::provider::{OutputStore, ProviderClient};
use crate::session::Session;
use crate::types::config::SessionManagerConfig;
use crate::types::events::SessionEvent;
use crate::types::identifiers::ConversationId;

/// Shared registry of live sessions keyed by conversation id
pub(super) type SessionMap = Arc<Mutex<HashMap<ConversationId, Arc<Session>>>>;

// ============================================================================
// SESSION MANAGER CORE
// ============================================================================

/// Manager for multiple concurrent agent sessions
///
/// The `SessionManager` coordinates every live conversation, handling:
/// - Session creation under a concurrency ceiling
/// - Periodic idle eviction
/// - Broadcast abort/interrupt across sessions
/// - Aggregate statistics
pub struct SessionManager {
    pub(super) sessions: SessionMap,
    pub(super) provider: Arc<dyn ProviderClient>,
    pub(super) store: Arc<dyn OutputStore>,
    pub(super) events: mpsc::UnboundedSender<SessionEvent>,
    pub(super) config: SessionManagerConfig,
    sweep_handle: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager with default limits and start the idle sweep task
    #[must_use]
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn OutputStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self::with_config(provider, store, events, SessionManagerConfig::default())
    }

    /// Create a manager with explicit limits and start the idle sweep task
    #[must_use]
    pub fn with_config(
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn OutputStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
        config: SessionManagerConfig,
    ) -> Self {
        let sessions: SessionMap = Arc::new(Mutex::new(HashMap::new()));

        // Spawn the idle sweep background task. It is the only automatic
        // eviction path; queue_message never evicts synchronously.
        let sweep_sessions = Arc::clone(&sessions);
        let idle_timeout = config.idle_timeout;
        let sweep_interval = config.sweep_interval;
        let sweep_handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                let evicted = sweep_idle_once(&sweep_sessions, idle_timeout).await;
                if evicted > 0 {
                    log::info!("idle sweep evicted {evicted} session(s)");
                }
            }
        });

        Self {
            sessions,
            provider,
            store,
            events,
            config,
            sweep_handle: parking_lot::Mutex::new(Some(sweep_handle)),
        }
    }

    /// Gracefully shut the manager down
    ///
    /// Stops the sweep task and disposes every session. Safe to call more
    /// than once; should be called before dropping for a clean teardown.
    pub async fn shutdown(&self) {
        log::info!("shutting down session manager");
        if let Some(handle) = self.sweep_handle.lock().take() {
            handle.abort();
        }
        let disposed = self.dispose_all().await;
        log::info!("session manager shutdown complete ({disposed} session(s) disposed)");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_handle.lock().take() {
            handle.abort();
        }
    }
}

/// One idle sweep pass
///
/// Eviction candidates are collected and removed under the map lock, then
/// disposed outside it so a slow teardown never blocks creation. Only the
/// session's idle predicate is consulted, never its queue contents.
pub(super) async fn sweep_idle_once(sessions: &SessionMap, idle_timeout: Duration) -> usize {
    let victims: Vec<Arc<Session>> = {
        let mut map = sessions.lock().await;
        let expired: Vec<ConversationId> = map
            .iter()
            .filter(|(_, session)| session.is_idle() && session.idle_for() > idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| map.remove(&id))
            .collect()
    };

    let count = victims.len();
    for session in victims {
        log::info!(
            "evicting idle session {} (idle for {:?})",
            session.conversation_id().as_str(),
            session.idle_for()
        );
        session.dispose().await;
    }
    count
}
