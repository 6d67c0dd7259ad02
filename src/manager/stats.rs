//! Aggregate statistics and session listing

use serde::Serialize;

use crate::session::{SessionPhase, SessionSnapshot};

use super::core::SessionManager;

/// Aggregate counters across all sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Sessions currently registered
    pub total_sessions: usize,
    /// Sessions whose stream loop is executing
    pub active_sessions: usize,
    /// Sessions whose provider is actively producing output
    pub responding_sessions: usize,
    /// Pending messages summed across all queues
    pub queued_messages: usize,
}

impl SessionManager {
    /// Aggregate counters across all sessions
    pub async fn stats(&self) -> ManagerStats {
        let sessions = self.sessions.lock().await;
        let mut stats = ManagerStats {
            total_sessions: sessions.len(),
            active_sessions: 0,
            responding_sessions: 0,
            queued_messages: 0,
        };
        for session in sessions.values() {
            if session.is_processing() {
                stats.active_sessions += 1;
            }
            if session.is_responding() {
                stats.responding_sessions += 1;
            }
            stats.queued_messages += session.queued_messages();
        }
        stats
    }

    /// Snapshot every session, sorted busiest first
    ///
    /// Sessions with a live stream sort before idle ones; within each group
    /// the most recently active comes first.
    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let snapshots: Vec<SessionSnapshot> = {
            let sessions = self.sessions.lock().await;
            sessions.values().map(|session| session.snapshot()).collect()
        };

        let mut snapshots = snapshots;
        snapshots.sort_by(|a, b| {
            let a_busy = a.phase != SessionPhase::Idle;
            let b_busy = b.phase != SessionPhase::Idle;
            match (a_busy, b_busy) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                _ => a.idle_for_ms.cmp(&b.idle_for_ms),
            }
        });
        snapshots
    }
}
