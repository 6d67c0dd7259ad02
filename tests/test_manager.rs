//! Integration tests for the session manager
//!
//! Tests registry semantics, the processing ceiling, idle eviction, the
//! broadcast operations, and aggregate statistics. Eviction tests run on the
//! paused clock so idle timers are exact.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use agent_mux::{
    EngineError, OutputStore, ProviderClient, ProviderEvent, SessionConfig, SessionEvent,
    SessionManager, SessionManagerConfig, SessionPhase,
};

use common::{MockBehavior, MockProvider, MockStore, init_logging, wait_until};

fn held_stream() -> MockBehavior {
    MockBehavior::ScriptThenHold {
        events: vec![ProviderEvent::TextDelta {
            index: 0,
            text: "busy".to_string(),
        }],
    }
}

fn manager_with(
    provider: Arc<MockProvider>,
    config: SessionManagerConfig,
) -> (SessionManager, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = SessionManager::with_config(
        provider as Arc<dyn ProviderClient>,
        MockStore::new() as Arc<dyn OutputStore>,
        tx,
        config,
    );
    (manager, rx)
}

/// Config with the sweep task effectively disabled.
fn quiet_config() -> SessionManagerConfig {
    SessionManagerConfig {
        sweep_interval: Duration::from_secs(3600),
        ..SessionManagerConfig::default()
    }
}

// ============================================================================
// Registry
// ============================================================================

#[tokio::test]
async fn test_get_or_create_reuses_sessions() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let (manager, _rx) = manager_with(provider, quiet_config());

    let first = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    let again = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    assert!(manager.contains("conv-a").await);
    assert!(manager.get("conv-a").await.is_some());
    assert!(manager.get("conv-b").await.is_none());
    assert_eq!(manager.stats().await.total_sessions, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_one_session() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let (manager, _rx) = manager_with(provider, quiet_config());
    let manager = Arc::new(manager);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .get_or_create("conv-shared", SessionConfig::default())
                .await
                .unwrap()
        }));
    }

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap());
    }
    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0], session));
    }
    assert_eq!(manager.stats().await.total_sessions, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_disposed_session_replaced() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let (manager, _rx) = manager_with(provider, quiet_config());

    let stale = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    // Disposed behind the manager's back, straight through the handle.
    stale.dispose().await;

    let replacement = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&stale, &replacement));
    assert!(!replacement.is_disposed());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_unknown_session_operations_error() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let (manager, _rx) = manager_with(provider, quiet_config());

    assert!(matches!(
        manager.dispose("missing").await,
        Err(EngineError::SessionNotFound(_))
    ));
    assert!(matches!(
        manager.reset_session("missing", None).await,
        Err(EngineError::SessionNotFound(_))
    ));

    manager.shutdown().await;
}

// ============================================================================
// Processing ceiling
// ============================================================================

#[tokio::test]
async fn test_ceiling_blocks_creation_when_full() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let config = SessionManagerConfig {
        max_active_sessions: 2,
        ..quiet_config()
    };
    let (manager, _rx) = manager_with(provider, config);

    let a = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    let b = manager
        .get_or_create("conv-b", SessionConfig::default())
        .await
        .unwrap();
    a.queue_message("work").await.unwrap();
    b.queue_message("work").await.unwrap();

    let blocked = manager
        .get_or_create("conv-c", SessionConfig::default())
        .await;
    match blocked {
        Err(EngineError::ConcurrencyLimitExceeded(limit)) => assert_eq!(limit, 2),
        other => panic!("expected the ceiling to reject, got {other:?}"),
    }

    // Existing conversations are untouched by the ceiling.
    let existing = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&a, &existing));

    // Disposing a busy session frees its slot.
    manager.dispose("conv-a").await.unwrap();
    let unblocked = manager
        .get_or_create("conv-c", SessionConfig::default())
        .await;
    assert!(unblocked.is_ok());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_idle_sessions_do_not_occupy_slots() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let config = SessionManagerConfig {
        max_active_sessions: 1,
        ..quiet_config()
    };
    let (manager, _rx) = manager_with(provider, config);

    // Neither session ever streams, so neither counts against the ceiling.
    manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    manager
        .get_or_create("conv-b", SessionConfig::default())
        .await
        .unwrap();
    assert_eq!(manager.stats().await.total_sessions, 2);

    manager.shutdown().await;
}

// ============================================================================
// Idle eviction
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_evicts_idle_sessions() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let config = SessionManagerConfig {
        max_active_sessions: 5,
        idle_timeout: Duration::from_secs(5),
        sweep_interval: Duration::from_secs(1),
    };
    let (manager, _rx) = manager_with(provider, config);

    manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    assert!(manager.contains("conv-a").await);

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert!(!manager.contains("conv-a").await);
    assert_eq!(manager.stats().await.total_sessions, 0);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_busy_session_survives_sweep() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let config = SessionManagerConfig {
        max_active_sessions: 5,
        idle_timeout: Duration::from_secs(5),
        sweep_interval: Duration::from_secs(1),
    };
    let (manager, _rx) = manager_with(provider, config);

    let session = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    session.queue_message("keep busy").await.unwrap();
    wait_until("the provider starts responding", || session.is_responding()).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(manager.contains("conv-a").await);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispose_idle_requires_strictly_exceeded_timeout() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let config = SessionManagerConfig {
        max_active_sessions: 5,
        idle_timeout: Duration::from_secs(10),
        sweep_interval: Duration::from_secs(3600),
    };
    let (manager, _rx) = manager_with(provider, config);

    manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();

    // Exactly at the timeout the session stays.
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(manager.dispose_idle().await, 0);
    assert!(manager.contains("conv-a").await);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(manager.dispose_idle().await, 1);
    assert!(!manager.contains("conv-a").await);

    manager.shutdown().await;
}

// ============================================================================
// Broadcast operations
// ============================================================================

#[tokio::test]
async fn test_interrupt_all_responding_skips_quiet_sessions() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let (manager, _rx) = manager_with(Arc::clone(&provider), quiet_config());

    let busy = manager
        .get_or_create("conv-busy", SessionConfig::default())
        .await
        .unwrap();
    manager
        .get_or_create("conv-quiet", SessionConfig::default())
        .await
        .unwrap();
    busy.queue_message("work").await.unwrap();
    wait_until("the provider starts responding", || busy.is_responding()).await;

    assert_eq!(manager.interrupt_all_responding().await, 1);
    assert_eq!(provider.interrupt_count(), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_abort_all_stops_streams() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let (manager, _rx) = manager_with(provider, quiet_config());

    let session = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    session.queue_message("work").await.unwrap();
    assert!(session.is_processing());

    manager.abort_all().await;
    wait_until("the aborted stream winds down", || !session.is_processing()).await;
    assert_eq!(session.phase(), SessionPhase::Idle);

    // Aborted is not disposed; the registry entry stays.
    assert!(manager.contains("conv-a").await);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_reset_session_arms_resume() {
    init_logging();
    let provider = MockProvider::new(MockBehavior::Echo);
    let (manager, _rx) = manager_with(Arc::clone(&provider), quiet_config());

    let session = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    session.queue_message("first").await.unwrap();

    manager
        .reset_session("conv-a", Some("tok-1".to_string()))
        .await
        .unwrap();
    session.queue_message("second").await.unwrap();

    assert_eq!(
        provider.recorded_resumes(),
        vec![None, Some("tok-1".to_string())]
    );

    manager.shutdown().await;
}

// ============================================================================
// Statistics and listing
// ============================================================================

#[tokio::test]
async fn test_stats_reflect_session_states() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let (manager, _rx) = manager_with(provider, quiet_config());

    let busy = manager
        .get_or_create("conv-busy", SessionConfig::default())
        .await
        .unwrap();
    manager
        .get_or_create("conv-quiet", SessionConfig::default())
        .await
        .unwrap();
    busy.queue_message("work").await.unwrap();
    wait_until("the provider starts responding", || busy.is_responding()).await;

    // Park a second message behind the held stream so the queued counter
    // has something to count.
    let waiter = {
        let busy = Arc::clone(&busy);
        tokio::spawn(async move { busy.queue_message("parked").await })
    };
    wait_until("the second message is queued", || {
        busy.queued_messages() == 1
    })
    .await;

    let stats = manager.stats().await;
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.active_sessions, 1);
    assert_eq!(stats.responding_sessions, 1);
    assert_eq!(stats.queued_messages, 1);

    manager.shutdown().await;
    let parked = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("parked enqueue never settled")
        .unwrap();
    assert!(parked.is_ok());
    assert_eq!(manager.stats().await.total_sessions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_list_sessions_busy_first_then_least_idle() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let (manager, _rx) = manager_with(provider, quiet_config());

    manager
        .get_or_create("conv-idle-old", SessionConfig::default())
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;
    manager
        .get_or_create("conv-idle-new", SessionConfig::default())
        .await
        .unwrap();

    let busy = manager
        .get_or_create("conv-busy", SessionConfig::default())
        .await
        .unwrap();
    busy.queue_message("work").await.unwrap();
    wait_until("the provider starts responding", || busy.is_responding()).await;

    let listed = manager.list_sessions().await;
    let order: Vec<&str> = listed
        .iter()
        .map(|snapshot| snapshot.conversation_id.as_str())
        .collect();
    assert_eq!(order, vec!["conv-busy", "conv-idle-new", "conv-idle-old"]);
    assert_eq!(listed[0].phase, SessionPhase::Active);

    manager.shutdown().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_disposes_every_session() {
    init_logging();
    let provider = MockProvider::new(held_stream());
    let (manager, _rx) = manager_with(provider, quiet_config());

    let a = manager
        .get_or_create("conv-a", SessionConfig::default())
        .await
        .unwrap();
    manager
        .get_or_create("conv-b", SessionConfig::default())
        .await
        .unwrap();
    a.queue_message("work").await.unwrap();

    manager.shutdown().await;
    assert_eq!(manager.stats().await.total_sessions, 0);
    assert!(a.is_disposed());
    assert!(matches!(
        a.queue_message("late").await,
        Err(EngineError::SessionUnavailable(_))
    ));

    // Safe to call again.
    manager.shutdown().await;
}
