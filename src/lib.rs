#![recursion_limit = "256"]

//! # Agent Mux
//!
//! A multi-tenant streaming session engine for conversational AI agents. This
//! library multiplexes many concurrent agent conversations over a streaming
//! provider backend, with per-conversation message queueing, lifecycle
//! management, and transcript post-processing.
//!
//! ## Quick Start
//!
//! Implement [`ProviderClient`] for your backend, then drive sessions through
//! a [`SessionManager`]:
//!
//! ```ignore
//! use std::sync::Arc;
//! use agent_mux::{SessionConfig, SessionManager};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//!     let manager = SessionManager::new(provider, store, events_tx);
//!
//!     let config = SessionConfig::builder()
//!         .app_id("support-desk")
//!         .model("sonnet")
//!         .build();
//!
//!     let session = manager.get_or_create("conv-42", config).await?;
//!     session.queue_message("Summarize the open tickets").await?;
//!
//!     while let Some(event) = events_rx.recv().await {
//!         log::info!("[{}] {:?}", event.conversation_id.as_str(), event.payload);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Session Lifecycle
//!
//! Each [`Session`] owns one conversation. The provider stream is started
//! lazily on the first queued message, restarted transparently after resets,
//! and torn down on dispose. Stale stream generations are silenced rather
//! than joined, so a reset never blocks on a slow provider.
//!
//! ### 2. Bounded Message Queueing
//!
//! Messages queue per-session in FIFO order with a bounded depth. Every
//! `queue_message` call resolves exactly once: when the message is handed to
//! the provider, or immediately with an error if the session cannot accept it.
//!
//! ### 3. Sub-Agent Output Markers
//!
//! Assistant text is scanned for `<<<id>>> ... <<<end-id>>>` marker spans.
//! Completed spans are persisted through an [`OutputStore`] and surfaced as
//! events, with duplicate suppression across the growing transcript.
//!
//! ### 4. Multi-Session Management
//!
//! The [`SessionManager`] enforces a ceiling on concurrently-processing
//! sessions, evicts idle sessions on a periodic sweep, and offers fan-out
//! operations (abort all, interrupt all responding) plus aggregate
//! statistics.
//!
//! ## Architecture
//!
//! The engine is organized into several key modules:
//!
//! - [`types`]: Core type definitions, newtypes, and builders
//! - [`provider`]: Traits the host implements to plug in a backend
//! - [`session`]: Single-conversation state machine and stream loop
//! - [`queue`]: Bounded FIFO message queue with per-message continuations
//! - [`markers`]: Transcript marker scanning and deduplication
//! - [`manager`]: Multi-session registry, limits, and eviction
//! - [`error`]: Error types and handling
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, EngineError>`](Result). Errors
//! inside a running stream loop are reported as session events; errors from
//! caller-invoked operations come back through `Result`:
//!
//! ```no_run
//! # use agent_mux::{EngineError, SessionManager, SessionConfig};
//! # async fn example(manager: &SessionManager) {
//! match manager.get_or_create("conv-1", SessionConfig::default()).await {
//!     Ok(session) => { /* ... */ }
//!     Err(EngineError::ConcurrencyLimitExceeded(limit)) => {
//!         log::warn!("all {limit} session slots busy, try again later");
//!     }
//!     Err(e) => {
//!         log::error!("session error: {e}");
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod manager;
pub mod markers;
pub mod provider;
pub mod queue;
pub mod session;
pub mod types;

// Re-export commonly used types for external API
pub use error::{EngineError, Result};
pub use manager::{ManagerStats, SessionManager};
pub use markers::{MarkerSpan, TranscriptScan, scan_markers};
pub use provider::{
    OutputStore, PromptStream, ProviderClient, ProviderEventStream, ProviderHandle,
    ProviderStreamControl, StreamOptions,
};
pub use queue::{MessageQueue, QueuedMessage};
pub use session::{Session, SessionPhase, SessionSnapshot};

// Re-export type submodules for flat public API
pub use types::config::{
    DEFAULT_QUEUE_DEPTH, IDLE_TIMEOUT_SECS, MAX_ACTIVE_SESSIONS, SWEEP_INTERVAL_SECS,
    SessionConfig, SessionConfigBuilder, SessionManagerConfig,
};
pub use types::events::{SessionEvent, SessionEventPayload};
pub use types::identifiers::{ConversationId, ToolName, ToolUseId};
pub use types::messages::{ContentBlock, ContentValue, ToolResultBlock, UserMessage};
pub use types::provider::{ProviderEvent, StreamBlock};

/// Version of the engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
