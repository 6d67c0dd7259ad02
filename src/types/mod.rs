//! Type definitions for the session engine
//!
//! This module contains all the type definitions used throughout the engine,
//! organized into logical submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`ConversationId`, `ToolUseId`, `ToolName`)
//! - [`messages`] - User messages and finalized content blocks
//! - [`provider`] - Wire-shaped events yielded by provider streams
//! - [`events`] - Typed events emitted to the event sink
//! - [`config`] - Session options and manager limits

pub mod config;
pub mod events;
pub mod identifiers;
pub mod messages;
pub mod provider;

// Re-export commonly used types
pub use config::{
    DEFAULT_QUEUE_DEPTH, IDLE_TIMEOUT_SECS, MAX_ACTIVE_SESSIONS, SWEEP_INTERVAL_SECS,
    SessionConfig, SessionConfigBuilder, SessionManagerConfig,
};
pub use events::{SessionEvent, SessionEventPayload};
pub use identifiers::{ConversationId, ToolName, ToolUseId};
pub use messages::{ContentBlock, ContentValue, ToolResultBlock, UserMessage};
pub use provider::{ProviderEvent, StreamBlock};
