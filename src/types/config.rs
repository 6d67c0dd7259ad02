//! Session and manager configuration
//!
//! This module contains the per-session options passed at creation time and
//! the engine-wide limits enforced by the session manager, including a
//! builder pattern for easy configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::identifiers::ToolName;
use serde::{Deserialize, Serialize};

/// Default maximum number of pending messages per session queue
pub const DEFAULT_QUEUE_DEPTH: usize = 20;

/// Default ceiling on concurrently processing sessions
pub const MAX_ACTIVE_SESSIONS: usize = 5;

/// Default idle duration after which a session is evicted (seconds)
pub const IDLE_TIMEOUT_SECS: u64 = 300;

/// Default interval between idle sweeps (seconds)
pub const SWEEP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Session Configuration
// ============================================================================

/// Per-session options supplied at creation time
///
/// The session never reads configuration on its own; everything it needs is
/// resolved by the caller and passed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Application scope used for artifact storage and marker dedup keys
    pub app_id: String,
    /// Scope for provider-side file operations
    pub working_dir: PathBuf,
    /// Model identifier forwarded to the provider
    pub model: Option<String>,
    /// Tools the provider is allowed to invoke
    pub allowed_tools: Vec<ToolName>,
    /// System prompt text forwarded to the provider
    pub system_prompt: Option<String>,
    /// Maximum number of pending messages before enqueue is rejected
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            working_dir: PathBuf::new(),
            model: None,
            allowed_tools: Vec::new(),
            system_prompt: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for `SessionConfig`
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the application scope
    #[must_use]
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.app_id = app_id.into();
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_dir = path.into();
        self
    }

    /// Set the model identifier
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Set allowed tools
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.config.allowed_tools = tools.into_iter().map(std::convert::Into::into).collect();
        self
    }

    /// Add an allowed tool
    #[must_use]
    pub fn add_allowed_tool(mut self, tool: impl Into<ToolName>) -> Self {
        self.config.allowed_tools.push(tool.into());
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set the queue depth limit
    #[must_use]
    pub const fn queue_depth(mut self, depth: usize) -> Self {
        self.config.queue_depth = depth;
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

// ============================================================================
// Manager Configuration
// ============================================================================

/// Engine-wide limits enforced by the session manager
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Maximum number of concurrently processing sessions
    pub max_active_sessions: usize,
    /// Idle duration after which a session is evicted
    pub idle_timeout: Duration,
    /// Interval between idle sweeps
    pub sweep_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: MAX_ACTIVE_SESSIONS,
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
        }
    }
}
