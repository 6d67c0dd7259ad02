//! Error types for the session engine

use thiserror::Error;

/// Main error type for session engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Message queue is at its depth limit
    #[error("Message queue full (depth limit {0})")]
    CapacityExceeded(usize),

    /// Too many sessions are actively processing
    #[error("Active session limit reached: {0}")]
    ConcurrencyLimitExceeded(usize),

    /// Session failed to become active after a readiness wait
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// Error raised while constructing or iterating a provider stream
    #[error("Provider stream error: {0}")]
    ProviderStream(String),

    /// The provider rejected or failed an interrupt request
    #[error("Interrupt failed: {0}")]
    InterruptFailed(String),

    /// No session registered for the conversation id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Artifact store rejected a marker span
    #[error("Output store error: {0}")]
    OutputStore(String),

    /// JSON decode error at the provider boundary
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),
}

/// Result type alias for session engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create a queue capacity error
    #[must_use]
    pub fn capacity_exceeded(limit: usize) -> Self {
        Self::CapacityExceeded(limit)
    }

    /// Create a session ceiling error
    #[must_use]
    pub fn concurrency_limit(limit: usize) -> Self {
        Self::ConcurrencyLimitExceeded(limit)
    }

    /// Create a session unavailable error
    pub fn session_unavailable(msg: impl Into<String>) -> Self {
        Self::SessionUnavailable(msg.into())
    }

    /// Create a provider stream error
    pub fn provider_stream(msg: impl Into<String>) -> Self {
        Self::ProviderStream(msg.into())
    }

    /// Create an interrupt failure error
    pub fn interrupt_failed(msg: impl Into<String>) -> Self {
        Self::InterruptFailed(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(conversation_id: impl Into<String>) -> Self {
        Self::SessionNotFound(conversation_id.into())
    }

    /// Create an output store error
    pub fn output_store(msg: impl Into<String>) -> Self {
        Self::OutputStore(msg.into())
    }
}
