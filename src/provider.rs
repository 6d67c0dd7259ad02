//! Provider and collaborator seams
//!
//! This module defines the contracts the engine consumes from its external
//! collaborators: the provider client that owns the actual connection to the
//! agent backend, the per-stream interrupt handle it returns, and the output
//! store that persists extracted sub-agent artifacts.
//!
//! All traits are object-safe; async methods return boxed futures so
//! implementations can live behind `Arc<dyn ...>`.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::identifiers::ToolName;
use crate::types::messages::UserMessage;
use crate::types::provider::ProviderEvent;

/// Pull-based source of user messages fed to the provider
///
/// The session builds one per stream from its message queue; the provider
/// drains it for as long as the stream lives.
pub type PromptStream = BoxStream<'static, UserMessage>;

/// Events yielded by a live provider stream
pub type ProviderEventStream = BoxStream<'static, Result<ProviderEvent>>;

/// Options assembled for one stream start
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Model identifier
    pub model: Option<String>,
    /// Tools the provider is allowed to invoke
    pub allowed_tools: Vec<ToolName>,
    /// System prompt text
    pub system_prompt: Option<String>,
    /// Scope for provider-side file operations
    pub working_dir: PathBuf,
    /// Resume token from a previous stream, if resuming
    pub resume: Option<String>,
}

/// A live provider stream: its events plus an interrupt handle
pub struct ProviderHandle {
    /// Ordered provider events; ends when the provider closes the stream
    pub events: ProviderEventStream,
    /// Handle for stopping the current turn without tearing the stream down
    pub control: Arc<dyn ProviderStreamControl>,
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("events", &"<stream>")
            .field("control", &"<control>")
            .finish()
    }
}

/// Client for a stream-capable conversational agent provider
///
/// The engine treats the provider as a black box: given a prompt source and
/// options it yields a single asynchronous event stream per session lifetime.
pub trait ProviderClient: Send + Sync + 'static {
    /// Open a bidirectional stream against the provider
    ///
    /// # Errors
    /// Returns error if the stream could not be constructed; the session
    /// surfaces this as a failed readiness wait.
    fn start_stream(
        &self,
        prompts: PromptStream,
        options: StreamOptions,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderHandle>> + Send + '_>>;
}

/// Interrupt handle for a live provider stream
pub trait ProviderStreamControl: Send + Sync {
    /// Ask the provider to stop producing the current turn
    ///
    /// This is not a teardown; the stream stays open for further messages.
    ///
    /// # Errors
    /// Returns the provider's own error if the interrupt call fails.
    fn interrupt(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Store for structured sub-agent output extracted from transcripts
pub trait OutputStore: Send + Sync + 'static {
    /// Persist one extracted span and return an opaque retrieval key
    ///
    /// # Errors
    /// Returns error if the span could not be persisted.
    fn store(
        &self,
        scope: &str,
        agent_id: &str,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}
