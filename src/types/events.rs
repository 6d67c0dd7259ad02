//! Typed events emitted to the event sink
//!
//! Each session emits an ordered stream of [`SessionEvent`]s describing
//! provider output as it arrives. Every event is attributable to exactly one
//! conversation.

use super::identifiers::{ConversationId, ToolName, ToolUseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope for a single sink event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Conversation this event belongs to
    pub conversation_id: ConversationId,
    /// Wall-clock time the event was emitted
    pub emitted_at: DateTime<Utc>,
    /// Event payload
    #[serde(flatten)]
    pub payload: SessionEventPayload,
}

impl SessionEvent {
    /// Create an event stamped with the current time
    pub fn now(conversation_id: ConversationId, payload: SessionEventPayload) -> Self {
        Self {
            conversation_id,
            emitted_at: Utc::now(),
            payload,
        }
    }
}

/// Payload of a sink event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventPayload {
    /// Incremental assistant text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// A thinking block opened
    ThinkingStart {
        /// Stream index for streamed blocks; `None` for finalized blocks
        #[serde(skip_serializing_if = "Option::is_none")]
        stream_index: Option<u64>,
    },
    /// Incremental thinking text
    ThinkingDelta {
        /// Thinking fragment
        thinking: String,
    },
    /// A tool invocation started
    ToolUseStart {
        /// Tool use ID
        tool_use_id: ToolUseId,
        /// Tool name
        name: ToolName,
        /// Input known at start time (may be incomplete while deltas stream)
        input: serde_json::Value,
        /// Stream index for streamed blocks; `None` for finalized blocks
        #[serde(skip_serializing_if = "Option::is_none")]
        stream_index: Option<u64>,
    },
    /// Partial JSON fragment of a tool input
    ToolInputDelta {
        /// Tool use the fragment belongs to
        tool_use_id: ToolUseId,
        /// Raw JSON fragment
        partial_json: String,
    },
    /// A streamed content block closed
    ContentBlockStop {
        /// Stream index of the closed block
        stream_index: u64,
        /// Tool use that occupied the index, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<ToolUseId>,
        /// Fully buffered tool input; `None` when absent or unparseable
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
    /// A tool result began
    ToolResultStart {
        /// Tool use the result answers
        tool_use_id: ToolUseId,
    },
    /// Tool result content chunk
    ToolResultDelta {
        /// Tool use the result answers
        tool_use_id: ToolUseId,
        /// Content chunk
        chunk: String,
    },
    /// A tool result finished
    ToolResultComplete {
        /// Tool use the result answers
        tool_use_id: ToolUseId,
        /// Whether the tool reported an error
        is_error: bool,
    },
    /// The provider issued or refreshed a resume token
    SessionUpdated {
        /// Opaque resume token
        provider_session_id: String,
    },
    /// The current turn completed normally
    MessageComplete {
        /// Whether the provider reported the turn as an error
        is_error: bool,
    },
    /// The response was stopped before completion (abort, reset, dispose)
    MessageStopped,
    /// The stream failed; the session is no longer producing output
    MessageError {
        /// Human-readable error text
        error: String,
    },
    /// A delimited sub-agent output span was extracted and stored
    SubagentStepComplete {
        /// Sub-agent identifier from the marker
        agent_id: String,
        /// Retrieval key issued by the output store
        artifact_key: String,
    },
}
