//! Provider event definitions
//!
//! Wire-shaped events yielded by a provider stream. One stream interleaves
//! incremental block deltas (correlated by stream index) with finalized
//! messages and a terminal result per turn.

use super::identifiers::{ToolName, ToolUseId};
use super::messages::{ContentBlock, ToolResultBlock};
use serde::{Deserialize, Serialize};

/// Block kind announced by a `block_start` event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamBlock {
    /// Plain text block; content follows as text deltas
    Text,
    /// Thinking block; content follows as thinking deltas
    Thinking,
    /// Tool invocation block; input may stream as partial JSON deltas
    ToolUse {
        /// Tool use ID
        id: ToolUseId,
        /// Tool name
        name: ToolName,
        /// Initial input (often empty until deltas arrive)
        input: serde_json::Value,
    },
}

/// Event yielded by a provider stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// Stream established; carries the provider's resume token
    SessionInit {
        /// Opaque token that can resume this conversation later
        provider_session_id: String,
    },
    /// A content block opened at a stream index
    BlockStart {
        /// Stream index the block occupies
        index: u64,
        /// Block kind and initial payload
        block: StreamBlock,
    },
    /// Incremental text for the block at `index`
    TextDelta {
        /// Stream index of the owning block
        index: u64,
        /// Text fragment
        text: String,
    },
    /// Incremental thinking text for the block at `index`
    ThinkingDelta {
        /// Stream index of the owning block
        index: u64,
        /// Thinking fragment
        thinking: String,
    },
    /// Partial JSON fragment of a tool input
    InputJsonDelta {
        /// Stream index of the owning tool use block
        index: u64,
        /// Raw JSON fragment; concatenation of all fragments parses
        partial_json: String,
    },
    /// The block at `index` closed
    BlockStop {
        /// Stream index of the closed block
        index: u64,
    },
    /// A finalized assistant message (complete content blocks)
    AssistantMessage {
        /// Finalized content blocks
        content: Vec<ContentBlock>,
    },
    /// Finalized tool results
    ToolResults {
        /// One entry per completed tool invocation
        results: Vec<ToolResultBlock>,
    },
    /// Terminal result for the current turn
    TurnComplete {
        /// Whether the turn ended in a provider-reported error
        is_error: bool,
        /// Number of conversation turns so far
        num_turns: u32,
    },
}
