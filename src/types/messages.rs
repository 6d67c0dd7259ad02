//! Message-related type definitions
//!
//! This module contains types for user-authored messages and the finalized
//! content blocks carried by provider events.

use super::identifiers::{ToolName, ToolUseId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Message Types
// ============================================================================

/// A user-authored message queued for forwarding to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    /// Message text
    pub content: String,
}

impl UserMessage {
    /// Create a new user message
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl From<String> for UserMessage {
    fn from(s: String) -> Self {
        Self { content: s }
    }
}

impl From<&str> for UserMessage {
    fn from(s: &str) -> Self {
        Self {
            content: s.to_string(),
        }
    }
}

/// Content value for tool results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    /// String content
    String(String),
    /// Structured content blocks
    Blocks(Vec<serde_json::Value>),
}

/// Finalized content block inside an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block
    Text {
        /// Text content
        text: String,
    },
    /// Thinking content block (extended thinking)
    Thinking {
        /// Thinking content
        thinking: String,
        /// Signature for verification
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: ToolUseId,
        /// Tool name
        name: ToolName,
        /// Tool input parameters
        input: serde_json::Value,
    },
}

/// Tool execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// ID of the tool use this is a result for
    pub tool_use_id: ToolUseId,
    /// Result content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentValue>,
    /// Whether this is an error result
    #[serde(default)]
    pub is_error: bool,
}
