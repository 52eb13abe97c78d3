//! Conversation history domain types.
//!
//! A history is an ordered list of heterogeneous items replayed to the
//! provider verbatim on every turn. The engine only ever appends to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolCallRecord;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// System instructions
    System,
}

/// A single text message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}

/// The outcome of a tool call as it is recorded in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultItem {
    /// The tool call this result answers
    pub call_id: String,

    /// Name of the tool that ran
    pub name: String,

    /// Adapter-formatted payload (see `ProviderAdapter::format_tool_result`)
    pub payload: serde_json::Value,

    /// Whether the call failed
    #[serde(default)]
    pub is_error: bool,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryItem {
    Message(Message),
    ToolCall(ToolCallRecord),
    ToolResult(ToolResultItem),
    Reasoning { content: String },
}

impl HistoryItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self::Message(Message::user(content))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Message(Message::assistant(content))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::Message(Message::system(content))
    }
}

/// What a caller hands to the stream loop: a single user message or a full
/// history to start from.
#[derive(Debug, Clone)]
pub enum Input {
    Message(String),
    History(Vec<HistoryItem>),
}

impl Input {
    /// Normalize into the history the first turn is built from.
    pub fn into_history(self) -> Vec<HistoryItem> {
        match self {
            Self::Message(text) => vec![HistoryItem::user(text)],
            Self::History(items) => items,
        }
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Message(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Message(text)
    }
}

impl From<Vec<HistoryItem>> for Input {
    fn from(items: Vec<HistoryItem>) -> Self {
        Self::History(items)
    }
}
