//! Stream chunks and token usage.
//!
//! `StreamChunk` is the unit of output of both a provider adapter's stream
//! and the engine's stream loop. It serializes with a `type` tag so it can be
//! forwarded over SSE or WebSocket frames unchanged.

use serde::{Deserialize, Serialize};

/// One unit of a streamed model conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Partial text from the model.
    Text { content: String },

    /// The model requested a tool. `arguments` is the provider-encoded JSON text.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// A tool finished; `id` matches the originating `ToolCall`.
    ToolResult {
        id: String,
        name: String,
        result: serde_json::Value,
    },

    /// An in-band failure. `id` is set when the failure belongs to a tool call.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        error: ChunkError,
    },

    /// Terminal chunk carrying one usage entry per model round-trip.
    Done { usage: Vec<Usage> },
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn error(error: ChunkError) -> Self {
        Self::Error { id: None, error }
    }

    pub fn done(usage: Vec<Usage>) -> Self {
        Self::Done { usage }
    }

    /// Event name for this chunk type.
    pub fn chunk_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// HTTP-flavoured error payload carried by `StreamChunk::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkError {
    pub status: u16,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChunkError {
    pub fn new(status: u16, title: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status,
            title: title.into(),
            detail,
        }
    }

    /// The provider stream broke after output was already delivered.
    pub fn stream_error(detail: impl Into<String>) -> Self {
        Self::new(502, "Stream Error", Some(detail.into()))
    }

    /// A tool could not be resolved, its arguments were invalid, or it failed.
    pub fn bad_function_call(detail: impl Into<String>) -> Self {
        Self::new(400, "Bad Function Call", Some(detail.into()))
    }

    /// The turn budget ran out while the model still wanted tools.
    pub fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::new(429, "Too Many Requests", Some(detail.into()))
    }
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} {}: {}", self.status, self.title, detail),
            None => write!(f, "{} {}", self.status, self.title),
        }
    }
}

/// Token accounting for one model round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    #[serde(default)]
    pub reasoning: u64,
    pub total: u64,
    pub provider: String,
    pub model: String,
}

impl Usage {
    /// A zeroed entry for a round-trip whose provider reported nothing.
    pub fn empty(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Add another entry's counters to this one. Provider and model of
    /// `self` are kept unless empty.
    pub fn merge(&mut self, other: &Usage) {
        self.input += other.input;
        self.output += other.output;
        self.reasoning += other.reasoning;
        self.total += other.total;
        if self.provider.is_empty() {
            self.provider = other.provider.clone();
        }
        if self.model.is_empty() {
            self.model = other.model.clone();
        }
    }

    /// Totals across entries, e.g. all round-trips of one invocation.
    pub fn sum<'a>(entries: impl IntoIterator<Item = &'a Usage>) -> Usage {
        let mut total = Usage::default();
        for entry in entries {
            total.merge(entry);
        }
        total
    }
}
