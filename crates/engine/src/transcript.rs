//! Collects a whole chunk stream for callers that do not need incremental output.

use llmloop_core::chunk::{ChunkError, StreamChunk, Usage};
use llmloop_core::error::EngineError;
use llmloop_core::tool::ToolCallRecord;
use tokio_stream::{Stream, StreamExt};

/// Every chunk of one invocation, in order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    chunks: Vec<StreamChunk>,
}

impl Transcript {
    /// Drain `stream`, stopping at the first `EngineError`.
    pub async fn collect<S>(mut stream: S) -> Result<Self, EngineError>
    where
        S: Stream<Item = Result<StreamChunk, EngineError>> + Unpin,
    {
        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item?);
        }
        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[StreamChunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<StreamChunk> {
        self.chunks
    }

    /// All text chunks concatenated.
    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                StreamChunk::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<ToolCallRecord> {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                StreamChunk::ToolCall { id, name, arguments } => {
                    Some(ToolCallRecord::new(id.clone(), name.clone(), arguments.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// `(call id, tool name, result)` for every successful tool call.
    pub fn tool_results(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                StreamChunk::ToolResult { id, name, result } => {
                    Some((id.as_str(), name.as_str(), result))
                }
                _ => None,
            })
            .collect()
    }

    /// In-band errors with the tool call id they belong to, if any.
    pub fn errors(&self) -> Vec<(Option<&str>, &ChunkError)> {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                StreamChunk::Error { id, error } => Some((id.as_deref(), error)),
                _ => None,
            })
            .collect()
    }

    /// Usage from the final `Done`; empty when the stream never finished.
    pub fn usage(&self) -> &[Usage] {
        match self.chunks.last() {
            Some(StreamChunk::Done { usage }) => usage,
            _ => &[],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.last().is_some_and(StreamChunk::is_done)
    }
}
