//! Provider adapter trait: the abstraction over LLM vendors.
//!
//! An adapter turns engine-neutral inputs into a vendor request, executes it
//! as a streaming call, and translates what comes back into `StreamChunk`s
//! and history items. The stream loop calls these methods without knowing
//! which vendor sits behind them.
//!
//! Vendor requests and vendor payloads are plain JSON values; only the
//! adapter that produced them interprets their shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::chunk::{StreamChunk, Usage};
use crate::error::{ErrorClassification, ProviderError};
use crate::history::HistoryItem;
use crate::tool::{ToolCallRecord, Toolkit};

/// A vendor-shaped request body.
pub type VendorRequest = serde_json::Value;

/// The receiving half of a provider stream.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// Output-shape descriptor for structured responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Schema name (some vendors require one)
    pub name: String,

    /// JSON Schema the response must conform to
    pub schema: serde_json::Value,

    /// Ask the vendor to enforce the schema strictly
    #[serde(default)]
    pub strict: bool,
}

impl OutputFormat {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
            strict: false,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Engine-neutral inputs for building one turn's request.
#[derive(Debug, Clone, Copy)]
pub struct RequestParams<'a> {
    /// Resolved model (explicit option, else the adapter default)
    pub model: &'a str,
    pub history: &'a [HistoryItem],
    pub system: Option<&'a str>,
    pub instructions: Option<&'a str>,
    /// Output of `format_tools`, when tools are configured
    pub tools: Option<&'a serde_json::Value>,
    /// Output of `format_output_schema`, when a format is configured
    pub output_schema: Option<&'a serde_json::Value>,
    /// Zero-based turn index
    pub turn: u32,
}

/// What one drained turn produced, in engine-neutral form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Concatenated text chunks
    pub text: String,

    /// Tool calls in emission order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,

    /// Usage recorded for this round-trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Model that served the turn
    pub model: String,
}

/// The result of running one tool call, as handed to `format_tool_result`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(serde_json::Value),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// The core ProviderAdapter trait.
///
/// Only `name`, `default_model`, `build_request` and
/// `execute_stream_request` are vendor-specific by necessity; everything
/// else has a neutral default that vendors override when their wire format
/// differs.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// A human-readable name (e.g. "anthropic"); recorded on usage entries.
    fn name(&self) -> &str;

    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &str;

    /// Build a vendor request from engine-neutral parameters.
    fn build_request(&self, params: &RequestParams<'_>) -> Result<VendorRequest, ProviderError>;

    /// Render a toolkit into the vendor's tool schema.
    fn format_tools(&self, toolkit: &Toolkit) -> serde_json::Value {
        serde_json::Value::Array(
            toolkit
                .definitions()
                .into_iter()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name,
                        "description": d.description,
                        "parameters": d.parameters,
                    })
                })
                .collect(),
        )
    }

    /// Render an output-shape descriptor into the vendor's schema form.
    fn format_output_schema(&self, format: &OutputFormat) -> serde_json::Value {
        serde_json::json!({
            "name": format.name,
            "schema": format.schema,
            "strict": format.strict,
        })
    }

    /// Execute the request as a streaming call.
    ///
    /// The stream may itself carry `Error`/`Done` chunks for failures the
    /// vendor reports in-band; transport failures surface as `Err` either
    /// here or as an item of the returned stream.
    async fn execute_stream_request(
        &self,
        request: &VendorRequest,
    ) -> Result<ChunkReceiver, ProviderError>;

    /// Classify a failure for retry decisions.
    fn classify_error(&self, error: &ProviderError) -> ErrorClassification {
        ErrorClassification::from_provider_error(error.clone())
    }

    /// The tool calls the loop must run before asking for the next turn.
    ///
    /// Must agree with [`ProviderAdapter::is_complete`]: a response is
    /// complete exactly when this returns nothing. Override both or neither.
    fn extract_tool_calls(&self, response: &ModelResponse) -> Vec<ToolCallRecord> {
        response.tool_calls.clone()
    }

    /// Render a tool outcome into the vendor's tool-result payload.
    fn format_tool_result(&self, call: &ToolCallRecord, outcome: &ToolOutcome) -> serde_json::Value {
        match outcome {
            ToolOutcome::Success(result) => serde_json::json!({
                "tool_call_id": call.id,
                "name": call.name,
                "content": result,
            }),
            ToolOutcome::Failure(reason) => serde_json::json!({
                "tool_call_id": call.id,
                "name": call.name,
                "error": reason,
            }),
        }
    }

    /// Append a tool-result payload to an already built request. Used by
    /// non-streaming helpers; the stream loop rebuilds each turn instead.
    fn append_tool_result(
        &self,
        mut request: VendorRequest,
        payload: serde_json::Value,
    ) -> VendorRequest {
        if let Some(messages) = request.get_mut("messages").and_then(|m| m.as_array_mut()) {
            messages.push(payload);
        } else if let Some(body) = request.as_object_mut() {
            body.insert("messages".into(), serde_json::Value::Array(vec![payload]));
        }
        request
    }

    /// Translate a turn's response into history items.
    fn response_to_history_items(&self, response: &ModelResponse) -> Vec<HistoryItem> {
        let mut items = Vec::with_capacity(response.tool_calls.len() + 1);
        if !response.text.is_empty() {
            items.push(HistoryItem::assistant(response.text.clone()));
        }
        items.extend(
            self.extract_tool_calls(response)
                .into_iter()
                .map(HistoryItem::ToolCall),
        );
        items
    }

    /// Whether the response is a final answer (no tool work requested).
    ///
    /// Returning `true` while [`ProviderAdapter::extract_tool_calls`] is
    /// non-empty ends the loop with those calls unanswered; returning `false`
    /// with no calls spends a turn without progress.
    fn is_complete(&self, response: &ModelResponse) -> bool {
        self.extract_tool_calls(response).is_empty()
    }
}
