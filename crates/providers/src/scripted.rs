//! Scripted adapter: replays a fixed sequence of turns.
//!
//! Each call to `execute_stream_request` consumes the next `ScriptedTurn`.
//! Turns can stream chunks, fail before streaming, fail on the first pull,
//! or fail part-way through, which covers every branch of the stream loop's
//! failure handling without a network.

use async_trait::async_trait;
use llmloop_core::adapter::{ChunkReceiver, ProviderAdapter, RequestParams, VendorRequest};
use llmloop_core::chunk::{StreamChunk, Usage};
use llmloop_core::error::{ErrorClassification, ProviderError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

const SCRIPTED_NAME: &str = "scripted";
const SCRIPTED_MODEL: &str = "scripted-1";

/// One scripted model round-trip.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Stream these chunks, then close.
    Chunks(Vec<StreamChunk>),
    /// `execute_stream_request` itself fails.
    FailBeforeStream(ProviderError),
    /// The call succeeds but the first pull yields this error.
    FailOnFirstPull(ProviderError),
    /// Stream `chunks`, then fail with `error`.
    FailAfter {
        chunks: Vec<StreamChunk>,
        error: ProviderError,
    },
}

impl ScriptedTurn {
    /// A final answer: one text chunk and a `Done` with usage.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Chunks(vec![
            StreamChunk::text(content),
            StreamChunk::done(vec![scripted_usage()]),
        ])
    }

    /// A turn that asks for tools: one `ToolCall` per `(id, name, arguments)`.
    pub fn tool_calls<I, S>(calls: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let mut chunks: Vec<StreamChunk> = calls
            .into_iter()
            .map(|(id, name, arguments)| StreamChunk::tool_call(id, name, arguments))
            .collect();
        chunks.push(StreamChunk::done(vec![scripted_usage()]));
        Self::Chunks(chunks)
    }
}

/// The usage entry every scripted `Done` carries.
pub fn scripted_usage() -> Usage {
    Usage {
        input: 10,
        output: 5,
        reasoning: 0,
        total: 15,
        provider: SCRIPTED_NAME.into(),
        model: SCRIPTED_MODEL.into(),
    }
}

type Classifier = Box<dyn Fn(&ProviderError) -> ErrorClassification + Send + Sync>;

/// A `ProviderAdapter` that replays scripted turns and records what it was sent.
pub struct ScriptedAdapter {
    name: String,
    default_model: String,
    script: Mutex<VecDeque<ScriptedTurn>>,
    last: Mutex<Option<ScriptedTurn>>,
    repeat_last: bool,
    requests: Mutex<Vec<VendorRequest>>,
    stream_calls: AtomicUsize,
    classifier: Option<Classifier>,
}

impl ScriptedAdapter {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            name: SCRIPTED_NAME.into(),
            default_model: SCRIPTED_MODEL.into(),
            script: Mutex::new(turns.into_iter().collect()),
            last: Mutex::new(None),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
            stream_calls: AtomicUsize::new(0),
            classifier: None,
        }
    }

    /// Keep replaying the final turn once the script runs out.
    pub fn repeat_last(mut self, enabled: bool) -> Self {
        self.repeat_last = enabled;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Replace the standard error classifier.
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&ProviderError) -> ErrorClassification + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    /// Number of `execute_stream_request` calls so far.
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Every request passed to `execute_stream_request`, in call order.
    pub fn requests(&self) -> Vec<VendorRequest> {
        lock(&self.requests).clone()
    }

    fn next_turn(&self) -> Option<ScriptedTurn> {
        let next = lock(&self.script).pop_front();
        match next {
            Some(turn) => {
                *lock(&self.last) = Some(turn.clone());
                Some(turn)
            }
            None if self.repeat_last => lock(&self.last).clone(),
            None => None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn replay(
    chunks: Vec<StreamChunk>,
    trailing_error: Option<ProviderError>,
) -> ChunkReceiver {
    let (tx, rx) = mpsc::channel(chunks.len() + 1);
    for chunk in chunks {
        let _ = tx.send(Ok(chunk)).await;
    }
    if let Some(error) = trailing_error {
        let _ = tx.send(Err(error)).await;
    }
    rx
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn build_request(&self, params: &RequestParams<'_>) -> Result<VendorRequest, ProviderError> {
        let messages = serde_json::to_value(params.history)
            .map_err(|e| ProviderError::InvalidRequest(format!("history: {e}")))?;
        Ok(serde_json::json!({
            "model": params.model,
            "turn": params.turn,
            "system": params.system,
            "instructions": params.instructions,
            "messages": messages,
            "tools": params.tools,
            "response_format": params.output_schema,
        }))
    }

    async fn execute_stream_request(
        &self,
        request: &VendorRequest,
    ) -> Result<ChunkReceiver, ProviderError> {
        let call = self.stream_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.requests).push(request.clone());

        let turn = self
            .next_turn()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;
        debug!(call, "Scripted adapter replaying turn");

        match turn {
            ScriptedTurn::Chunks(chunks) => Ok(replay(chunks, None).await),
            ScriptedTurn::FailBeforeStream(error) => Err(error),
            ScriptedTurn::FailOnFirstPull(error) => Ok(replay(Vec::new(), Some(error)).await),
            ScriptedTurn::FailAfter { chunks, error } => Ok(replay(chunks, Some(error)).await),
        }
    }

    fn classify_error(&self, error: &ProviderError) -> ErrorClassification {
        match &self.classifier {
            Some(classify) => classify(error),
            None => ErrorClassification::from_provider_error(error.clone()),
        }
    }
}
