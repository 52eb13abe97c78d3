//! The streaming turn loop.
//!
//! `execute` returns a lazy stream: nothing happens until the caller polls
//! it, and after every yielded chunk the loop is parked until the next poll.
//! A provider request, a hook or a tool only runs when the caller asks for
//! output that depends on it. Dropping the stream drops the loop with it.

use crate::hooks::{HookDispatcher, ModelRequestEvent, ModelResponseEvent};
use crate::options::RequestOptions;
use crate::retry::RetryWrapper;
use crate::tool_exec::execute_tool_call;
use crate::usage::UsageLedger;
use async_stream::stream;
use futures::Stream;
use llmloop_core::adapter::{ChunkReceiver, ModelResponse, ProviderAdapter, RequestParams};
use llmloop_core::chunk::{ChunkError, StreamChunk};
use llmloop_core::error::{EngineError, ProviderError};
use llmloop_core::history::{HistoryItem, Input, ToolResultItem};
use llmloop_core::tool::ToolCallRecord;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The caller's view of one invocation.
///
/// Yields `Ok` chunks ending in exactly one `Done`, or a single `Err` when
/// the provider could not be reached at all.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, EngineError>> + Send>>;

/// Drives a provider adapter through a multi-turn, tool-using conversation.
#[derive(Clone)]
pub struct StreamLoop {
    adapter: Arc<dyn ProviderAdapter>,
}

impl StreamLoop {
    pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self { adapter }
    }

    /// Describe an invocation. Work starts on the first poll.
    pub fn execute(&self, input: impl Into<Input>, options: RequestOptions) -> ChunkStream {
        run(
            Arc::clone(&self.adapter),
            input.into().into_history(),
            options,
        )
    }
}

async fn open_stream(
    adapter: &dyn ProviderAdapter,
    params: RequestParams<'_>,
) -> Result<ChunkReceiver, ProviderError> {
    let request = adapter.build_request(&params)?;
    adapter.execute_stream_request(&request).await
}

fn done_chunk(ledger: &UsageLedger) -> StreamChunk {
    info!(round_trips = ledger.len(), "Stream loop finished");
    StreamChunk::done(ledger.snapshot())
}

fn run(
    adapter: Arc<dyn ProviderAdapter>,
    history: Vec<HistoryItem>,
    options: RequestOptions,
) -> ChunkStream {
    Box::pin(stream! {
        let mut history = history;
        let adapter = adapter.as_ref();
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| adapter.default_model().to_string());
        let tools_schema = options.tools.as_deref().map(|t| adapter.format_tools(t));
        let output_schema = options.format.as_ref().map(|f| adapter.format_output_schema(f));
        let hooks = HookDispatcher::new(options.hooks.clone());
        let wrapper = RetryWrapper::new(&options.retry_policy, adapter);
        let mut ledger = UsageLedger::new();
        let mut turn = 0u32;

        info!(
            provider = %adapter.name(),
            model = %model,
            turns = options.turns,
            "Stream loop starting"
        );

        while turn < options.turns {
            hooks
                .before_model_request(&ModelRequestEvent {
                    turn,
                    model: &model,
                    history: &history,
                })
                .await;
            debug!(turn, model = %model, history_len = history.len(), "Requesting model turn");

            let attempt = wrapper
                .attempt(|| {
                    let params = RequestParams {
                        model: &model,
                        history: &history,
                        system: options.system.as_deref(),
                        instructions: options.instructions.as_deref(),
                        tools: tools_schema.as_ref(),
                        output_schema: output_schema.as_ref(),
                        turn,
                    };
                    open_stream(adapter, params)
                })
                .await;

            let mut provider_stream = match attempt {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(turn, provider = %adapter.name(), error = %error, "Provider unavailable");
                    yield Err(error);
                    return;
                }
            };

            let mut text = String::new();
            let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
            let end = loop {
                let chunk = match provider_stream.next().await {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => break Err(e.to_string()),
                    None => break Err("provider stream closed before completion".to_string()),
                };
                match chunk {
                    StreamChunk::Done { usage } => break Ok(usage),
                    StreamChunk::Text { ref content } => text.push_str(content),
                    StreamChunk::ToolCall {
                        ref id,
                        ref name,
                        ref arguments,
                    } => tool_calls.push(ToolCallRecord::new(id.clone(), name.clone(), arguments.clone())),
                    StreamChunk::ToolResult { .. } | StreamChunk::Error { .. } => {}
                }
                yield Ok(chunk);
            };
            drop(provider_stream);

            let reported = match end {
                Ok(usage) => usage,
                Err(reason) => {
                    warn!(
                        turn,
                        provider = %adapter.name(),
                        error = %reason,
                        abandoned_tool_calls = tool_calls.len(),
                        "Provider stream failed mid-turn"
                    );
                    for call in &tool_calls {
                        yield Ok(StreamChunk::Error {
                            id: Some(call.id.clone()),
                            error: ChunkError::stream_error(format!(
                                "tool call '{}' abandoned: provider stream failed before the turn completed",
                                call.name
                            )),
                        });
                    }
                    yield Ok(StreamChunk::error(ChunkError::stream_error(reason)));
                    yield Ok(done_chunk(&ledger));
                    return;
                }
            };

            let usage = ledger.record(reported, adapter.name(), &model);
            let response = ModelResponse {
                text,
                tool_calls,
                usage: Some(usage),
                model: model.clone(),
            };
            hooks
                .after_model_response(&ModelResponseEvent {
                    turn,
                    response: &response,
                })
                .await;
            history.extend(adapter.response_to_history_items(&response));

            if adapter.is_complete(&response) {
                yield Ok(done_chunk(&ledger));
                return;
            }

            let calls = adapter.extract_tool_calls(&response);
            debug!(turn, tool_calls = calls.len(), "Running requested tools");
            for call in &calls {
                let execution = execute_tool_call(call, options.tools.as_deref(), &hooks).await;
                history.push(HistoryItem::ToolResult(ToolResultItem {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    payload: adapter.format_tool_result(call, &execution.outcome),
                    is_error: execution.outcome.is_error(),
                }));
                yield Ok(execution.chunk);
            }
            turn += 1;
        }

        warn!(turns = options.turns, "Turn budget exhausted with tool work outstanding");
        yield Ok(StreamChunk::error(ChunkError::too_many_requests(format!(
            "turn budget of {} exhausted before the model produced a final answer",
            options.turns
        ))));
        yield Ok(done_chunk(&ledger));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmloop_providers::{ScriptedAdapter, ScriptedTurn};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn model_defaults_to_adapter_default() {
        let adapter = Arc::new(
            ScriptedAdapter::new([ScriptedTurn::text("hi")]).with_default_model("house-model"),
        );
        let engine = StreamLoop::new(adapter.clone());
        let chunks: Vec<_> = engine.execute("hello", RequestOptions::new()).collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(adapter.requests()[0]["model"], "house-model");
    }

    #[tokio::test]
    async fn explicit_model_wins() {
        let adapter = Arc::new(ScriptedAdapter::new([ScriptedTurn::text("hi")]));
        let engine = StreamLoop::new(adapter.clone());
        let _: Vec<_> = engine
            .execute("hello", RequestOptions::new().with_model("other"))
            .collect()
            .await;
        assert_eq!(adapter.requests()[0]["model"], "other");
    }

    #[tokio::test]
    async fn unpolled_stream_never_contacts_the_provider() {
        let adapter = Arc::new(ScriptedAdapter::new([ScriptedTurn::text("hi")]));
        let engine = StreamLoop::new(adapter.clone());
        let stream = engine.execute("hello", RequestOptions::new());
        tokio::task::yield_now().await;
        assert_eq!(adapter.stream_calls(), 0);
        drop(stream);
        assert_eq!(adapter.stream_calls(), 0);
    }

    #[tokio::test]
    async fn dropping_the_stream_ends_the_loop() {
        let adapter = Arc::new(
            ScriptedAdapter::new([ScriptedTurn::tool_calls([("c1", "noop", "{}")])])
                .repeat_last(true),
        );
        let engine = StreamLoop::new(adapter.clone());
        let mut stream = engine.execute("go", RequestOptions::new().with_turns(50));
        assert!(matches!(
            stream.next().await,
            Some(Ok(StreamChunk::ToolCall { .. }))
        ));
        drop(stream);

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(adapter.stream_calls(), 1);
    }
}
