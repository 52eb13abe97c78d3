//! The tool execution step: run one requested tool call.
//!
//! Every failure mode (no toolkit, unknown tool, bad arguments, the tool
//! returning an error, the tool panicking) becomes an in-band `Error` chunk
//! tied to the call id. Nothing here can fail the surrounding loop.

use crate::hooks::{HookDispatcher, ToolErrorEvent, ToolFinishEvent, ToolStartEvent};
use futures::FutureExt;
use llmloop_core::adapter::ToolOutcome;
use llmloop_core::chunk::{ChunkError, StreamChunk};
use llmloop_core::error::ToolError;
use llmloop_core::tool::{ToolCallRecord, Toolkit};
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// What running one tool call produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolExecution {
    /// `ToolResult` on success, `Error` with the call id on failure
    pub(crate) chunk: StreamChunk,
    pub(crate) outcome: ToolOutcome,
}

async fn run_tool(call: &ToolCallRecord, toolkit: Option<&Toolkit>) -> Result<serde_json::Value, String> {
    let tool = toolkit
        .and_then(|t| t.get(&call.name))
        .ok_or_else(|| ToolError::NotFound(call.name.clone()).to_string())?;
    let arguments = call.parse_arguments().map_err(|e| e.to_string())?;

    match AssertUnwindSafe(tool.call(arguments)).catch_unwind().await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "tool panicked".into());
            Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason,
            }
            .to_string())
        }
    }
}

/// Run `call` against `toolkit`, firing the tool hooks around it.
pub(crate) async fn execute_tool_call(
    call: &ToolCallRecord,
    toolkit: Option<&Toolkit>,
    hooks: &HookDispatcher,
) -> ToolExecution {
    hooks
        .before_tool(&ToolStartEvent {
            tool_name: &call.name,
            call_id: &call.id,
        })
        .await;

    debug!(tool = %call.name, call_id = %call.id, "Executing tool");

    match run_tool(call, toolkit).await {
        Ok(result) => {
            hooks
                .after_tool(&ToolFinishEvent {
                    tool_name: &call.name,
                    call_id: &call.id,
                    result: &result,
                })
                .await;
            ToolExecution {
                chunk: StreamChunk::ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    result: result.clone(),
                },
                outcome: ToolOutcome::Success(result),
            }
        }
        Err(error) => {
            warn!(tool = %call.name, call_id = %call.id, error = %error, "Tool execution failed");
            hooks
                .tool_error(&ToolErrorEvent {
                    tool_name: &call.name,
                    call_id: &call.id,
                    error: &error,
                })
                .await;
            ToolExecution {
                chunk: StreamChunk::Error {
                    id: Some(call.id.clone()),
                    error: ChunkError::bad_function_call(error.clone()),
                },
                outcome: ToolOutcome::Failure(error),
            }
        }
    }
}
