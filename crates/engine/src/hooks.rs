//! Caller-supplied lifecycle hooks.
//!
//! Hooks are side channels: whatever a hook does, including returning an
//! error or panicking, the chunk sequence the caller observes is the same as
//! without it. `HookDispatcher` is the only place hooks are invoked.

use async_trait::async_trait;
use futures::FutureExt;
use llmloop_core::adapter::ModelResponse;
use llmloop_core::history::HistoryItem;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Error type hooks may return. It is always discarded.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Fired before each turn's request is built.
#[derive(Debug)]
pub struct ModelRequestEvent<'a> {
    pub turn: u32,
    pub model: &'a str,
    pub history: &'a [HistoryItem],
}

/// Fired once a turn's provider stream has fully drained.
#[derive(Debug)]
pub struct ModelResponseEvent<'a> {
    pub turn: u32,
    pub response: &'a ModelResponse,
}

#[derive(Debug)]
pub struct ToolStartEvent<'a> {
    pub tool_name: &'a str,
    pub call_id: &'a str,
}

#[derive(Debug)]
pub struct ToolFinishEvent<'a> {
    pub tool_name: &'a str,
    pub call_id: &'a str,
    pub result: &'a serde_json::Value,
}

#[derive(Debug)]
pub struct ToolErrorEvent<'a> {
    pub tool_name: &'a str,
    pub call_id: &'a str,
    pub error: &'a str,
}

/// Lifecycle callbacks for one loop invocation. Every method defaults to a no-op.
#[async_trait]
pub trait LoopHooks: Send + Sync {
    async fn before_each_model_request(&self, _event: &ModelRequestEvent<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_each_model_response(&self, _event: &ModelResponseEvent<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_each_tool(&self, _event: &ToolStartEvent<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_each_tool(&self, _event: &ToolFinishEvent<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_tool_error(&self, _event: &ToolErrorEvent<'_>) -> Result<(), HookError> {
        Ok(())
    }
}

/// Invokes hooks with errors and panics contained.
#[derive(Clone, Default)]
pub(crate) struct HookDispatcher {
    hooks: Option<Arc<dyn LoopHooks>>,
}

async fn guarded<F>(call: F)
where
    F: Future<Output = Result<(), HookError>>,
{
    // Both an `Err` and a panic are dropped here.
    let _ = AssertUnwindSafe(call).catch_unwind().await;
}

impl HookDispatcher {
    pub(crate) fn new(hooks: Option<Arc<dyn LoopHooks>>) -> Self {
        Self { hooks }
    }

    pub(crate) async fn before_model_request(&self, event: &ModelRequestEvent<'_>) {
        if let Some(hooks) = &self.hooks {
            guarded(hooks.before_each_model_request(event)).await;
        }
    }

    pub(crate) async fn after_model_response(&self, event: &ModelResponseEvent<'_>) {
        if let Some(hooks) = &self.hooks {
            guarded(hooks.after_each_model_response(event)).await;
        }
    }

    pub(crate) async fn before_tool(&self, event: &ToolStartEvent<'_>) {
        if let Some(hooks) = &self.hooks {
            guarded(hooks.before_each_tool(event)).await;
        }
    }

    pub(crate) async fn after_tool(&self, event: &ToolFinishEvent<'_>) {
        if let Some(hooks) = &self.hooks {
            guarded(hooks.after_each_tool(event)).await;
        }
    }

    pub(crate) async fn tool_error(&self, event: &ToolErrorEvent<'_>) {
        if let Some(hooks) = &self.hooks {
            guarded(hooks.on_tool_error(event)).await;
        }
    }
}
