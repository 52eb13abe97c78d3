//! The llmloop stream loop: a provider-agnostic, multi-turn conversation driver.
//!
//! Each invocation follows a **Request → Stream → Act** cycle:
//!
//! 1. **Request** a turn from the provider adapter (retried while nothing
//!    has been streamed yet)
//! 2. **Stream** the adapter's chunks to the caller as they arrive
//! 3. **If tool calls**: run each tool, stream its result, append to history,
//!    and go back to step 1
//! 4. **Otherwise**: emit `Done` with per-round-trip usage
//!
//! The loop ends on a final answer, on a mid-stream provider failure, or when
//! the turn budget runs out.

pub mod hooks;
pub mod options;
pub mod retry;
pub mod stream_loop;
pub mod transcript;

mod tool_exec;
mod usage;

pub use hooks::{
    HookError, LoopHooks, ModelRequestEvent, ModelResponseEvent, ToolErrorEvent, ToolFinishEvent,
    ToolStartEvent,
};
pub use options::RequestOptions;
pub use retry::{Backoff, PrimedStream, RetryPolicy, RetryWrapper};
pub use stream_loop::{ChunkStream, StreamLoop};
pub use transcript::Transcript;
