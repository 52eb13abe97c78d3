//! # llmloop Core
//!
//! Domain types, traits, and error definitions for the llmloop orchestration
//! engine. This crate holds no engine logic: it defines the vocabulary the
//! stream loop, provider adapters, and toolkits share.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the loop is a trait here. Implementations live in
//! their respective crates, so vendor adapters and tool sets can be swapped
//! or mocked without touching the engine.

pub mod adapter;
pub mod chunk;
pub mod error;
pub mod history;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use adapter::{
    ChunkReceiver, ModelResponse, OutputFormat, ProviderAdapter, RequestParams, ToolOutcome,
    VendorRequest,
};
pub use chunk::{ChunkError, StreamChunk, Usage};
pub use error::{
    EngineError, ErrorCategory, ErrorClassification, ProviderError, ToolError,
};
pub use history::{HistoryItem, Input, Message, Role, ToolResultItem};
pub use tool::{FnTool, Tool, ToolCallRecord, ToolDefinition, Toolkit};
