//! Provider adapter implementations for llmloop.
//!
//! All adapters implement the `llmloop_core::ProviderAdapter` trait. Vendor
//! adapters live with their owners; this crate ships the adapters the engine
//! itself relies on for testing and demos.

pub mod scripted;

pub use scripted::{ScriptedAdapter, ScriptedTurn};
