//! Error types for the llmloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Adapter failures and
//! tool failures each get their own enum; `EngineError` is the only error
//! that ever escapes the stream loop as a thrown (non in-band) failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Bounded context errors ---

/// A failure observed while building or executing a provider request.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

// --- Classification ---

/// Coarse failure category reported by a provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transient: the same request may succeed later.
    Retryable,
    /// Permanent: retrying the same request cannot help.
    Unrecoverable,
    /// The adapter could not tell.
    Unknown,
}

/// The adapter's verdict on a single failure. Built fresh for every failure.
#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error: ProviderError,
    pub category: ErrorCategory,
    pub should_retry: bool,
}

impl ErrorClassification {
    pub fn new(error: ProviderError, category: ErrorCategory, should_retry: bool) -> Self {
        Self {
            error,
            category,
            should_retry,
        }
    }

    /// The standard classifier used by adapters that do not override
    /// `ProviderAdapter::classify_error`.
    pub fn from_provider_error(error: ProviderError) -> Self {
        let category = match &error {
            ProviderError::ApiError { status_code, .. } => match status_code {
                408 | 409 | 425 | 429 => ErrorCategory::Retryable,
                500..=599 => ErrorCategory::Retryable,
                _ => ErrorCategory::Unrecoverable,
            },
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::Network(_)
            | ProviderError::StreamInterrupted(_) => ErrorCategory::Retryable,
            ProviderError::AuthenticationFailed(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::NotConfigured(_)
            | ProviderError::InvalidRequest(_) => ErrorCategory::Unrecoverable,
            ProviderError::Other(_) => ErrorCategory::Unknown,
        };
        let should_retry = category == ErrorCategory::Retryable;
        Self::new(error, category, should_retry)
    }

    /// Whether a retry wrapper may re-issue the request.
    pub fn allows_retry(&self) -> bool {
        self.should_retry && self.category != ErrorCategory::Unrecoverable
    }
}

// --- Engine errors ---

/// The only failure that terminates a stream loop with a thrown error
/// instead of an in-band error chunk.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The provider call failed before producing any chunk and could not be
    /// retried (retries exhausted, or classified unrecoverable).
    #[error("Bad Gateway: provider request failed after {attempts} attempt(s): {}", classification.error)]
    BadGateway {
        attempts: u32,
        classification: ErrorClassification,
    },
}

impl EngineError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadGateway { .. } => 502,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::BadGateway { .. } => "Bad Gateway",
        }
    }

    /// The classification of the last underlying provider failure.
    pub fn classification(&self) -> &ErrorClassification {
        match self {
            Self::BadGateway { classification, .. } => classification,
        }
    }
}
