//! Retry policy and the pre-first-chunk retry wrapper.
//!
//! A provider call may only be retried while nothing from it has reached the
//! caller. The wrapper therefore pulls the first item of every attempt
//! itself: a failure up to and including that pull is classified and maybe
//! retried; once a chunk is in hand the attempt is committed and the stream
//! is handed back as a `PrimedStream`.

use llmloop_config::{BackoffKind, RetryConfig};
use llmloop_core::adapter::{ChunkReceiver, ProviderAdapter};
use llmloop_core::chunk::StreamChunk;
use llmloop_core::error::{EngineError, ProviderError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How the delay grows between consecutive retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Every retry waits `initial_delay`.
    Fixed,
    /// Retry `n` (0-based) waits `initial_delay * (n + 1)`.
    Linear,
    /// Retry `n` (0-based) waits `initial_delay * multiplier^n`.
    Exponential { multiplier: f64 },
}

/// When and how long to wait before re-issuing a failed provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff: Backoff,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            backoff: Backoff::Exponential { multiplier: 2.0 },
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    /// `max_retries` retries with exponential backoff starting at `initial_delay`.
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay before retry number `retry_index` (0 is the first retry).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let base = self.initial_delay;
        let delay = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Linear => base.saturating_mul(retry_index.saturating_add(1)),
            Backoff::Exponential { multiplier } => {
                let factor = multiplier.max(1.0).powi(retry_index.min(64) as i32);
                Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
            }
        };
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Linear => Backoff::Linear,
            BackoffKind::Exponential => Backoff::Exponential {
                multiplier: config.multiplier,
            },
        };
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff,
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }
}

/// A provider stream whose first chunk has already been pulled.
#[derive(Debug)]
pub struct PrimedStream {
    first: Option<StreamChunk>,
    rest: ChunkReceiver,
}

impl PrimedStream {
    fn new(first: StreamChunk, rest: ChunkReceiver) -> Self {
        Self {
            first: Some(first),
            rest,
        }
    }

    /// The next item: the primed chunk first, then the rest of the stream.
    pub async fn next(&mut self) -> Option<Result<StreamChunk, ProviderError>> {
        if let Some(first) = self.first.take() {
            return Some(Ok(first));
        }
        self.rest.recv().await
    }
}

/// Wraps one turn's provider call with the retry policy.
pub struct RetryWrapper<'a> {
    policy: &'a RetryPolicy,
    adapter: &'a dyn ProviderAdapter,
}

impl<'a> RetryWrapper<'a> {
    pub fn new(policy: &'a RetryPolicy, adapter: &'a dyn ProviderAdapter) -> Self {
        Self { policy, adapter }
    }

    /// Run `build_and_execute` until it yields a first chunk, retrying
    /// failures the adapter classifies as retryable while retries remain.
    pub async fn attempt<F, Fut>(&self, mut build_and_execute: F) -> Result<PrimedStream, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ChunkReceiver, ProviderError>>,
    {
        let mut retries = 0u32;
        loop {
            let failure = match build_and_execute().await {
                Ok(mut rx) => match rx.recv().await {
                    Some(Ok(first)) => return Ok(PrimedStream::new(first, rx)),
                    Some(Err(e)) => e,
                    None => ProviderError::StreamInterrupted(
                        "stream closed before producing any chunk".into(),
                    ),
                },
                Err(e) => e,
            };

            let classification = self.adapter.classify_error(&failure);
            if !classification.allows_retry() || retries >= self.policy.max_retries {
                return Err(EngineError::BadGateway {
                    attempts: retries + 1,
                    classification,
                });
            }

            let delay = self.policy.delay_for(retries);
            retries += 1;
            warn!(
                provider = %self.adapter.name(),
                attempt = retries + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                category = ?classification.category,
                error = %failure,
                "Provider call failed before streaming, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmloop_core::error::{ErrorCategory, ErrorClassification};
    use llmloop_providers::{ScriptedAdapter, ScriptedTurn};
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn run(policy: &RetryPolicy, adapter: &ScriptedAdapter) -> Result<PrimedStream, EngineError> {
        let wrapper = RetryWrapper::new(policy, adapter);
        let request = serde_json::json!({});
        wrapper
            .attempt(|| adapter.execute_stream_request(&request))
            .await
    }

    #[test]
    fn default_policy_never_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn backoff_shapes() {
        let base = Duration::from_millis(100);
        let fixed = RetryPolicy::new(5, base).with_backoff(Backoff::Fixed);
        assert_eq!(fixed.delay_for(3), base);

        let linear = RetryPolicy::new(5, base).with_backoff(Backoff::Linear);
        assert_eq!(linear.delay_for(0), Duration::from_millis(100));
        assert_eq!(linear.delay_for(2), Duration::from_millis(300));

        let exp = RetryPolicy::new(5, base);
        assert_eq!(exp.delay_for(0), Duration::from_millis(100));
        assert_eq!(exp.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn max_delay_caps_growth() {
        let policy = RetryPolicy::new(10, Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(8), Duration::from_secs(1));
        assert_eq!(
            RetryPolicy::new(10, Duration::from_secs(1)).delay_for(u32::MAX),
            Duration::MAX
        );
    }

    #[test]
    fn policy_from_config() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 200,
            backoff: BackoffKind::Linear,
            multiplier: 2.0,
            max_delay_ms: Some(500),
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff, Backoff::Linear);
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn first_chunk_is_replayed_by_primed_stream() {
        let adapter = ScriptedAdapter::new([ScriptedTurn::text("hello")]);
        let mut primed = run(&RetryPolicy::default(), &adapter).await.unwrap();
        assert_eq!(primed.next().await.unwrap().unwrap(), StreamChunk::text("hello"));
        assert!(primed.next().await.unwrap().unwrap().is_done());
        assert!(primed.next().await.is_none());
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let adapter = ScriptedAdapter::new([
            ScriptedTurn::FailBeforeStream(ProviderError::Network("reset".into())),
            ScriptedTurn::FailOnFirstPull(ProviderError::Timeout("slow".into())),
            ScriptedTurn::text("ok"),
        ]);
        let mut primed = run(&RetryPolicy::new(2, Duration::ZERO), &adapter).await.unwrap();
        assert_eq!(primed.next().await.unwrap().unwrap(), StreamChunk::text("ok"));
        assert_eq!(adapter.stream_calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_become_bad_gateway() {
        let adapter = ScriptedAdapter::new([ScriptedTurn::FailBeforeStream(
            ProviderError::Network("down".into()),
        )])
        .repeat_last(true);
        let err = run(&RetryPolicy::new(2, Duration::ZERO), &adapter).await.unwrap_err();
        assert_eq!(err.status(), 502);
        assert!(matches!(err, EngineError::BadGateway { attempts: 3, .. }));
        assert_eq!(adapter.stream_calls(), 3);
    }

    #[tokio::test]
    async fn unrecoverable_failures_are_not_retried() {
        let adapter = ScriptedAdapter::new([
            ScriptedTurn::FailBeforeStream(ProviderError::AuthenticationFailed("bad key".into())),
            ScriptedTurn::text("never reached"),
        ]);
        let err = run(&RetryPolicy::new(5, Duration::ZERO), &adapter).await.unwrap_err();
        assert_eq!(err.classification().category, ErrorCategory::Unrecoverable);
        assert_eq!(adapter.stream_calls(), 1);
    }

    #[tokio::test]
    async fn empty_stream_counts_as_pre_chunk_failure() {
        let adapter = ScriptedAdapter::new([ScriptedTurn::Chunks(vec![]), ScriptedTurn::text("ok")]);
        let mut primed = run(&RetryPolicy::new(1, Duration::ZERO), &adapter).await.unwrap();
        assert_eq!(primed.next().await.unwrap().unwrap(), StreamChunk::text("ok"));
        assert_eq!(adapter.stream_calls(), 2);
    }

    #[tokio::test]
    async fn classifier_decides_retry() {
        let adapter = ScriptedAdapter::new([
            ScriptedTurn::FailBeforeStream(ProviderError::Other("flaky".into())),
            ScriptedTurn::text("ok"),
        ])
        .with_classifier(|error| {
            ErrorClassification::new(error.clone(), ErrorCategory::Unknown, true)
        });
        assert!(run(&RetryPolicy::new(1, Duration::ZERO), &adapter).await.is_ok());
        assert_eq!(adapter.stream_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_backoff_between_attempts() {
        let adapter = ScriptedAdapter::new([
            ScriptedTurn::FailBeforeStream(ProviderError::Network("a".into())),
            ScriptedTurn::FailBeforeStream(ProviderError::Network("b".into())),
            ScriptedTurn::text("ok"),
        ]);
        let policy = RetryPolicy::new(2, Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        run(&policy, &adapter).await.unwrap();
        // 100ms + 200ms
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn build_failures_go_through_the_classifier() {
        let adapter = ScriptedAdapter::new([ScriptedTurn::text("ok")]);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let wrapper = RetryWrapper::new(&policy, &adapter);
        let builds = AtomicU32::new(0);
        let err = wrapper
            .attempt(|| {
                builds.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::InvalidRequest("no messages".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BadGateway { attempts: 1, .. }));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
