//! Per-invocation request options.

use crate::hooks::LoopHooks;
use crate::retry::RetryPolicy;
use llmloop_config::EngineConfig;
use llmloop_core::adapter::OutputFormat;
use llmloop_core::tool::Toolkit;
use std::sync::Arc;

/// Options for one `StreamLoop::execute` call. Immutable once the loop starts.
#[derive(Clone)]
pub struct RequestOptions {
    /// Model to request; the adapter's default when unset
    pub model: Option<String>,

    pub system: Option<String>,

    pub instructions: Option<String>,

    pub tools: Option<Arc<Toolkit>>,

    /// Structured output shape
    pub format: Option<OutputFormat>,

    /// Maximum number of model round-trips (at least 1)
    pub turns: u32,

    pub hooks: Option<Arc<dyn LoopHooks>>,

    pub retry_policy: RetryPolicy,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            model: None,
            system: None,
            instructions: None,
            tools: None,
            format: None,
            turns: 1,
            hooks: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed turn budget, model and retry policy from configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            turns: config.default_turns.max(1),
            retry_policy: RetryPolicy::from(&config.retry),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: impl Into<Arc<Toolkit>>) -> Self {
        self.tools = Some(tools.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the turn budget. Zero is treated as one.
    pub fn with_turns(mut self, turns: u32) -> Self {
        self.turns = turns.max(1);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LoopHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("model", &self.model)
            .field("system", &self.system)
            .field("instructions", &self.instructions)
            .field("tools", &self.tools.as_ref().map(|t| t.names()))
            .field("format", &self.format)
            .field("turns", &self.turns)
            .field("hooks", &self.hooks.is_some())
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmloop_config::RetryConfig;
    use std::time::Duration;

    #[test]
    fn defaults_to_one_turn_without_retries() {
        let options = RequestOptions::new();
        assert_eq!(options.turns, 1);
        assert_eq!(options.retry_policy.max_retries, 0);
        assert!(options.model.is_none());
        assert!(options.tools.is_none());
    }

    #[test]
    fn zero_turns_clamped() {
        assert_eq!(RequestOptions::new().with_turns(0).turns, 1);
        assert_eq!(RequestOptions::new().with_turns(7).turns, 7);
    }

    #[test]
    fn builder_sets_fields() {
        let options = RequestOptions::new()
            .with_model("m-2")
            .with_system("sys")
            .with_instructions("be terse")
            .with_tools(Toolkit::new())
            .with_format(OutputFormat::new("answer", serde_json::json!({"type": "object"})))
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));
        assert_eq!(options.model.as_deref(), Some("m-2"));
        assert_eq!(options.system.as_deref(), Some("sys"));
        assert_eq!(options.instructions.as_deref(), Some("be terse"));
        assert!(options.tools.is_some());
        assert_eq!(options.format.as_ref().map(|f| f.name.as_str()), Some("answer"));
        assert_eq!(options.retry_policy.max_retries, 2);
    }

    #[test]
    fn from_config_seeds_budget_model_and_retries() {
        let config = EngineConfig {
            default_turns: 4,
            default_model: Some("cfg-model".into()),
            retry: RetryConfig {
                max_retries: 3,
                initial_delay_ms: 50,
                ..RetryConfig::default()
            },
        };
        let options = RequestOptions::from_config(&config);
        assert_eq!(options.turns, 4);
        assert_eq!(options.model.as_deref(), Some("cfg-model"));
        assert_eq!(options.retry_policy.max_retries, 3);
        assert_eq!(options.retry_policy.initial_delay, Duration::from_millis(50));
    }

    #[test]
    fn debug_lists_tool_names() {
        let rendered = format!("{:?}", RequestOptions::new().with_turns(2));
        assert!(rendered.contains("turns: 2"));
        assert!(rendered.contains("hooks: false"));
    }
}
