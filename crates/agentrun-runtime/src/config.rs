//! Runtime configuration.

use std::time::Duration;

use crate::breaker::BreakerConfig;

/// Which executor strategy the runtime is deployed with.
///
/// Selection happens once at construction time; tasks do not choose per
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    /// General-purpose executor; forwards `payload.llm` to the AI provider.
    #[default]
    Trusted,
    /// Isolated interpreter for untrusted `payload.code`.
    Sandboxed,
}

/// Runtime configuration, environment-driven.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Executor strategy.
    pub executor: ExecutorKind,

    /// AI provider base URL (OpenAI-style API surface).
    pub ai_provider_url: String,

    /// Optional bearer token for the AI provider.
    pub ai_provider_key: Option<String>,

    /// Database connection string. Its presence switches the persistence
    /// layer into durable mode.
    pub database_url: Option<String>,

    /// Whether to mirror bus events to a distributed transport.
    pub distributed_events: bool,

    /// Event bus buffer capacity.
    pub bus_capacity: usize,

    /// Circuit breaker tuning for the executor.
    pub breaker: BreakerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::Trusted,
            ai_provider_url: "https://api.openai.com/v1".to_string(),
            ai_provider_key: None,
            database_url: None,
            distributed_events: false,
            bus_capacity: 256,
            breaker: BreakerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `AGENTRUN_EXECUTOR` (`trusted` | `sandboxed`),
    /// `AI_PROVIDER_URL`, `AI_PROVIDER_KEY`, `DATABASE_URL`,
    /// `AGENTRUN_DISTRIBUTED_EVENTS`, `AGENTRUN_BREAKER_FAILURES`,
    /// `AGENTRUN_BREAKER_SUCCESSES`, `AGENTRUN_BREAKER_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let executor = match std::env::var("AGENTRUN_EXECUTOR").ok().as_deref() {
            Some("sandboxed") => ExecutorKind::Sandboxed,
            Some("trusted") | None => ExecutorKind::Trusted,
            Some(other) => {
                tracing::warn!(value = other, "Unknown AGENTRUN_EXECUTOR, using trusted");
                ExecutorKind::Trusted
            }
        };

        let breaker = BreakerConfig {
            failure_threshold: env_parse("AGENTRUN_BREAKER_FAILURES")
                .unwrap_or(defaults.breaker.failure_threshold),
            success_threshold: env_parse("AGENTRUN_BREAKER_SUCCESSES")
                .unwrap_or(defaults.breaker.success_threshold),
            open_timeout: env_parse("AGENTRUN_BREAKER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.breaker.open_timeout),
        };

        Self {
            executor,
            ai_provider_url: std::env::var("AI_PROVIDER_URL")
                .unwrap_or(defaults.ai_provider_url),
            ai_provider_key: std::env::var("AI_PROVIDER_KEY").ok(),
            database_url: std::env::var("DATABASE_URL").ok(),
            distributed_events: std::env::var("AGENTRUN_DISTRIBUTED_EVENTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            bus_capacity: defaults.bus_capacity,
            breaker,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
