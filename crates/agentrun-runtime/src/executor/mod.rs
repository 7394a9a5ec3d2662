//! Executor strategies: turn a Task's payload into a result.
//!
//! The runtime invokes exactly one executor, selected at construction
//! time. An executor distinguishes two failure planes:
//!
//! - `Ok(TaskResult { success: false, .. })`: a business failure (bad
//!   code, sandbox violation, missing input). Reported to the caller,
//!   ignored by the circuit breaker.
//! - `Err(ExecutorError)`: an infrastructure failure (provider
//!   unreachable, malformed response). The breaker counts these.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use agentrun_core::{Task, TaskResult};

use crate::config::{ExecutorKind, RuntimeConfig};

mod sandbox;
mod script;
mod trusted;

pub use sandbox::SandboxedExecutor;
pub use script::{EvalLimits, ScriptError};
pub use trusted::TrustedExecutor;

/// Infrastructure-level executor failures.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The AI provider call failed (network, HTTP status, or parse).
    #[error("AI provider request failed: {0}")]
    Provider(String),

    /// The executor broke internally.
    #[error("Executor internal error: {0}")]
    Internal(String),
}

/// Strategy turning a Task's payload into a result.
///
/// Implementations must never block indefinitely; any timeout belongs to
/// the executor itself.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Run one task to completion.
    async fn execute(&self, task: &Task) -> Result<TaskResult, ExecutorError>;
}

/// Build the configured executor strategy.
pub fn from_config(config: &RuntimeConfig) -> Arc<dyn Executor> {
    match config.executor {
        ExecutorKind::Trusted => Arc::new(TrustedExecutor::new(
            &config.ai_provider_url,
            config.ai_provider_key.clone(),
        )),
        ExecutorKind::Sandboxed => Arc::new(SandboxedExecutor::default()),
    }
}
