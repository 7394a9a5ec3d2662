//! Sandboxed executor for untrusted, dynamically supplied code.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use agentrun_core::{Task, TaskResult};

use super::script::{self, EvalLimits, ScriptError};
use super::{Executor, ExecutorError};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Runs `payload.code` inside the sandboxed interpreter.
///
/// This is the trust boundary for untrusted code: the interpreter exposes
/// the task payload as its only binding, refuses every call form, and is
/// bounded by a step budget plus a hard wall-clock timeout. Violations
/// fail the task; they never crash the host process.
pub struct SandboxedExecutor {
    timeout: Duration,
    limits: EvalLimits,
}

impl SandboxedExecutor {
    /// Create a sandbox with a custom wall-clock timeout.
    pub fn new(timeout: Duration, limits: EvalLimits) -> Self {
        Self { timeout, limits }
    }
}

impl Default for SandboxedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, EvalLimits::default())
    }
}

#[async_trait]
impl Executor for SandboxedExecutor {
    fn name(&self) -> &'static str {
        "sandboxed"
    }

    async fn execute(&self, task: &Task) -> Result<TaskResult, ExecutorError> {
        let Some(code) = task.payload.get("code").and_then(Value::as_str) else {
            return Ok(TaskResult::failure(
                "task payload has no code to execute",
            ));
        };

        let code = code.to_string();
        let payload = Value::Object(task.payload.clone());
        let limits = self.limits.clone();

        // The evaluator is CPU-bound; run it off the async runtime so the
        // wall-clock timeout can fire while it spins. The step budget
        // bounds the worker itself.
        let evaluation =
            tokio::task::spawn_blocking(move || script::evaluate(&code, &payload, &limits));

        let outcome = match tokio::time::timeout(self.timeout, evaluation).await {
            Err(_) => {
                warn!(task_id = %task.id, "Sandboxed code exceeded wall-clock timeout");
                return Ok(TaskResult::failure(format!(
                    "sandbox timed out after {} ms",
                    self.timeout.as_millis()
                )));
            }
            Ok(Err(join_error)) => {
                return Err(ExecutorError::Internal(format!(
                    "sandbox worker failed: {join_error}"
                )));
            }
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            Ok(value) => {
                info!(task_id = %task.id, "Sandboxed code evaluated");
                Ok(TaskResult::ok(value)
                    .with_logs(vec!["evaluated sandboxed expression".to_string()]))
            }
            Err(error @ ScriptError::Violation(_)) => {
                warn!(task_id = %task.id, error = %error, "Sandbox violation");
                Ok(TaskResult::failure(error.to_string()))
            }
            Err(error) => Ok(TaskResult::failure(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::TaskSpec;
    use serde_json::{json, Map};

    fn task_with(entries: &[(&str, Value)]) -> Task {
        let mut payload = Map::new();
        for (key, value) in entries {
            payload.insert(key.to_string(), value.clone());
        }
        Task::new(TaskSpec::new(payload))
    }

    #[tokio::test]
    async fn test_evaluates_payload_expression() {
        let executor = SandboxedExecutor::default();
        let task = task_with(&[("code", json!("payload.x + 1")), ("x", json!(1))]);

        let result = executor.execute(&task).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_host_module_access_fails_task() {
        let executor = SandboxedExecutor::default();
        let task = task_with(&[("code", json!("require('fs')"))]);

        let result = executor.execute(&task).await.unwrap();
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.message.contains("sandbox violation"));
    }

    #[tokio::test]
    async fn test_missing_code_fails_task() {
        let executor = SandboxedExecutor::default();
        let task = task_with(&[("x", json!(1))]);

        let result = executor.execute(&task).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_fails_task() {
        let executor = SandboxedExecutor::new(
            DEFAULT_TIMEOUT,
            EvalLimits {
                max_steps: 10,
                max_depth: 64,
            },
        );
        let task = task_with(&[("code", json!("1 + 1 + 1 + 1 + 1 + 1 + 1 + 1 + 1 + 1"))]);

        let result = executor.execute(&task).await.unwrap();
        assert!(!result.success);
    }
}
