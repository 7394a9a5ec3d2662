//! Result shape returned to callers of `execute_task`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of executing a task. `execute_task` always returns one of
/// these; every failure mode is captured here rather than propagated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the executor reported success.
    pub success: bool,

    /// Executor output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Log lines produced during execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,

    /// Failure description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskResult {
    /// A successful result carrying output.
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            logs: None,
            error: None,
        }
    }

    /// A failed result carrying an error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            logs: None,
            error: Some(TaskError::new(message)),
        }
    }

    /// Builder method to attach log lines.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Builder method to attach error detail (backtrace-like context).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        if let Some(error) = &mut self.error {
            error.detail = Some(detail.into());
        }
        self
    }
}

/// Error payload inside a failed `TaskResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    /// Human-readable failure message.
    pub message: String,

    /// Optional supporting detail (provider body, violation context).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TaskError {
    /// Create an error with a message and no detail.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }
}
