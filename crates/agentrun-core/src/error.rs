//! Core domain errors.

use crate::TaskId;
use thiserror::Error;

/// Domain errors for the agentrun runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Operation not valid for the task's current status.
    #[error("Invalid state for task {task_id}: {actual} (expected {expected})")]
    InvalidState {
        task_id: TaskId,
        expected: String,
        actual: String,
    },

    /// Circuit breaker rejected the call before the executor ran.
    #[error("Circuit breaker open for service: {0}")]
    CircuitOpen(String),

    /// Executor infrastructure failure.
    #[error("Executor error: {0}")]
    Executor(String),

    /// Untrusted code attempted a forbidden operation.
    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),

    /// Agent not found in the collaboration registry.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Persistence layer failure.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl RuntimeError {
    /// Convenience constructor for resume-style state guards.
    pub fn invalid_state(task_id: TaskId, expected: &str, actual: impl ToString) -> Self {
        Self::InvalidState {
            task_id,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RuntimeError::TaskNotFound(TaskId::new("t-1"));
        assert_eq!(err.to_string(), "Task not found: t-1");

        let err = RuntimeError::invalid_state(TaskId::new("t-2"), "paused", "pending");
        assert_eq!(
            err.to_string(),
            "Invalid state for task t-2: pending (expected paused)"
        );
    }
}
