//! Status enums for Tasks, Executions, and Agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a Task in the runtime.
///
/// Tasks move `pending -> in-progress -> {completed, failed}`, with
/// `cancelled` reachable from any non-terminal state and `paused` a
/// resumable detour from `in-progress`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Task created but not yet handed to an executor.
    #[default]
    Pending,
    /// Task is actively executing.
    InProgress,
    /// Task completed successfully.
    Completed,
    /// Task failed (executor error or circuit rejection).
    Failed,
    /// Task was cancelled by the caller.
    Cancelled,
    /// Task was paused; may be resumed back to in-progress.
    Paused,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        }
    }

    /// Parse a wire representation back into a status.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a durable Execution record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    /// Execution attempt is in flight.
    #[default]
    Running,
    /// Execution attempt finished successfully.
    Completed,
    /// Execution attempt failed.
    Failed,
}

impl ExecutionStatus {
    /// Returns true if the execution has settled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a wire representation back into a status.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Availability of a collaborating agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentAvailability {
    /// Agent is registered and has no active tasks.
    #[default]
    Idle,
    /// Agent has at least one active task.
    Busy,
    /// Agent has been marked unavailable.
    Offline,
}

impl AgentAvailability {
    /// Returns true if the agent can take on work.
    pub fn can_accept_tasks(&self) -> bool {
        matches!(self, Self::Idle | Self::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn test_wire_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::Paused,
        ] {
            assert_eq!(TaskStatus::from_wire(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_wire("bogus"), None);
    }

    #[test]
    fn test_serde_wire_form() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let back: TaskStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(back, TaskStatus::Paused);
    }
}
