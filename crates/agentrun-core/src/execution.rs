//! Durable record of one attempt to run a Task.

use crate::{ExecutionId, ExecutionStatus, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attempt to run a Task. Recorded only when a database is configured;
/// a Task may accumulate more than one Execution if resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution identifier.
    pub id: ExecutionId,

    /// Task this execution belongs to (weak reference by id).
    pub task_id: TaskId,

    /// Current execution status.
    pub status: ExecutionStatus,

    /// Ordered log lines, append-only while running.
    pub logs: Vec<String>,

    /// Opaque result payload, written once on terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// When the attempt started.
    pub started_at: DateTime<Utc>,

    /// When the attempt settled, if terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a new running Execution for a task.
    pub fn new(task_id: TaskId) -> Self {
        Self {
            id: ExecutionId::generate(),
            task_id,
            status: ExecutionStatus::Running,
            logs: Vec::new(),
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a log line.
    pub fn append_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Settle the execution with a terminal status and optional result.
    pub fn finish(&mut self, status: ExecutionStatus, result: Option<Value>) {
        self.status = status;
        self.result = result;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the execution as completed.
    pub fn complete(&mut self, result: Option<Value>) {
        self.finish(ExecutionStatus::Completed, result);
    }

    /// Mark the execution as failed.
    pub fn fail(&mut self, result: Option<Value>) {
        self.finish(ExecutionStatus::Failed, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_execution_is_running() {
        let exec = Execution::new(TaskId::generate());
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(exec.logs.is_empty());
        assert!(exec.finished_at.is_none());
    }

    #[test]
    fn test_finish_writes_result_once() {
        let mut exec = Execution::new(TaskId::generate());
        exec.append_log("starting");
        exec.complete(Some(json!({ "ok": true })));

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.result, Some(json!({ "ok": true })));
        assert!(exec.finished_at.is_some());
        assert_eq!(exec.logs, vec!["starting".to_string()]);
    }
}
