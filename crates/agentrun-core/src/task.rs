//! Task types: the unit of work tracked through the lifecycle.

use crate::{TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Task represents one unit of work submitted to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier, assigned by the runtime.
    pub id: TaskId,

    /// Logical agent that owns this task; absent for anonymous/system tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Opaque, schema-free payload. Only the executor interprets it.
    pub payload: Map<String, Value>,

    /// Current task status.
    pub status: TaskStatus,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// Rewritten on every status transition.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending Task from a spec, assigning a fresh id.
    pub fn new(spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            agent_id: spec.agent_id,
            payload: spec.payload,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Transition to a new status, refreshing `updated_at`.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Merge a partial update into this task. `updated_at` is always
    /// refreshed, even for an empty patch.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(payload) = patch.payload {
            self.payload = payload;
        }
        if let Some(agent_id) = patch.agent_id {
            self.agent_id = Some(agent_id);
        }
        self.updated_at = Utc::now();
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Caller-supplied specification for a new task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSpec {
    /// Logical agent the task belongs to.
    #[serde(default, rename = "agentId")]
    pub agent_id: Option<String>,

    /// Opaque payload handed to the executor.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl TaskSpec {
    /// Create a spec with a payload and no owning agent.
    pub fn new(payload: Map<String, Value>) -> Self {
        Self {
            agent_id: None,
            payload,
        }
    }

    /// Builder method to set the owning agent.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// Partial update applied through `PersistenceStore::update_task`.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// New status, if changing.
    pub status: Option<TaskStatus>,

    /// Replacement payload, if changing.
    pub payload: Option<Map<String, Value>>,

    /// New owning agent, if changing.
    pub agent_id: Option<String>,
}

impl TaskPatch {
    /// A patch that only moves the task to a new status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(TaskSpec::new(payload(&[("x", json!(1))])));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.agent_id.is_none());
    }

    #[test]
    fn test_set_status_refreshes_updated_at() {
        let mut task = Task::new(TaskSpec::default());
        let before = task.updated_at;
        task.set_status(TaskStatus::InProgress);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.updated_at >= before);
    }

    #[test]
    fn test_apply_merges_fields() {
        let mut task = Task::new(TaskSpec::new(payload(&[("keep", json!(true))])));
        task.apply(TaskPatch::status(TaskStatus::Cancelled));
        assert_eq!(task.status, TaskStatus::Cancelled);
        // Untouched fields survive the merge.
        assert_eq!(task.payload.get("keep"), Some(&json!(true)));
    }

    #[test]
    fn test_spec_deserializes_camel_case_agent_id() {
        let spec: TaskSpec =
            serde_json::from_value(json!({ "agentId": "agent-1", "payload": { "a": 1 } })).unwrap();
        assert_eq!(spec.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(spec.payload.get("a"), Some(&json!(1)));
    }
}
