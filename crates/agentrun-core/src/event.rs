//! Lifecycle and collaboration events published on the event bus.

use crate::{AgentAvailability, TaskId};
use serde::Serialize;

/// Events fanned out by the runtime and its collaborators.
///
/// Every variant is cheap to clone; the bus hands each subscriber its own
/// copy. `event_type` gives the dotted wire name used by distributed
/// transports and notification sinks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuntimeEvent {
    /// Task execution is about to start.
    TaskStarted {
        task_id: TaskId,
        agent_id: Option<String>,
    },

    /// Task execution settled successfully or with a business failure.
    TaskCompleted {
        task_id: TaskId,
        agent_id: Option<String>,
        success: bool,
    },

    /// Task execution failed on an infrastructure error.
    TaskFailed {
        task_id: TaskId,
        agent_id: Option<String>,
        error: String,
    },

    /// Agent joined the collaboration registry.
    AgentRegistered {
        agent_id: String,
        capabilities: Vec<String>,
    },

    /// Agent availability changed.
    AgentStatusChanged {
        agent_id: String,
        availability: AgentAvailability,
    },

    /// Task handed from one agent to another.
    TaskHandoff {
        task_id: TaskId,
        from_agent: String,
        to_agent: String,
    },
}

impl RuntimeEvent {
    /// Create a task-started event.
    pub fn task_started(task_id: TaskId, agent_id: Option<String>) -> Self {
        Self::TaskStarted { task_id, agent_id }
    }

    /// Create a task-completed event.
    pub fn task_completed(task_id: TaskId, agent_id: Option<String>, success: bool) -> Self {
        Self::TaskCompleted {
            task_id,
            agent_id,
            success,
        }
    }

    /// Create a task-failed event.
    pub fn task_failed(
        task_id: TaskId,
        agent_id: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::TaskFailed {
            task_id,
            agent_id,
            error: error.into(),
        }
    }

    /// The task this event refers to, if any.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskHandoff { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// The dotted wire name for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "task.started",
            Self::TaskCompleted { .. } => "task.completed",
            Self::TaskFailed { .. } => "task.failed",
            Self::AgentRegistered { .. } => "agent.registered",
            Self::AgentStatusChanged { .. } => "agent.status",
            Self::TaskHandoff { .. } => "task.handoff",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let id = TaskId::generate();
        let started = RuntimeEvent::task_started(id.clone(), None);
        assert_eq!(started.event_type(), "task.started");
        assert_eq!(started.task_id(), Some(&id));

        let completed = RuntimeEvent::task_completed(id.clone(), Some("a1".into()), true);
        assert_eq!(completed.event_type(), "task.completed");

        let registered = RuntimeEvent::AgentRegistered {
            agent_id: "a1".into(),
            capabilities: vec!["triage".into()],
        };
        assert_eq!(registered.event_type(), "agent.registered");
        assert!(registered.task_id().is_none());
    }
}
