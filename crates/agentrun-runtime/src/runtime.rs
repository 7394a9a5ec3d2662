//! The AgentRuntime: task lifecycle orchestration.
//!
//! `execute_task` drives the full pipeline: persist pending, transition to
//! in-progress, publish `task.started`, run the executor through the
//! circuit breaker, persist the terminal status, settle the execution
//! record, and publish the completion event. Persisted transitions always
//! precede the corresponding publication; for one task, `task.started` is
//! strictly ordered before its completion event.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use agentrun_core::{
    AgentAvailability, Execution, ExecutionStatus, RuntimeError, RuntimeEvent, Task, TaskId,
    TaskPatch, TaskResult, TaskSpec, TaskStatus,
};

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::bus::EventBus;
use crate::executor::Executor;
use crate::store::PersistenceStore;

/// View of one agent derived from the active-execution set.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    /// The agent in question.
    pub agent_id: String,
    /// `busy` while any of the agent's executions is unsettled.
    pub state: AgentAvailability,
    /// Task ids currently executing for this agent.
    pub active_tasks: Vec<TaskId>,
}

#[derive(Debug, Clone)]
struct ActiveExecution {
    agent_id: Option<String>,
}

/// Orchestrates task execution: id assignment, persistence, fault-isolated
/// executor invocation, lifecycle events, and the cancel/pause/resume
/// operations.
pub struct AgentRuntime {
    store: Arc<dyn PersistenceStore>,
    bus: EventBus,
    executor: Arc<dyn Executor>,
    breaker: Arc<CircuitBreaker>,
    active: Arc<RwLock<HashMap<TaskId, ActiveExecution>>>,
}

impl AgentRuntime {
    /// Wire a runtime from its injected collaborators.
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        bus: EventBus,
        executor: Arc<dyn Executor>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            store,
            bus,
            executor,
            breaker,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The breaker guarding this runtime's executor.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The event bus this runtime publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Fetch a persisted task.
    pub async fn task(&self, id: &TaskId) -> Result<Task, RuntimeError> {
        self.store.get_task(id).await
    }

    /// Execute a new task end to end. Never returns an error: every
    /// failure mode is captured in the returned result and the persisted
    /// status.
    pub async fn execute_task(&self, spec: TaskSpec) -> TaskResult {
        let task = Task::new(spec);
        let task_id = task.id.clone();
        let agent_id = task.agent_id.clone();

        info!(task_id = %task_id, agent_id = ?agent_id, "Executing task");

        if let Err(e) = self.store.save_task(&task).await {
            error!(task_id = %task_id, error = %e, "Failed to persist new task");
            return TaskResult::failure(e.to_string());
        }
        if let Err(e) = self
            .store
            .update_task(&task_id, TaskPatch::status(TaskStatus::InProgress))
            .await
        {
            error!(task_id = %task_id, error = %e, "Failed to mark task in-progress");
            return TaskResult::failure(e.to_string());
        }

        self.active.write().await.insert(
            task_id.clone(),
            ActiveExecution {
                agent_id: agent_id.clone(),
            },
        );
        self.bus
            .publish(RuntimeEvent::task_started(task_id.clone(), agent_id.clone()));

        let execution = Execution::new(task_id.clone());
        if let Err(e) = self.store.insert_execution(&execution).await {
            warn!(task_id = %task_id, error = %e, "Failed to record execution start");
        }

        let outcome = self.breaker.execute(|| self.executor.execute(&task)).await;

        // Business failures ride in the Ok result; infrastructure failures
        // (executor Err, breaker rejection) are collapsed into the same
        // result shape for the caller but publish task.failed.
        let (result, infra_error) = match outcome {
            Ok(result) => (result, None),
            Err(BreakerError::Open { service }) => {
                let error = RuntimeError::CircuitOpen(service);
                warn!(task_id = %task_id, "Circuit breaker rejected execution");
                (TaskResult::failure(error.to_string()), Some(error.to_string()))
            }
            Err(BreakerError::Operation(e)) => {
                warn!(task_id = %task_id, error = %e, "Executor failed");
                let detail = format!("{e:?}");
                (
                    TaskResult::failure(e.to_string()).with_detail(detail),
                    Some(e.to_string()),
                )
            }
        };

        let status = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        // This may overwrite a concurrent cancel/pause: cancellation is
        // cooperative-at-best and does not abort an in-flight executor.
        if let Err(e) = self
            .store
            .update_task(&task_id, TaskPatch::status(status))
            .await
        {
            warn!(task_id = %task_id, error = %e, "Failed to persist terminal status");
        }

        if let Some(logs) = &result.logs {
            for line in logs {
                if let Err(e) = self.store.append_execution_log(&execution.id, line).await {
                    warn!(task_id = %task_id, error = %e, "Failed to append execution log");
                }
            }
        }
        let execution_status = if result.success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        if let Err(e) = self
            .store
            .finish_execution(
                &execution.id,
                execution_status,
                serde_json::to_value(&result).ok(),
            )
            .await
        {
            warn!(task_id = %task_id, error = %e, "Failed to settle execution record");
        }

        self.active.write().await.remove(&task_id);

        match infra_error {
            None => {
                self.bus.publish(RuntimeEvent::task_completed(
                    task_id.clone(),
                    agent_id,
                    result.success,
                ));
            }
            Some(error) => {
                self.bus
                    .publish(RuntimeEvent::task_failed(task_id.clone(), agent_id, error));
            }
        }

        info!(task_id = %task_id, success = result.success, "Task settled");
        result
    }

    /// Cancel a task, best-effort.
    ///
    /// Deliberately permissive: the status flips to cancelled regardless of
    /// the current one, because an in-flight executor cannot always be
    /// interrupted. A task that finishes afterwards overwrites this.
    pub async fn cancel_task(&self, id: &TaskId) -> Result<(), RuntimeError> {
        self.store
            .update_task(id, TaskPatch::status(TaskStatus::Cancelled))
            .await?;
        info!(task_id = %id, "Task cancelled");
        Ok(())
    }

    /// Pause a task unconditionally (same best-effort caveat as cancel).
    pub async fn pause_task(&self, id: &TaskId) -> Result<(), RuntimeError> {
        self.store
            .update_task(id, TaskPatch::status(TaskStatus::Paused))
            .await?;
        info!(task_id = %id, "Task paused");
        Ok(())
    }

    /// Resume a paused task back to in-progress.
    ///
    /// Fails with `InvalidState` unless the current status is exactly
    /// `paused`. Re-invoking the executor is the caller's policy; the
    /// runtime only performs the transition.
    pub async fn resume_task(&self, id: &TaskId) -> Result<(), RuntimeError> {
        let task = self.store.get_task(id).await?;
        if task.status != TaskStatus::Paused {
            return Err(RuntimeError::invalid_state(
                id.clone(),
                "paused",
                task.status,
            ));
        }
        self.store
            .update_task(id, TaskPatch::status(TaskStatus::InProgress))
            .await?;
        info!(task_id = %id, "Task resumed");
        Ok(())
    }

    /// Task ids whose execution has not yet settled. Purely in-process
    /// bookkeeping, not derived from persistence.
    pub async fn active_executions(&self) -> Vec<TaskId> {
        self.active.read().await.keys().cloned().collect()
    }

    /// Agent view derived from the active-execution set.
    pub async fn agent_status(&self, agent_id: &str) -> AgentStatus {
        let active = self.active.read().await;
        let active_tasks: Vec<TaskId> = active
            .iter()
            .filter(|(_, execution)| execution.agent_id.as_deref() == Some(agent_id))
            .map(|(id, _)| id.clone())
            .collect();
        let state = if active_tasks.is_empty() {
            AgentAvailability::Idle
        } else {
            AgentAvailability::Busy
        };
        AgentStatus {
            agent_id: agent_id.to_string(),
            state,
            active_tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;
    use crate::executor::ExecutorError;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingExecutor;

    #[async_trait]
    impl Executor for FailingExecutor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn execute(&self, _task: &Task) -> Result<TaskResult, ExecutorError> {
            Err(ExecutorError::Provider("connection refused".to_string()))
        }
    }

    struct EchoExecutor;

    #[async_trait]
    impl Executor for EchoExecutor {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, task: &Task) -> Result<TaskResult, ExecutorError> {
            Ok(TaskResult::ok(serde_json::json!({ "echo": task.payload })))
        }
    }

    fn runtime_with(executor: Arc<dyn Executor>, breaker: BreakerConfig) -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(InMemoryStore::new()),
            EventBus::new(64),
            executor,
            Arc::new(CircuitBreaker::with_config("executor", breaker)),
        )
    }

    #[tokio::test]
    async fn test_execute_persists_completed() {
        let runtime = runtime_with(Arc::new(EchoExecutor), BreakerConfig::default());
        let result = runtime.execute_task(TaskSpec::default()).await;
        assert!(result.success);
        assert!(runtime.active_executions().await.is_empty());
    }

    #[tokio::test]
    async fn test_executor_failure_never_escapes() {
        let runtime = runtime_with(Arc::new(FailingExecutor), BreakerConfig::default());
        let result = runtime.execute_task(TaskSpec::default()).await;
        assert!(!result.success);
        assert!(result
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_tripped_breaker_produces_failed_tasks() {
        let runtime = runtime_with(
            Arc::new(FailingExecutor),
            BreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                open_timeout: Duration::from_secs(60),
            },
        );

        let first = runtime.execute_task(TaskSpec::default()).await;
        assert!(!first.success);

        // The breaker is open now; the task still fails as an ordinary
        // result rather than a special case.
        let second = runtime.execute_task(TaskSpec::default()).await;
        assert!(!second.success);
        assert!(second
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("Circuit breaker open"));
    }

    #[tokio::test]
    async fn test_cancel_missing_task_is_not_found() {
        let runtime = runtime_with(Arc::new(EchoExecutor), BreakerConfig::default());
        let result = runtime.cancel_task(&TaskId::new("missing")).await;
        assert!(matches!(result, Err(RuntimeError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_agent_status_idle_when_no_active_tasks() {
        let runtime = runtime_with(Arc::new(EchoExecutor), BreakerConfig::default());
        let status = runtime.agent_status("agent-1").await;
        assert_eq!(status.state, AgentAvailability::Idle);
        assert!(status.active_tasks.is_empty());
    }
}
