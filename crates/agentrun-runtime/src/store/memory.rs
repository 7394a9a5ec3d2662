//! In-process task storage.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use agentrun_core::{Execution, ExecutionId, ExecutionStatus, RuntimeError, Task, TaskId, TaskPatch};

use super::PersistenceStore;

/// Keyed in-memory task map. Trades durability for availability: the
/// runtime stays fully functional with no database configured.
#[derive(Default)]
pub struct InMemoryStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all tasks, newest first.
    pub async fn all_tasks(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Number of tasks held.
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn save_task(&self, task: &Task) -> Result<(), RuntimeError> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, RuntimeError> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::TaskNotFound(id.clone()))
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, RuntimeError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RuntimeError::TaskNotFound(id.clone()))?;
        task.apply(patch);
        Ok(task.clone())
    }

    // Execution records exist only when a database is configured; in
    // memory their absence is a silent degradation.
    async fn insert_execution(&self, _execution: &Execution) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn append_execution_log(
        &self,
        _id: &ExecutionId,
        _line: &str,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn finish_execution(
        &self,
        _id: &ExecutionId,
        _status: ExecutionStatus,
        _result: Option<Value>,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }
}
