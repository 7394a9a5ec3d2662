//! Durable-first storage with a transparent in-memory fallback.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use agentrun_core::{Execution, ExecutionId, ExecutionStatus, RuntimeError, Task, TaskId, TaskPatch};

use super::{DurableStore, InMemoryStore, PersistenceStore};

/// Composes an optional [`DurableStore`] over an [`InMemoryStore`].
///
/// Every call is attempted against the database first. On any
/// persistence-layer error, or when no database is configured at all, the
/// call falls through to the in-process map. The fallback is silent for
/// writes (warn-logged, never raised); callers cannot tell the modes apart
/// from return values.
pub struct FallbackStore {
    durable: Option<DurableStore>,
    memory: InMemoryStore,
}

impl FallbackStore {
    /// Build a store; pass `None` to run purely in memory.
    pub fn new(durable: Option<DurableStore>) -> Self {
        Self {
            durable,
            memory: InMemoryStore::new(),
        }
    }

    /// The durable layer, when a database is configured.
    pub fn durable(&self) -> Option<&DurableStore> {
        self.durable.as_ref()
    }

    /// Diagnostic view of the in-process map. Tasks that were persisted
    /// durably do not appear here.
    pub async fn in_memory_tasks(&self) -> Vec<Task> {
        self.memory.all_tasks().await
    }

    fn note_fallback(&self, op: &str, error: &RuntimeError) {
        // NotFound from the durable layer is not a failure; the record may
        // simply live in the fallback map from an earlier degraded write.
        if !matches!(error, RuntimeError::TaskNotFound(_)) {
            warn!(op, error = %error, "Durable store failed, falling back to memory");
        }
    }
}

#[async_trait]
impl PersistenceStore for FallbackStore {
    async fn save_task(&self, task: &Task) -> Result<(), RuntimeError> {
        if let Some(durable) = &self.durable {
            match durable.save_task(task).await {
                Ok(()) => return Ok(()),
                Err(e) => self.note_fallback("save_task", &e),
            }
        }
        self.memory.save_task(task).await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, RuntimeError> {
        if let Some(durable) = &self.durable {
            match durable.get_task(id).await {
                Ok(task) => return Ok(task),
                Err(e) => self.note_fallback("get_task", &e),
            }
        }
        self.memory.get_task(id).await
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, RuntimeError> {
        if let Some(durable) = &self.durable {
            match durable.update_task(id, patch.clone()).await {
                Ok(task) => return Ok(task),
                Err(e) => self.note_fallback("update_task", &e),
            }
        }
        self.memory.update_task(id, patch).await
    }

    async fn insert_execution(&self, execution: &Execution) -> Result<(), RuntimeError> {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.insert_execution(execution).await {
                self.note_fallback("insert_execution", &e);
            }
        }
        // No in-memory execution store: silent degradation by design.
        Ok(())
    }

    async fn append_execution_log(
        &self,
        id: &ExecutionId,
        line: &str,
    ) -> Result<(), RuntimeError> {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.append_execution_log(id, line).await {
                self.note_fallback("append_execution_log", &e);
            }
        }
        Ok(())
    }

    async fn finish_execution(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
        result: Option<Value>,
    ) -> Result<(), RuntimeError> {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.finish_execution(id, status, result).await {
                self.note_fallback("finish_execution", &e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::{TaskSpec, TaskStatus};

    #[tokio::test]
    async fn test_no_database_round_trips_in_memory() {
        let store = FallbackStore::new(None);
        let task = Task::new(TaskSpec::default());

        store.save_task(&task).await.unwrap();
        let fetched = store.get_task(&task.id).await.unwrap();
        assert_eq!(fetched, task);
        assert_eq!(store.in_memory_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_found() {
        let store = FallbackStore::new(None);
        let result = store
            .update_task(&TaskId::new("missing"), TaskPatch::default())
            .await;
        assert!(matches!(result, Err(RuntimeError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_durable_mode_prefers_database() {
        let durable = DurableStore::connect("sqlite::memory:").await.unwrap();
        let store = FallbackStore::new(Some(durable));
        let task = Task::new(TaskSpec::default());

        store.save_task(&task).await.unwrap();
        store
            .update_task(&task.id, TaskPatch::status(TaskStatus::InProgress))
            .await
            .unwrap();

        let fetched = store.get_task(&task.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::InProgress);
        // Durable writes never land in the fallback map.
        assert!(store.in_memory_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_durable_failure_falls_back_silently() {
        let durable = DurableStore::connect("sqlite::memory:").await.unwrap();
        durable.pool.close().await;
        let store = FallbackStore::new(Some(durable));

        // Every durable call now errors; the caller sees none of it.
        let task = Task::new(TaskSpec::default());
        store.save_task(&task).await.unwrap();
        let fetched = store.get_task(&task.id).await.unwrap();
        assert_eq!(fetched, task);
        assert_eq!(store.in_memory_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_execution_recording_without_database_is_silent() {
        let store = FallbackStore::new(None);
        let execution = Execution::new(TaskId::generate());
        store.insert_execution(&execution).await.unwrap();
        store
            .finish_execution(&execution.id, ExecutionStatus::Failed, None)
            .await
            .unwrap();
    }
}
