//! SQL-backed task/execution storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use agentrun_core::{
    Execution, ExecutionId, ExecutionStatus, RuntimeError, Task, TaskId, TaskPatch, TaskStatus,
};

use super::PersistenceStore;

const CREATE_TASKS: &str = "CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    agent_id TEXT,
    payload TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const CREATE_EXECUTIONS: &str = "CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL,
    status TEXT NOT NULL,
    logs TEXT NOT NULL,
    result TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT
)";

/// Durable store over SQLite. The `tasks` and `executions` tables are the
/// only on-disk schema the runtime requires; both are created on connect.
pub struct DurableStore {
    pub(crate) pool: SqlitePool,
}

impl DurableStore {
    /// Connect to the database and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self, RuntimeError> {
        // SQLite serializes writers; a single connection avoids busy errors
        // and keeps `sqlite::memory:` databases coherent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(persistence)?;

        sqlx::query(CREATE_TASKS)
            .execute(&pool)
            .await
            .map_err(persistence)?;
        sqlx::query(CREATE_EXECUTIONS)
            .execute(&pool)
            .await
            .map_err(persistence)?;

        Ok(Self { pool })
    }

    /// Cheap connectivity probe for health checks.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(persistence)
    }

    /// Fetch the executions recorded for a task, oldest first.
    pub async fn executions_for_task(&self, task_id: &TaskId) -> Result<Vec<Execution>, RuntimeError> {
        let rows = sqlx::query(
            "SELECT id, task_id, status, logs, result, started_at, finished_at
             FROM executions WHERE task_id = ?1 ORDER BY started_at",
        )
        .bind(task_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.iter().map(execution_from_row).collect()
    }
}

#[async_trait]
impl PersistenceStore for DurableStore {
    async fn save_task(&self, task: &Task) -> Result<(), RuntimeError> {
        let payload = serde_json::to_string(&task.payload).map_err(persistence)?;
        sqlx::query(
            "INSERT INTO tasks (id, agent_id, payload, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(task.id.as_str())
        .bind(task.agent_id.as_deref())
        .bind(payload)
        .bind(task.status.as_str())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, RuntimeError> {
        let row = sqlx::query(
            "SELECT id, agent_id, payload, status, created_at, updated_at
             FROM tasks WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        match row {
            Some(row) => task_from_row(&row),
            None => Err(RuntimeError::TaskNotFound(id.clone())),
        }
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, RuntimeError> {
        let mut task = self.get_task(id).await?;
        task.apply(patch);

        let payload = serde_json::to_string(&task.payload).map_err(persistence)?;
        let updated = sqlx::query(
            "UPDATE tasks SET agent_id = ?1, payload = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
        )
        .bind(task.agent_id.as_deref())
        .bind(payload)
        .bind(task.status.as_str())
        .bind(task.updated_at.to_rfc3339())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        if updated.rows_affected() == 0 {
            return Err(RuntimeError::TaskNotFound(id.clone()));
        }
        Ok(task)
    }

    async fn insert_execution(&self, execution: &Execution) -> Result<(), RuntimeError> {
        let logs = serde_json::to_string(&execution.logs).map_err(persistence)?;
        let result = execution
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(persistence)?;

        sqlx::query(
            "INSERT INTO executions (id, task_id, status, logs, result, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(execution.id.as_str())
        .bind(execution.task_id.as_str())
        .bind(execution.status.as_str())
        .bind(logs)
        .bind(result)
        .bind(execution.started_at.to_rfc3339())
        .bind(execution.finished_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn append_execution_log(
        &self,
        id: &ExecutionId,
        line: &str,
    ) -> Result<(), RuntimeError> {
        let row = sqlx::query("SELECT logs FROM executions WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;

        let Some(row) = row else {
            return Ok(());
        };

        let raw: String = row.try_get("logs").map_err(persistence)?;
        let mut logs: Vec<String> = serde_json::from_str(&raw).map_err(persistence)?;
        logs.push(line.to_string());
        let logs = serde_json::to_string(&logs).map_err(persistence)?;

        sqlx::query("UPDATE executions SET logs = ?1 WHERE id = ?2")
            .bind(logs)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn finish_execution(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
        result: Option<Value>,
    ) -> Result<(), RuntimeError> {
        let result = result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(persistence)?;

        sqlx::query(
            "UPDATE executions SET status = ?1, result = ?2, finished_at = ?3 WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(result)
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }
}

fn persistence(e: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Persistence(e.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RuntimeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(persistence)
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Task, RuntimeError> {
    let id: String = row.try_get("id").map_err(persistence)?;
    let agent_id: Option<String> = row.try_get("agent_id").map_err(persistence)?;
    let payload: String = row.try_get("payload").map_err(persistence)?;
    let status: String = row.try_get("status").map_err(persistence)?;
    let created_at: String = row.try_get("created_at").map_err(persistence)?;
    let updated_at: String = row.try_get("updated_at").map_err(persistence)?;

    let payload: Map<String, Value> = serde_json::from_str(&payload).map_err(persistence)?;
    let status = TaskStatus::from_wire(&status)
        .ok_or_else(|| RuntimeError::Persistence(format!("unknown task status: {status}")))?;

    Ok(Task {
        id: TaskId::new(id),
        agent_id,
        payload,
        status,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn execution_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Execution, RuntimeError> {
    let id: String = row.try_get("id").map_err(persistence)?;
    let task_id: String = row.try_get("task_id").map_err(persistence)?;
    let status: String = row.try_get("status").map_err(persistence)?;
    let logs: String = row.try_get("logs").map_err(persistence)?;
    let result: Option<String> = row.try_get("result").map_err(persistence)?;
    let started_at: String = row.try_get("started_at").map_err(persistence)?;
    let finished_at: Option<String> = row.try_get("finished_at").map_err(persistence)?;

    let status = ExecutionStatus::from_wire(&status)
        .ok_or_else(|| RuntimeError::Persistence(format!("unknown execution status: {status}")))?;
    let logs: Vec<String> = serde_json::from_str(&logs).map_err(persistence)?;
    let result = result
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(persistence)?;
    let finished_at = finished_at.as_deref().map(parse_timestamp).transpose()?;

    Ok(Execution {
        id: ExecutionId::new(id),
        task_id: TaskId::new(task_id),
        status,
        logs,
        result,
        started_at: parse_timestamp(&started_at)?,
        finished_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::TaskSpec;
    use serde_json::json;

    async fn store() -> DurableStore {
        DurableStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_task_roundtrip() {
        let store = store().await;
        let mut spec = TaskSpec::default().with_agent("agent-1");
        spec.payload.insert("x".to_string(), json!(1));
        let task = Task::new(spec);

        store.save_task(&task).await.unwrap();
        let fetched = store.get_task(&task.id).await.unwrap();

        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(fetched.payload.get("x"), Some(&json!(1)));
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = store().await;
        let result = store.get_task(&TaskId::new("missing")).await;
        assert!(matches!(result, Err(RuntimeError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_persists_status() {
        let store = store().await;
        let task = Task::new(TaskSpec::default());
        store.save_task(&task).await.unwrap();

        let updated = store
            .update_task(&task.id, TaskPatch::status(TaskStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);

        let fetched = store.get_task(&task.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::InProgress);
        assert!(fetched.updated_at >= task.updated_at);
    }

    #[tokio::test]
    async fn test_execution_lifecycle() {
        let store = store().await;
        let task = Task::new(TaskSpec::default());
        store.save_task(&task).await.unwrap();

        let execution = Execution::new(task.id.clone());
        store.insert_execution(&execution).await.unwrap();
        store
            .append_execution_log(&execution.id, "step one")
            .await
            .unwrap();
        store
            .finish_execution(
                &execution.id,
                ExecutionStatus::Completed,
                Some(json!({ "ok": true })),
            )
            .await
            .unwrap();

        let executions = store.executions_for_task(&task.id).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert_eq!(executions[0].logs, vec!["step one".to_string()]);
        assert_eq!(executions[0].result, Some(json!({ "ok": true })));
        assert!(executions[0].finished_at.is_some());
    }
}
