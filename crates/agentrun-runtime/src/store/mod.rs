//! Task and execution persistence.
//!
//! The runtime talks to one [`PersistenceStore`]; in practice that is a
//! [`FallbackStore`] composing a durable SQL store (when a database is
//! configured) over an in-process map, so the runtime behaves identically
//! with or without a database.

use async_trait::async_trait;
use serde_json::Value;

use agentrun_core::{Execution, ExecutionId, ExecutionStatus, RuntimeError, Task, TaskId, TaskPatch};

mod durable;
mod fallback;
mod memory;

pub use durable::DurableStore;
pub use fallback::FallbackStore;
pub use memory::InMemoryStore;

/// Durable task/execution record storage.
///
/// Execution recording is best-effort: stores without a database implement
/// it as a silent no-op (degradation, not an error).
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Persist a new task record.
    async fn save_task(&self, task: &Task) -> Result<(), RuntimeError>;

    /// Fetch a task by id.
    async fn get_task(&self, id: &TaskId) -> Result<Task, RuntimeError>;

    /// Merge a partial update into a task, refreshing `updated_at`.
    /// Returns the updated record.
    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, RuntimeError>;

    /// Record the start of an execution attempt.
    async fn insert_execution(&self, execution: &Execution) -> Result<(), RuntimeError>;

    /// Append one log line to a running execution.
    async fn append_execution_log(
        &self,
        id: &ExecutionId,
        line: &str,
    ) -> Result<(), RuntimeError>;

    /// Settle an execution with a terminal status and one-shot result.
    async fn finish_execution(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
        result: Option<Value>,
    ) -> Result<(), RuntimeError>;
}
