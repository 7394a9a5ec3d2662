//! End-to-end runtime behavior: lifecycle, events, sandbox, fallback.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use agentrun_core::{RuntimeError, RuntimeEvent, TaskId, TaskSpec, TaskStatus};
use agentrun_runtime::executor::SandboxedExecutor;
use agentrun_runtime::{
    AgentRuntime, BreakerConfig, CircuitBreaker, EventBus, FallbackStore, PersistenceStore,
    TrustedExecutor,
};

fn payload(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn trusted_runtime() -> (AgentRuntime, Arc<FallbackStore>, EventBus) {
    let store = Arc::new(FallbackStore::new(None));
    let bus = EventBus::new(64);
    let runtime = AgentRuntime::new(
        store.clone(),
        bus.clone(),
        Arc::new(TrustedExecutor::new("http://localhost:0", None)),
        Arc::new(CircuitBreaker::with_config(
            "executor",
            BreakerConfig::default(),
        )),
    );
    (runtime, store, bus)
}

fn sandboxed_runtime() -> (AgentRuntime, Arc<FallbackStore>) {
    let store = Arc::new(FallbackStore::new(None));
    let runtime = AgentRuntime::new(
        store.clone(),
        EventBus::new(64),
        Arc::new(SandboxedExecutor::default()),
        Arc::new(CircuitBreaker::with_config(
            "executor",
            BreakerConfig::default(),
        )),
    );
    (runtime, store)
}

#[tokio::test]
async fn task_round_trip_completes() {
    let (runtime, store, _bus) = trusted_runtime();

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[("_test", json!(true))])))
        .await;
    assert!(result.success);

    let tasks = store.in_memory_tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert!(tasks[0].updated_at >= tasks[0].created_at);
}

#[tokio::test]
async fn event_ordering_started_before_completed() {
    let (runtime, _store, bus) = trusted_runtime();
    let mut rx = bus.subscribe();

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[("_test", json!(true))])).with_agent("agent-1"))
        .await;
    assert!(result.success);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();

    assert_eq!(first.event_type(), "task.started");
    assert_eq!(second.event_type(), "task.completed");
    assert_eq!(first.task_id(), second.task_id());
    match second {
        RuntimeEvent::TaskCompleted {
            agent_id, success, ..
        } => {
            assert_eq!(agent_id.as_deref(), Some("agent-1"));
            assert!(success);
        }
        other => panic!("expected task.completed, got {}", other.event_type()),
    }

    // Exactly one settlement event per execution.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn sandbox_evaluates_payload_expression() {
    let (runtime, _store) = sandboxed_runtime();

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[
            ("code", json!("payload.x + 1")),
            ("x", json!(1)),
        ])))
        .await;

    assert!(result.success);
    assert_eq!(result.output, Some(json!(2)));
}

#[tokio::test]
async fn sandbox_rejects_host_module_access() {
    let (runtime, store) = sandboxed_runtime();

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[("code", json!("require('fs')"))])))
        .await;

    assert!(!result.success);
    let tasks = store.in_memory_tasks().await;
    assert_eq!(tasks[0].status, TaskStatus::Failed);
}

#[tokio::test]
async fn resume_guard_requires_paused() {
    let (runtime, store, _bus) = trusted_runtime();

    // A pending task that never ran.
    let pending = agentrun_core::Task::new(TaskSpec::default());
    store.save_task(&pending).await.unwrap();

    let result = runtime.resume_task(&pending.id).await;
    assert!(matches!(result, Err(RuntimeError::InvalidState { .. })));

    runtime.pause_task(&pending.id).await.unwrap();
    assert_eq!(
        store.get_task(&pending.id).await.unwrap().status,
        TaskStatus::Paused
    );

    runtime.resume_task(&pending.id).await.unwrap();
    assert_eq!(
        store.get_task(&pending.id).await.unwrap().status,
        TaskStatus::InProgress
    );
}

#[tokio::test]
async fn cancel_is_permissive_and_best_effort() {
    let (runtime, store, _bus) = trusted_runtime();

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[("_test", json!(true))])))
        .await;
    assert!(result.success);

    let tasks = store.in_memory_tasks().await;
    let task = &tasks[0];
    assert_eq!(task.status, TaskStatus::Completed);

    // Cancel after completion still flips the status; this mirrors the
    // best-effort contract.
    runtime.cancel_task(&task.id).await.unwrap();
    assert_eq!(
        store.get_task(&task.id).await.unwrap().status,
        TaskStatus::Cancelled
    );

    let missing = runtime.cancel_task(&TaskId::new("missing")).await;
    assert!(matches!(missing, Err(RuntimeError::TaskNotFound(_))));
}

#[tokio::test]
async fn persistence_fallback_round_trip() {
    let store = FallbackStore::new(None);
    let task = agentrun_core::Task::new(TaskSpec::default());

    store.save_task(&task).await.unwrap();
    assert_eq!(store.get_task(&task.id).await.unwrap(), task);

    let missing = store
        .update_task(&TaskId::new("missing"), agentrun_core::TaskPatch::default())
        .await;
    assert!(matches!(missing, Err(RuntimeError::TaskNotFound(_))));
}

#[tokio::test]
async fn agent_status_drains_after_settlement() {
    let (runtime, _store, _bus) = trusted_runtime();

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[("_test", json!(true))])).with_agent("agent-busy"))
        .await;
    assert!(result.success);

    // Settled: the agent is idle again and the active set is empty.
    let status = runtime.agent_status("agent-busy").await;
    assert_eq!(status.active_tasks, Vec::<TaskId>::new());
    assert!(runtime.active_executions().await.is_empty());
}

#[tokio::test]
async fn concurrent_executions_are_independent() {
    let (runtime, store, _bus) = trusted_runtime();
    let runtime = Arc::new(runtime);

    let mut handles = Vec::new();
    for i in 0..8 {
        let runtime = runtime.clone();
        handles.push(tokio::spawn(async move {
            runtime
                .execute_task(TaskSpec::new(payload(&[("n", json!(i))])))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let tasks = store.in_memory_tasks().await;
    assert_eq!(tasks.len(), 8);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn collaboration_tracks_agent_through_lifecycle() {
    let store = Arc::new(FallbackStore::new(None));
    let bus = EventBus::new(64);
    let collaboration = agentrun_runtime::AgentCollaboration::new(bus.clone());
    let _listener = collaboration.spawn();

    let runtime = AgentRuntime::new(
        store,
        bus,
        Arc::new(TrustedExecutor::new("http://localhost:0", None)),
        Arc::new(CircuitBreaker::with_config(
            "executor",
            BreakerConfig::default(),
        )),
    );

    let result = runtime
        .execute_task(TaskSpec::new(payload(&[("_test", json!(true))])).with_agent("agent-1"))
        .await;
    assert!(result.success);

    // The listener applies started then completed asynchronously.
    let mut settled = false;
    for _ in 0..50 {
        if let Some(agent) = collaboration.agent("agent-1").await {
            if agent.current_tasks.is_empty() {
                settled = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(settled, "collaboration registry never settled");
}

#[tokio::test]
async fn breaker_recovery_allows_probe_after_timeout() {
    let breaker = CircuitBreaker::with_config(
        "recovery",
        BreakerConfig {
            failure_threshold: 3,
            success_threshold: 1,
            open_timeout: Duration::from_millis(20),
        },
    );

    for _ in 0..3 {
        let _ = breaker.execute(|| async { Err::<(), _>("down") }).await;
    }
    let rejected: Result<(), _> = breaker.execute(|| async { Ok::<(), &str>(()) }).await;
    assert!(matches!(
        rejected,
        Err(agentrun_runtime::BreakerError::Open { .. })
    ));

    tokio::time::sleep(Duration::from_millis(30)).await;
    let probe: Result<(), agentrun_runtime::BreakerError<&str>> =
        breaker.execute(|| async { Ok(()) }).await;
    assert!(probe.is_ok());
}
