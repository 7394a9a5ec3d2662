//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use agentrun_core::TaskStatus;
use agentrun_runtime::CircuitState;

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_task_metrics(state, &mut output).await;
    collect_execution_metrics(state, &mut output).await;
    collect_breaker_metrics(state, &mut output).await;

    output
}

/// Collect task metrics by status from the in-process map.
async fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let tasks = state.store.in_memory_tasks().await;

    let mut pending = 0u64;
    let mut in_progress = 0u64;
    let mut completed = 0u64;
    let mut failed = 0u64;
    let mut cancelled = 0u64;
    let mut paused = 0u64;

    for task in &tasks {
        match task.status {
            TaskStatus::Pending => pending += 1,
            TaskStatus::InProgress => in_progress += 1,
            TaskStatus::Completed => completed += 1,
            TaskStatus::Failed => failed += 1,
            TaskStatus::Cancelled => cancelled += 1,
            TaskStatus::Paused => paused += 1,
        }
    }

    writeln!(
        output,
        "# HELP agentrun_tasks_total Number of in-memory tasks by status"
    )
    .ok();
    writeln!(output, "# TYPE agentrun_tasks_total gauge").ok();
    writeln!(output, "agentrun_tasks_total{{status=\"pending\"}} {pending}").ok();
    writeln!(
        output,
        "agentrun_tasks_total{{status=\"in-progress\"}} {in_progress}"
    )
    .ok();
    writeln!(
        output,
        "agentrun_tasks_total{{status=\"completed\"}} {completed}"
    )
    .ok();
    writeln!(output, "agentrun_tasks_total{{status=\"failed\"}} {failed}").ok();
    writeln!(
        output,
        "agentrun_tasks_total{{status=\"cancelled\"}} {cancelled}"
    )
    .ok();
    writeln!(output, "agentrun_tasks_total{{status=\"paused\"}} {paused}").ok();
}

/// Collect the active-execution gauge.
async fn collect_execution_metrics(state: &Arc<AppState>, output: &mut String) {
    let active = state.runtime.active_executions().await.len();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentrun_active_executions Executions not yet settled"
    )
    .ok();
    writeln!(output, "# TYPE agentrun_active_executions gauge").ok();
    writeln!(output, "agentrun_active_executions {active}").ok();
}

/// Collect circuit breaker state gauges.
async fn collect_breaker_metrics(state: &Arc<AppState>, output: &mut String) {
    let snapshots = state.breakers.snapshots().await;

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentrun_breaker_state Circuit breaker state (1 for the active state)"
    )
    .ok();
    writeln!(output, "# TYPE agentrun_breaker_state gauge").ok();
    for (name, snapshot) in &snapshots {
        for state_name in [
            CircuitState::Closed,
            CircuitState::Open,
            CircuitState::HalfOpen,
        ] {
            let value = if snapshot.state == state_name { 1 } else { 0 };
            writeln!(
                output,
                "agentrun_breaker_state{{service=\"{}\",state=\"{}\"}} {value}",
                name,
                state_name.as_str()
            )
            .ok();
        }
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentrun_breaker_failures Failure count inside the current window"
    )
    .ok();
    writeln!(output, "# TYPE agentrun_breaker_failures gauge").ok();
    for (name, snapshot) in &snapshots {
        writeln!(
            output,
            "agentrun_breaker_failures{{service=\"{}\"}} {}",
            name, snapshot.failure_count
        )
        .ok();
    }
}
