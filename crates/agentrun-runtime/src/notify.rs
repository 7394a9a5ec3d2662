//! Outbound notifications for task lifecycle events.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use agentrun_core::RuntimeEvent;

use crate::bus::EventBus;

const RECENT_CAPACITY: usize = 100;

/// Error from a notification sink delivery.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Outbound delivery channel (webhook, email gateway, chat bridge, ...).
/// Injected; this crate only defines the seam and a tracing default.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// Default sink: structured log lines only.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        info!(
            event_type = %notification.event_type,
            task_id = ?notification.task_id,
            agent_id = ?notification.agent_id,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// One rendered notification.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Dotted wire name of the originating event.
    pub event_type: String,
    /// Task the notification refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Agent the notification refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Human-readable summary.
    pub message: String,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

/// Renders bus events into notifications and forwards them through the
/// configured sink. Delivery is fire-and-forget; sink failures are logged,
/// never propagated.
pub struct NotificationService {
    bus: EventBus,
    sink: Arc<dyn NotificationSink>,
    recent: Arc<RwLock<VecDeque<Notification>>>,
}

impl NotificationService {
    /// Create a service delivering through the given sink.
    pub fn new(bus: EventBus, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            bus,
            sink,
            recent: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Spawn the listener.
    pub fn spawn(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let sink = self.sink.clone();
        let recent = self.recent.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(notification) = render(&event) else {
                            continue;
                        };
                        {
                            let mut recent = recent.write().await;
                            recent.push_back(notification.clone());
                            while recent.len() > RECENT_CAPACITY {
                                recent.pop_front();
                            }
                        }
                        if let Err(e) = sink.deliver(&notification).await {
                            warn!(error = %e, "Notification sink failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// The most recent notifications, oldest first.
    pub async fn recent(&self) -> Vec<Notification> {
        self.recent.read().await.iter().cloned().collect()
    }
}

fn render(event: &RuntimeEvent) -> Option<Notification> {
    let (message, agent_id) = match event {
        RuntimeEvent::TaskCompleted {
            task_id,
            agent_id,
            success,
        } => (
            if *success {
                format!("Task {task_id} completed")
            } else {
                format!("Task {task_id} finished unsuccessfully")
            },
            agent_id.clone(),
        ),
        RuntimeEvent::TaskFailed {
            task_id,
            agent_id,
            error,
        } => (format!("Task {task_id} failed: {error}"), agent_id.clone()),
        RuntimeEvent::TaskHandoff {
            task_id,
            from_agent,
            to_agent,
        } => (
            format!("Task {task_id} handed from {from_agent} to {to_agent}"),
            Some(to_agent.clone()),
        ),
        _ => return None,
    };

    Some(Notification {
        event_type: event.event_type().to_string(),
        task_id: event.task_id().map(|id| id.to_string()),
        agent_id,
        message,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::TaskId;
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
            self.delivered
                .lock()
                .await
                .push(notification.event_type.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_renders_completion_events_only() {
        assert!(render(&RuntimeEvent::task_started(TaskId::generate(), None)).is_none());

        let notification =
            render(&RuntimeEvent::task_completed(TaskId::generate(), None, true)).unwrap();
        assert_eq!(notification.event_type, "task.completed");
        assert!(notification.message.contains("completed"));
    }

    #[tokio::test]
    async fn test_delivers_and_retains_recent() {
        let bus = EventBus::new(16);
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
        });
        let service = NotificationService::new(bus.clone(), sink.clone());
        let _listener = service.spawn();

        // Let the listener subscribe before publishing.
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.publish(RuntimeEvent::task_failed(
            TaskId::generate(),
            Some("agent-1".to_string()),
            "boom",
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*sink.delivered.lock().await, vec!["task.failed".to_string()]);
        let recent = service.recent().await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].agent_id.as_deref(), Some("agent-1"));
    }
}
