//! Broadcast event bus with an optional distributed mirror.
//!
//! The bus fans every published [`RuntimeEvent`] out to all in-process
//! subscribers. When a distributed transport is attached, events are also
//! mirrored to it on a fire-and-forget task; transport failures are logged,
//! never propagated to publishers.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use agentrun_core::RuntimeEvent;

/// Error from a distributed transport publish.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// An injected publish capability mirroring events to a distributed
/// transport (message broker, websocket fan-out, ...). The transport itself
/// is an external collaborator; this crate only defines the seam.
#[async_trait]
pub trait DistributedTransport: Send + Sync {
    /// Publish one event to the transport.
    async fn publish(&self, event: RuntimeEvent) -> Result<(), TransportError>;
}

/// In-process publish/subscribe fan-out for runtime events.
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
    capacity: usize,
    transport: Option<Arc<dyn DistributedTransport>>,
}

impl EventBus {
    /// Create a bus with the given buffer capacity.
    ///
    /// Capacity bounds how many events a slow subscriber may lag behind
    /// before it starts losing events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            transport: None,
        }
    }

    /// Attach a distributed transport that mirrors every published event.
    pub fn with_transport(mut self, transport: Arc<dyn DistributedTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Publish an event to all subscribers.
    ///
    /// Fire-and-forget: returns the number of in-process receivers, 0 when
    /// nobody is listening.
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        if let Some(transport) = &self.transport {
            let transport = transport.clone();
            let mirrored = event.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.publish(mirrored).await {
                    warn!(error = %e, "Failed to mirror event to distributed transport");
                }
            });
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Number of active in-process subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The bus buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
            transport: self.transport.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::TaskId;
    use tokio::sync::Mutex;

    struct RecordingTransport {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl DistributedTransport for RecordingTransport {
        async fn publish(&self, event: RuntimeEvent) -> Result<(), TransportError> {
            self.seen.lock().await.push(event.event_type());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let id = TaskId::generate();
        let receivers = bus.publish(RuntimeEvent::task_started(id.clone(), None));
        assert_eq!(receivers, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "task.started");
        assert_eq!(event.task_id(), Some(&id));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fire_and_forget() {
        let bus = EventBus::new(16);
        let receivers = bus.publish(RuntimeEvent::task_started(TaskId::generate(), None));
        assert_eq!(receivers, 0);
    }

    #[tokio::test]
    async fn test_transport_mirrors_events() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
        });
        let bus = EventBus::new(16).with_transport(transport.clone());

        bus.publish(RuntimeEvent::task_completed(TaskId::generate(), None, true));

        // Mirroring happens on a spawned task.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(*transport.seen.lock().await, vec!["task.completed"]);
    }
}
