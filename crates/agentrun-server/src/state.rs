//! Shared application state.

use std::sync::Arc;

use agentrun_runtime::{
    AgentCollaboration, AgentRuntime, BreakerRegistry, FallbackStore, NotificationService,
};

use crate::health::HealthRegistry;

/// Shared application state handed to every handler.
pub struct AppState {
    /// The task execution runtime.
    pub runtime: Arc<AgentRuntime>,

    /// The persistence layer (durable-or-memory).
    pub store: Arc<FallbackStore>,

    /// Collaboration registry fed by the event bus.
    pub collaboration: Arc<AgentCollaboration>,

    /// Notification fan-out fed by the event bus.
    pub notifications: Arc<NotificationService>,

    /// Circuit breakers by protected service name.
    pub breakers: Arc<BreakerRegistry>,

    /// Registered health checks.
    pub health: HealthRegistry,
}

impl AppState {
    /// Create shared state wrapped in Arc.
    pub fn new(
        runtime: Arc<AgentRuntime>,
        store: Arc<FallbackStore>,
        collaboration: Arc<AgentCollaboration>,
        notifications: Arc<NotificationService>,
        breakers: Arc<BreakerRegistry>,
        health: HealthRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            store,
            collaboration,
            notifications,
            breakers,
            health,
        })
    }
}
