//! AgentRun Runtime
//!
//! The fault-isolated task execution core: the `AgentRuntime` lifecycle
//! state machine, the circuit breaker guarding executors, the trusted and
//! sandboxed executor strategies, the durable-or-in-memory persistence
//! layer, and the event-bus consumers (collaboration, notifications).
//!
//! Everything here is constructed explicitly and wired by the caller; there
//! is no ambient global state.

pub mod breaker;
pub mod bus;
pub mod collaboration;
pub mod config;
pub mod executor;
pub mod notify;
pub mod runtime;
pub mod store;

// Re-export commonly used types
pub use breaker::{BreakerConfig, BreakerError, BreakerRegistry, CircuitBreaker, CircuitState};
pub use bus::{DistributedTransport, EventBus, TransportError};
pub use collaboration::{AgentCollaboration, AgentState};
pub use config::{ExecutorKind, RuntimeConfig};
pub use executor::{Executor, ExecutorError, SandboxedExecutor, TrustedExecutor};
pub use notify::{Notification, NotificationService, NotificationSink, TracingSink};
pub use runtime::{AgentRuntime, AgentStatus};
pub use store::{DurableStore, FallbackStore, InMemoryStore, PersistenceStore};
