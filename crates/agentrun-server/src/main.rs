//! AgentRun Server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use agentrun_runtime::{
    executor, AgentCollaboration, AgentRuntime, BreakerRegistry, DurableStore, EventBus,
    FallbackStore, NotificationService, PersistenceStore, RuntimeConfig, TracingSink,
};

use agentrun_server::health::{DatabaseCheck, HealthRegistry, ServiceCheck};
use agentrun_server::transport::TracingTransport;
use agentrun_server::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load config
    let config = RuntimeConfig::from_env();
    let server_config = ServerConfig::from_env();
    let http_addr: SocketAddr = server_config.http_addr.parse()?;

    // Persistence: durable when a database is configured, in-memory
    // fallback otherwise. A failed connection degrades, it does not abort.
    let durable = match &config.database_url {
        Some(url) => match DurableStore::connect(url).await {
            Ok(store) => {
                info!("Durable store connected");
                Some(store)
            }
            Err(e) => {
                warn!(error = %e, "Database unavailable, running with in-memory storage");
                None
            }
        },
        None => {
            info!("No database configured, running with in-memory storage");
            None
        }
    };
    let database_configured = durable.is_some();
    let store = Arc::new(FallbackStore::new(durable));

    // Event bus, optionally mirrored to a distributed transport.
    let bus = if config.distributed_events {
        EventBus::new(config.bus_capacity).with_transport(Arc::new(TracingTransport))
    } else {
        EventBus::new(config.bus_capacity)
    };

    // Executor strategy and its circuit breaker.
    let executor = executor::from_config(&config);
    info!(executor = executor.name(), "Executor selected");
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let breaker = breakers.get("executor").await;

    let store_handle: Arc<dyn PersistenceStore> = store.clone();
    let runtime = Arc::new(AgentRuntime::new(
        store_handle,
        bus.clone(),
        executor,
        breaker,
    ));

    // Bus consumers.
    let collaboration = Arc::new(AgentCollaboration::new(bus.clone()));
    let _collaboration_listener = collaboration.spawn();
    let notifications = Arc::new(NotificationService::new(bus.clone(), Arc::new(TracingSink)));
    let _notification_listener = notifications.spawn();

    // Health checks.
    let mut health = HealthRegistry::new();
    health.register(Arc::new(ServiceCheck));
    if database_configured {
        health.register(Arc::new(DatabaseCheck::new(store.clone())));
    }

    let state = AppState::new(
        runtime,
        store,
        collaboration,
        notifications,
        breakers,
        health,
    );

    let router = create_router(state);
    let listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
