//! Health check registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use agentrun_runtime::FallbackStore;

/// One registered health check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Check name, shown in the health report.
    fn name(&self) -> &'static str;

    /// Run the check; `Err` carries the failure description.
    async fn check(&self) -> Result<(), String>;
}

/// Result of one health check run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckStatus {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub checks: Vec<CheckStatus>,
}

impl HealthReport {
    /// True when every check passed.
    pub fn healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Registered health checks, run together on `/health`.
#[derive(Default)]
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check.
    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    /// Run every registered check.
    pub async fn run(&self) -> HealthReport {
        let mut checks = Vec::with_capacity(self.checks.len());
        let mut all_healthy = true;
        for check in &self.checks {
            let result = check.check().await;
            let healthy = result.is_ok();
            all_healthy &= healthy;
            checks.push(CheckStatus {
                name: check.name().to_string(),
                healthy,
                error: result.err(),
            });
        }
        HealthReport {
            status: if all_healthy { "ok" } else { "degraded" },
            checks,
        }
    }
}

/// Baseline check: this service is up.
pub struct ServiceCheck;

#[async_trait]
impl HealthCheck for ServiceCheck {
    fn name(&self) -> &'static str {
        "agentrun-server"
    }

    async fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Database connectivity check, registered when a database is configured.
pub struct DatabaseCheck {
    store: Arc<FallbackStore>,
}

impl DatabaseCheck {
    /// Create a check against the given store.
    pub fn new(store: Arc<FallbackStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthCheck for DatabaseCheck {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        match self.store.durable() {
            Some(durable) => durable.ping().await.map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCheck;

    #[async_trait]
    impl HealthCheck for FailingCheck {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn check(&self) -> Result<(), String> {
            Err("broken".to_string())
        }
    }

    #[tokio::test]
    async fn test_all_passing_is_ok() {
        let mut registry = HealthRegistry::new();
        registry.register(Arc::new(ServiceCheck));

        let report = registry.run().await;
        assert!(report.healthy());
        assert_eq!(report.checks.len(), 1);
    }

    #[tokio::test]
    async fn test_one_failure_degrades() {
        let mut registry = HealthRegistry::new();
        registry.register(Arc::new(ServiceCheck));
        registry.register(Arc::new(FailingCheck));

        let report = registry.run().await;
        assert!(!report.healthy());
        assert_eq!(report.checks[1].error.as_deref(), Some("broken"));
    }
}
