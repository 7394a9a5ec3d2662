//! Circuit breaker guarding fallible async operations.
//!
//! Prevents cascading failures by rejecting calls to an operation that has
//! recently failed too often, then probing it again after a cooldown.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Operations proceed normally.
    Closed,
    /// Operations are rejected until the cooldown elapses.
    Open,
    /// Cooldown elapsed; calls probe the operation to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase name for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Error from a breaker-protected call.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// Circuit is open; the operation was never invoked.
    Open { service: String },
    /// The operation ran and failed; the original error is preserved.
    Operation(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { service } => {
                write!(f, "Circuit breaker open for service: {}", service)
            }
            Self::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for BreakerError<E> {}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_attempt_at: Option<Instant>,
}

/// Snapshot of breaker state for diagnostics and metrics.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
}

/// A three-state circuit breaker scoped to one protected service name.
///
/// Breakers never share counters across names; each instance owns its
/// state exclusively.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker with default config.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, BreakerConfig::default())
    }

    /// Create a breaker with custom config.
    pub fn with_config(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_attempt_at: None,
            }),
        }
    }

    /// The protected service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, transitioning open -> half-open once the cooldown
    /// has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        self.refresh(&mut inner);
        inner.state
    }

    /// Snapshot of state and counters.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.inner.lock().unwrap();
        self.refresh(&mut inner);
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
        }
    }

    /// Execute an operation under breaker protection.
    ///
    /// While the circuit is open and inside its cooldown the operation is
    /// never invoked and the call fails fast with [`BreakerError::Open`].
    /// A failed operation has its error rethrown to the caller untouched.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().unwrap();
            self.refresh(&mut inner);
            if inner.state == CircuitState::Open {
                return Err(BreakerError::Open {
                    service: self.name.clone(),
                });
            }
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.refresh(&mut inner);
        inner.success_count += 1;
        if inner.state == CircuitState::HalfOpen
            && inner.success_count >= self.config.success_threshold
        {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
            inner.success_count = 0;
            inner.next_attempt_at = None;
            tracing::info!(circuit = %self.name, "Circuit breaker closed");
        }
    }

    /// Record a failed operation.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.refresh(&mut inner);
        inner.failure_count += 1;
        if inner.failure_count >= self.config.failure_threshold {
            let failures = inner.failure_count;
            inner.state = CircuitState::Open;
            inner.next_attempt_at = Some(Instant::now() + self.config.open_timeout);
            inner.failure_count = 0;
            inner.success_count = 0;
            tracing::warn!(
                circuit = %self.name,
                "Circuit breaker opened after {} failures",
                failures
            );
        }
    }

    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open {
            if let Some(next_attempt) = inner.next_attempt_at {
                if Instant::now() >= next_attempt {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    inner.next_attempt_at = None;
                    tracing::info!(
                        circuit = %self.name,
                        "Circuit breaker transitioning to half-open"
                    );
                }
            }
        }
    }
}

/// Collection of breakers keyed by protected service name.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: BreakerConfig,
}

impl BreakerRegistry {
    /// Create a registry with a default config for new breakers.
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    /// Get or create the breaker for a service name.
    pub async fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(breaker) = breakers.get(name) {
                return breaker.clone();
            }
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_config(
                    name,
                    self.default_config.clone(),
                ))
            })
            .clone()
    }

    /// Names of all registered breakers.
    pub async fn names(&self) -> Vec<String> {
        self.breakers.read().await.keys().cloned().collect()
    }

    /// Snapshots of every registered breaker, sorted by name.
    pub async fn snapshots(&self) -> Vec<(String, BreakerSnapshot)> {
        let breakers = self.breakers.read().await;
        let mut all: Vec<(String, BreakerSnapshot)> = breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(failures: u32, successes: u32, timeout_ms: u64) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: failures,
            success_threshold: successes,
            open_timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let cb = CircuitBreaker::new("test");
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_failures() {
        let cb = CircuitBreaker::with_config("test", config(3, 1, 1_000));

        for _ in 0..3 {
            let result: Result<(), _> = cb.execute(|| async { Err::<(), _>("boom") }).await;
            assert!(matches!(result, Err(BreakerError::Operation(_))));
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let cb = CircuitBreaker::with_config("test", config(3, 1, 60_000));
        for _ in 0..3 {
            let _ = cb.execute(|| async { Err::<(), _>("boom") }).await;
        }

        let invocations = AtomicU32::new(0);
        let result: Result<(), BreakerError<&str>> = cb
            .execute(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recovers_through_half_open() {
        let cb = CircuitBreaker::with_config("test", config(1, 2, 20));

        let _ = cb.execute(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let _ = cb.execute(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let _ = cb.execute(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failure_rethrows_original_error() {
        let cb = CircuitBreaker::new("test");
        let result: Result<(), _> = cb.execute(|| async { Err::<(), _>("original") }).await;
        match result {
            Err(BreakerError::Operation(e)) => assert_eq!(e, "original"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_registry_scopes_by_name() {
        let registry = BreakerRegistry::default();
        let a = registry.get("provider").await;
        let b = registry.get("database").await;
        let a_again = registry.get("provider").await;

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));

        a.record_failure();
        assert_eq!(a.snapshot().failure_count, 1);
        assert_eq!(b.snapshot().failure_count, 0);

        let mut names = registry.names().await;
        names.sort();
        assert_eq!(names, vec!["database".to_string(), "provider".to_string()]);
    }
}
