//! Circuit breaker guarding calls to the execution service

use std::future::Future;
use std::time::Duration;

use arena_models::{ArenaError, ArenaResult};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures while Closed before the circuit opens
    pub failure_threshold: u32,
    /// Consecutive successes while HalfOpen before the circuit closes
    pub success_threshold: u32,
    /// Time after the last failure before an Open circuit allows a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Snapshot of breaker counters
#[derive(Debug, Clone, Default)]
pub struct BreakerStats {
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
    last_failure_instant: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Stateful guard in front of the execution service.
///
/// All state transitions and counter updates for a single call outcome are
/// applied under one mutex, so concurrent `execute` calls observe a
/// consistent state machine.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                total_requests: 0,
                total_failures: 0,
                total_successes: 0,
                last_failure_instant: None,
                last_failure_at: None,
            }),
        }
    }

    /// Run `task` through the breaker.
    ///
    /// When the circuit is Open and the reset timeout has not elapsed the
    /// task is rejected without being polled. Once the timeout elapses the
    /// next call transitions to HalfOpen and probes the backend.
    pub async fn execute<T, F>(&self, task: F) -> ArenaResult<T>
    where
        F: Future<Output = ArenaResult<T>>,
    {
        {
            let mut inner = self.inner.lock().await;
            inner.total_requests += 1;

            if inner.state == BreakerState::Open {
                let elapsed = inner.last_failure_instant.map(|t| t.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed >= self.config.reset_timeout => {
                        inner.state = BreakerState::HalfOpen;
                        inner.consecutive_successes = 0;
                        info!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            "circuit breaker probing recovery (half-open)"
                        );
                    }
                    _ => {
                        return Err(ArenaError::ServiceUnavailable {
                            last_failure_at: inner.last_failure_at,
                        });
                    }
                }
            }
        }

        match task.await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure().await;
                Err(err)
            }
        }
    }

    /// True when a call right now would be rejected without reaching the
    /// backend. Used by the dispatcher to fail fast before enqueuing.
    pub async fn rejects(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.state == BreakerState::Open
            && !matches!(
                inner.last_failure_instant,
                Some(t) if t.elapsed() >= self.config.reset_timeout
            )
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.total_successes += 1;
        inner.consecutive_failures = 0;

        if inner.state == BreakerState::HalfOpen {
            inner.consecutive_successes += 1;
            if inner.consecutive_successes >= self.config.success_threshold {
                inner.state = BreakerState::Closed;
                inner.consecutive_successes = 0;
                info!("circuit breaker closed after successful recovery");
            }
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.total_failures += 1;
        inner.consecutive_successes = 0;
        inner.last_failure_instant = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());

        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    warn!(
                        consecutive_failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                warn!("circuit breaker reopened after failed probe");
            }
            BreakerState::Open => {}
        }
    }

    /// Force the breaker Closed, zeroing consecutive counters.
    ///
    /// Lifetime totals are preserved; this is an operator-triggered recovery
    /// path, not part of normal state transitions.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        info!("circuit breaker reset by operator");
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    pub async fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_failure_at
    }

    pub async fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().await;
        BreakerStats {
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
