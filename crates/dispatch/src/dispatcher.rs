//! Bounded, rate-limited submission dispatch

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arena_models::{ArenaError, ArenaResult};
use tokio::sync::{watch, Mutex, Notify, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{BreakerState, CircuitBreaker};

/// Dispatcher configuration, fixed at construction time
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Simultaneous in-flight calls to the execution service
    pub max_concurrent: usize,
    /// Admissions allowed per rate-limit interval
    pub interval_cap: u32,
    /// Length of one rate-limit interval
    pub interval: Duration,
    /// Per-call deadline; an elapsed deadline counts as a failure
    pub task_timeout: Duration,
    /// Hard ceiling on queued-but-not-started work
    pub backlog_limit: usize,
    /// Soft backlog threshold for the health signal
    pub soft_backlog: usize,
    /// Soft in-flight threshold for the health signal
    pub soft_inflight: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            interval_cap: 20,
            interval: Duration::from_millis(1000),
            task_timeout: Duration::from_millis(30_000),
            backlog_limit: 100,
            soft_backlog: 50,
            soft_inflight: 8,
        }
    }
}

/// Snapshot of dispatcher counters
#[derive(Debug, Clone)]
pub struct DispatcherStats {
    pub submissions: u64,
    pub errors: u64,
    pub queued: usize,
    pub in_flight: usize,
}

impl DispatcherStats {
    /// Rolling lifetime success rate; 1.0 before any submission
    pub fn success_rate(&self) -> f64 {
        if self.submissions == 0 {
            1.0
        } else {
            (self.submissions - self.errors) as f64 / self.submissions as f64
        }
    }
}

struct IntervalWindow {
    started_at: Instant,
    admitted: u32,
}

/// Fixed-window admission gate: at most `cap` admissions per `interval`,
/// excess callers wait for the next window instead of running early.
struct IntervalGate {
    cap: u32,
    interval: Duration,
    window: Mutex<IntervalWindow>,
}

impl IntervalGate {
    fn new(cap: u32, interval: Duration) -> Self {
        Self {
            cap,
            interval,
            window: Mutex::new(IntervalWindow {
                started_at: Instant::now(),
                admitted: 0,
            }),
        }
    }

    async fn admit(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                if now.duration_since(window.started_at) >= self.interval {
                    window.started_at = now;
                    window.admitted = 0;
                }
                if window.admitted < self.cap {
                    window.admitted += 1;
                    return;
                }
                self.interval - now.duration_since(window.started_at)
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate cap reached, waiting for next interval");
            tokio::time::sleep(wait).await;
        }
    }
}

/// The single chokepoint through which all submission work reaches the
/// external execution service.
///
/// Explicitly constructed and dependency-injected; there is no global
/// instance and no hidden reset outside the administrative calls.
pub struct AdmissionDispatcher {
    config: DispatcherConfig,
    breaker: Arc<CircuitBreaker>,
    slots: Semaphore,
    gate: IntervalGate,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    submissions: AtomicU64,
    errors: AtomicU64,
    pause_tx: watch::Sender<bool>,
    clear_tx: watch::Sender<u64>,
    idle: Notify,
}

impl AdmissionDispatcher {
    pub fn new(config: DispatcherConfig, breaker: Arc<CircuitBreaker>) -> Self {
        let (pause_tx, _) = watch::channel(false);
        let (clear_tx, _) = watch::channel(0u64);
        Self {
            slots: Semaphore::new(config.max_concurrent),
            gate: IntervalGate::new(config.interval_cap, config.interval),
            config,
            breaker,
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            submissions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            pause_tx,
            clear_tx,
            idle: Notify::new(),
        }
    }

    /// Submit one unit of work to the execution service.
    ///
    /// Pre-checks run synchronously before anything is enqueued: an open
    /// circuit fails with `ServiceUnavailable`, a full backlog with
    /// `Overloaded`. Admitted work is bounded by the concurrency ceiling,
    /// the interval cap and the per-call timeout, and its outcome is always
    /// recorded by the circuit breaker. Nothing here retries.
    pub async fn submit<T, F>(&self, task: F) -> ArenaResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.breaker.rejects().await {
            return Err(ArenaError::ServiceUnavailable {
                last_failure_at: self.breaker.last_failure_at().await,
            });
        }

        // The incoming submission counts toward the backlog: admitting it
        // with the queue already at the limit would push pending work one
        // past the ceiling.
        let backlog = self.queued.load(Ordering::Acquire);
        if backlog >= self.config.backlog_limit {
            warn!(
                backlog = backlog,
                limit = self.config.backlog_limit,
                "submission rejected: backlog ceiling reached"
            );
            return Err(ArenaError::Overloaded {
                backlog,
                limit: self.config.backlog_limit,
            });
        }

        self.submissions.fetch_add(1, Ordering::Relaxed);
        self.queued.fetch_add(1, Ordering::AcqRel);
        let enqueued_at = Instant::now();
        let epoch = *self.clear_tx.borrow();

        let admitted = tokio::select! {
            permit = self.admit() => permit,
            _ = self.wait_cleared(epoch) => None,
        };

        let _permit = match admitted {
            Some(permit) => permit,
            None => {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.notify_if_idle();
                return Err(ArenaError::SubmissionFailed {
                    reason: "submission queue cleared".to_string(),
                });
            }
        };

        // In-flight goes up before queued goes down so an idle waiter never
        // observes both at zero while work is still moving.
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.queued.fetch_sub(1, Ordering::AcqRel);
        debug!(
            queue_wait_ms = enqueued_at.elapsed().as_millis() as u64,
            "submission admitted"
        );

        let timeout = self.config.task_timeout;
        let result = self
            .breaker
            .execute(async {
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(ArenaError::SubmissionFailed {
                        reason: err.to_string(),
                    }),
                    Err(_) => Err(ArenaError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            })
            .await;

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.notify_if_idle();

        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Wait through the pause gate, a concurrency slot and the rate limiter.
    async fn admit(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        self.wait_resumed().await;
        // The semaphore is never closed while the dispatcher is alive.
        let permit = self.slots.acquire().await.ok()?;
        self.gate.admit().await;
        Some(permit)
    }

    async fn wait_resumed(&self) {
        let mut rx = self.pause_tx.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn wait_cleared(&self, epoch: u64) {
        let mut rx = self.clear_tx.subscribe();
        loop {
            if *rx.borrow_and_update() != epoch {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender lives in self; treat a closed channel as "never cleared".
                std::future::pending::<()>().await;
            }
        }
    }

    fn notify_if_idle(&self) {
        if self.queued.load(Ordering::Acquire) == 0 && self.in_flight.load(Ordering::Acquire) == 0
        {
            self.idle.notify_waiters();
        }
    }

    /// Conservative health signal for upstream load shedding, stricter than
    /// the hard admission checks.
    pub async fn is_healthy(&self) -> bool {
        self.breaker.state().await == BreakerState::Closed
            && self.queued.load(Ordering::Acquire) < self.config.soft_backlog
            && self.in_flight.load(Ordering::Acquire) < self.config.soft_inflight
    }

    /// Stop admitting queued work. In-flight work is never cancelled.
    pub fn pause(&self) {
        info!("dispatcher paused");
        let _ = self.pause_tx.send(true);
    }

    /// Resume admitting queued work.
    pub fn resume(&self) {
        info!("dispatcher resumed");
        let _ = self.pause_tx.send(false);
    }

    /// Drop all queued-but-not-started work. Their `submit` calls resolve
    /// with `SubmissionFailed`. In-flight work is untouched.
    pub fn clear(&self) {
        let dropped = self.queued.load(Ordering::Acquire);
        info!(dropped = dropped, "dispatcher queue cleared");
        self.clear_tx.send_modify(|e| *e += 1);
    }

    /// Operator-triggered breaker recovery.
    pub async fn reset_breaker(&self) {
        self.breaker.reset().await;
    }

    /// Resolves once no work is queued or in flight. Used to drain on
    /// shutdown.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.queued.load(Ordering::Acquire) == 0
                && self.in_flight.load(Ordering::Acquire) == 0
            {
                return;
            }
            notified.await;
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submissions: self.submissions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }
}
