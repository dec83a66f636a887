//! Admission control in front of the external code execution service.
//!
//! Every submission passes through one explicitly constructed
//! [`AdmissionDispatcher`], which enforces a concurrency ceiling, an interval
//! rate cap and a per-call timeout, all behind a [`CircuitBreaker`] tracking
//! the health of the execution backend.

pub mod circuit_breaker;
pub mod dispatcher;

pub use circuit_breaker::{BreakerState, BreakerStats, CircuitBreaker, CircuitBreakerConfig};
pub use dispatcher::{AdmissionDispatcher, DispatcherConfig, DispatcherStats};
