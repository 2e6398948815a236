//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → retry controller (bounded attempts, linear backoff)
//!     → circuit_breaker.rs (track outcomes, open circuit on threshold)
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream service; state is never shared across services
//! - Fail fast in Open state (no waiting for a timeout)
//! - Bounded probes in Half-Open prevent hammering a recovering upstream
//! - The breaker wraps an arbitrary fallible operation, not HTTP

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{BreakerError, BreakerSettings, CircuitBreaker, CircuitState, ErrorClass};
