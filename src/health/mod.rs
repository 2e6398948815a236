//! Health subsystem.
//!
//! The gateway derives its health view passively, from the circuit
//! breaker of each service; there is no active probing. The aggregate
//! is exposed on the public health endpoint.

pub mod aggregator;

pub use aggregator::{HealthAggregator, ServiceStatus};
