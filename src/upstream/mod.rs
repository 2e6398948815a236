//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Router resolves a service
//!     → retry.rs (bounded attempts with backoff)
//!     → executor.rs (one HTTP round trip, header filtering, timeout)
//!     → registry.rs (descriptor + breaker looked up by service name)
//! ```

pub mod executor;
pub mod registry;
pub mod retry;

use thiserror::Error;

use crate::resilience::ErrorClass;

pub use executor::{ProxyRequest, ProxyResponse, UpstreamExecutor};
pub use registry::{ServiceDescriptor, ServiceEntry, ServiceRegistry};
pub use retry::RetryPolicy;

/// Why a single upstream attempt produced no response.
///
/// A received HTTP response, whatever its status code, is not a
/// failure at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("attempt timed out")]
    Timeout,

    #[error("connection failed")]
    Connect,

    #[error("caller deadline expired")]
    Cancelled,
}

/// Terminal failure of the whole retrying call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("all {attempts} attempts failed: {last}")]
    Exhausted { attempts: u32, last: FailureReason },

    #[error("caller deadline expired")]
    Cancelled,
}

impl ErrorClass for UpstreamError {
    fn counts_as_failure(&self) -> bool {
        // Caller abandonment says nothing about upstream health.
        !matches!(self, UpstreamError::Cancelled)
    }
}
