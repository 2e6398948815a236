//! Gateway-level error taxonomy.
//!
//! Every variant maps to one outbound status code; nothing here is
//! fatal to the process. A failing upstream surfaces as one of these,
//! never as a crash or as blocked traffic to other upstreams.

use axum::http::StatusCode;
use thiserror::Error;

use crate::upstream::FailureReason;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Unknown service name: configuration or caller error.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// The breaker is protecting a failing upstream; retry after the
    /// cool-down.
    #[error("circuit open for service: {0}")]
    CircuitOpen(String),

    /// Transport kept failing across every attempt.
    #[error("service {service} unavailable after {attempts} attempts: {reason}")]
    RetriesExhausted {
        service: String,
        attempts: u32,
        reason: FailureReason,
    },

    /// The caller's deadline expired before the upstream answered.
    #[error("request to {0} abandoned: caller deadline expired")]
    Cancelled(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}
