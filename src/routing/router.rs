//! Request routing over the service registry.
//!
//! # Responsibilities
//! - Resolve a service name to its registry entry
//! - Invoke that service's breaker over the retrying executor call
//! - Translate failures into the gateway error taxonomy
//!
//! # Design Decisions
//! - No retry or breaker logic lives here; the Router is orchestration
//!   and error translation only
//! - The breaker receives a closure, keeping it ignorant of HTTP

use std::sync::Arc;

use crate::error::GatewayError;
use crate::resilience::BreakerError;
use crate::upstream::{
    ProxyRequest, ProxyResponse, RetryPolicy, ServiceRegistry, UpstreamError, UpstreamExecutor,
};

pub struct Router {
    registry: Arc<ServiceRegistry>,
    executor: UpstreamExecutor,
    retry: RetryPolicy,
}

impl Router {
    pub fn new(registry: Arc<ServiceRegistry>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            executor: UpstreamExecutor::new(),
            retry,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Forward `req` to the named service, under its circuit breaker.
    ///
    /// A response received from the upstream is returned verbatim,
    /// whatever its status code; the gateway is transparent to
    /// backend-chosen statuses.
    pub async fn route(
        &self,
        service_name: &str,
        req: ProxyRequest,
    ) -> Result<ProxyResponse, GatewayError> {
        let entry = self
            .registry
            .get(service_name)
            .ok_or_else(|| GatewayError::ServiceNotFound(service_name.to_string()))?;
        let service = entry.descriptor();

        let result = entry
            .breaker()
            .execute(|| {
                self.retry.run(service.max_retries, req.deadline, |_| {
                    self.executor.dispatch(service, &req)
                })
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(BreakerError::Open) => {
                tracing::warn!(service = %service_name, "circuit open, request short-circuited");
                Err(GatewayError::CircuitOpen(service_name.to_string()))
            }
            Err(BreakerError::Inner(UpstreamError::Cancelled)) => {
                Err(GatewayError::Cancelled(service_name.to_string()))
            }
            Err(BreakerError::Inner(UpstreamError::Exhausted { attempts, last })) => {
                tracing::error!(
                    service = %service_name,
                    attempts,
                    reason = %last,
                    "upstream unavailable"
                );
                Err(GatewayError::RetriesExhausted {
                    service: service_name.to_string(),
                    attempts,
                    reason: last,
                })
            }
        }
    }
}
