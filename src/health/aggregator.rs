//! Aggregate health view over the per-service breakers.
//!
//! Pure reads of breaker state for observability endpoints; never
//! consulted for routing decisions.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::resilience::CircuitState;
use crate::upstream::ServiceRegistry;

/// Observable status of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    Closed,
    Open,
    HalfOpen,
    /// The name is not registered.
    Unknown,
}

impl From<CircuitState> for ServiceStatus {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => ServiceStatus::Closed,
            CircuitState::Open => ServiceStatus::Open,
            CircuitState::HalfOpen => ServiceStatus::HalfOpen,
        }
    }
}

#[derive(Clone)]
pub struct HealthAggregator {
    registry: Arc<ServiceRegistry>,
}

impl HealthAggregator {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub fn status_of(&self, service_name: &str) -> ServiceStatus {
        self.registry
            .get(service_name)
            .map(|entry| entry.breaker().state().into())
            .unwrap_or(ServiceStatus::Unknown)
    }

    /// Status of every registered service, in stable name order.
    pub fn status_of_all(&self) -> BTreeMap<String, ServiceStatus> {
        self.registry
            .names()
            .map(|name| (name.to_string(), self.status_of(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::resilience::BreakerSettings;
    use crate::upstream::{FailureReason, UpstreamError};

    fn aggregator() -> (Arc<ServiceRegistry>, HealthAggregator) {
        let services: Vec<ServiceConfig> = ["orders", "users"]
            .iter()
            .map(|name| ServiceConfig {
                name: name.to_string(),
                url: "http://127.0.0.1:9000".to_string(),
                timeout_secs: 1,
                max_retries: 1,
            })
            .collect();
        let registry =
            Arc::new(ServiceRegistry::from_config(&services, BreakerSettings::default()).unwrap());
        (registry.clone(), HealthAggregator::new(registry))
    }

    #[tokio::test]
    async fn unknown_service_reports_unknown() {
        let (_, health) = aggregator();
        assert_eq!(health.status_of("payments"), ServiceStatus::Unknown);
    }

    #[tokio::test]
    async fn reflects_breaker_states() {
        let (registry, health) = aggregator();
        assert_eq!(health.status_of("orders"), ServiceStatus::Closed);

        let breaker = registry.get("orders").unwrap().breaker();
        for _ in 0..3 {
            let _ = breaker
                .execute::<(), _, _, _>(|| async {
                    Err(UpstreamError::Exhausted {
                        attempts: 1,
                        last: FailureReason::Timeout,
                    })
                })
                .await;
        }

        let all = health.status_of_all();
        assert_eq!(all["orders"], ServiceStatus::Open);
        assert_eq!(all["users"], ServiceStatus::Closed);
    }
}
