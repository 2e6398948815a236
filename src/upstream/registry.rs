//! Service registry.
//!
//! # Responsibilities
//! - Map service name → descriptor (target URL, timeout, retry budget)
//! - Own exactly one circuit breaker per configured service
//! - Stay read-only after startup
//!
//! # Design Decisions
//! - Descriptor and breaker live in one entry, so the two can never
//!   disagree on which services exist
//! - Breakers are created once at startup and never recreated

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::config::ServiceConfig;
use crate::resilience::{BreakerSettings, CircuitBreaker};

/// Immutable description of one configured upstream.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ServiceDescriptor {
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: cfg.name.clone(),
            base_url: Url::parse(&cfg.url)?,
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_retries: cfg.max_retries,
        })
    }
}

/// One registered upstream: its descriptor and the breaker guarding it.
#[derive(Debug)]
pub struct ServiceEntry {
    descriptor: ServiceDescriptor,
    breaker: CircuitBreaker,
}

impl ServiceEntry {
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// All configured upstreams, keyed by service name.
///
/// Built once from configuration; concurrent readers need no
/// synchronization.
#[derive(Debug)]
pub struct ServiceRegistry {
    entries: HashMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn from_config(
        services: &[ServiceConfig],
        breaker_settings: BreakerSettings,
    ) -> Result<Self, url::ParseError> {
        let mut entries = HashMap::with_capacity(services.len());
        for cfg in services {
            let descriptor = ServiceDescriptor::from_config(cfg)?;
            let breaker = CircuitBreaker::new(cfg.name.clone(), breaker_settings.clone());
            entries.insert(cfg.name.clone(), ServiceEntry { descriptor, breaker });
        }
        tracing::info!(count = entries.len(), "service registry initialized");
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;

    fn service(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            url: "http://127.0.0.1:9000".to_string(),
            timeout_secs: 5,
            max_retries: 2,
        }
    }

    #[test]
    fn one_breaker_per_service() {
        let registry = ServiceRegistry::from_config(
            &[service("orders"), service("users")],
            BreakerSettings::default(),
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let entry = registry.get("orders").unwrap();
        assert_eq!(entry.descriptor().name, "orders");
        assert_eq!(entry.breaker().name(), "orders");
        assert_eq!(entry.breaker().state(), CircuitState::Closed);
        assert!(registry.get("payments").is_none());
    }

    #[test]
    fn rejects_invalid_url() {
        let mut bad = service("orders");
        bad.url = "not a url".to_string();
        assert!(ServiceRegistry::from_config(&[bad], BreakerSettings::default()).is_err());
    }
}
