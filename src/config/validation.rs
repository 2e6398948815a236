//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check service definitions: unique names, parsable URLs, sane budgets
//! - Validate value ranges before config is accepted into the system
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// One semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, field: impl Into<String>, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.into(),
        message: message.into(),
    });
}

/// Validate the whole configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        err(
            &mut errors,
            "listener.bind_address",
            format!("not a valid socket address: {}", config.listener.bind_address),
        );
    }

    if config.services.is_empty() {
        err(&mut errors, "services", "no upstream services configured");
    }

    let mut names = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        let field = format!("services[{i}]");

        if service.name.is_empty() {
            err(&mut errors, format!("{field}.name"), "name is empty");
        } else if service.name.contains('/') {
            // The name doubles as a path segment.
            err(
                &mut errors,
                format!("{field}.name"),
                format!("name must be a single path segment: {}", service.name),
            );
        }
        if !names.insert(service.name.as_str()) {
            err(
                &mut errors,
                format!("{field}.name"),
                format!("duplicate service name: {}", service.name),
            );
        }

        match Url::parse(&service.url) {
            Ok(url) => {
                if url.scheme() != "http" {
                    err(
                        &mut errors,
                        format!("{field}.url"),
                        format!("unsupported scheme: {}", url.scheme()),
                    );
                }
                if url.host_str().is_none() {
                    err(&mut errors, format!("{field}.url"), "URL has no host");
                }
            }
            Err(e) => err(&mut errors, format!("{field}.url"), format!("invalid URL: {e}")),
        }

        if service.timeout_secs == 0 {
            err(&mut errors, format!("{field}.timeout_secs"), "must be at least 1");
        }
        if service.max_retries == 0 {
            err(&mut errors, format!("{field}.max_retries"), "must be at least 1");
        }
    }

    if config.jwt.secret_key.is_empty() {
        err(&mut errors, "jwt.secret_key", "secret key is empty");
    }

    let ratio = config.circuit_breaker.failure_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        err(
            &mut errors,
            "circuit_breaker.failure_ratio",
            format!("must be within (0, 1], got {ratio}"),
        );
    }
    if config.circuit_breaker.min_requests == 0 {
        err(&mut errors, "circuit_breaker.min_requests", "must be at least 1");
    }
    if config.circuit_breaker.max_probes == 0 {
        err(&mut errors, "circuit_breaker.max_probes", "must be at least 1");
    }

    if config.timeouts.request_secs == 0 {
        err(&mut errors, "timeouts.request_secs", "must be at least 1");
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_second == 0 {
        err(
            &mut errors,
            "rate_limit.requests_per_second",
            "must be at least 1 when rate limiting is enabled",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
