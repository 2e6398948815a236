//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from the
//! TOML config file; everything is read once at startup and never
//! re-read at runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::BreakerSettings;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Upstream service definitions. One target URL per named service.
    pub services: Vec<ServiceConfig>,

    /// JWT validation settings.
    pub jwt: JwtConfig,

    /// CORS settings.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry backoff configuration.
    pub retries: RetryConfig,

    /// Circuit breaker tunables, shared by every service's breaker.
    pub circuit_breaker: BreakerConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// One upstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name; also the leading path segment that routes
    /// to this service.
    pub name: String,

    /// Target base URL (e.g., "http://127.0.0.1:3000").
    pub url: String,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts for one logical request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_service_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// JWT validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HS256 signing secret shared with the token issuer.
    pub secret_key: String,

    /// Expected issuer claim; unchecked when absent.
    pub issuer: Option<String>,

    /// Expected audience claim; unchecked when absent.
    pub audience: Option<String>,

    /// Lifetime of tokens minted by the gateway itself (CLI/tests).
    pub expires_in_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            secret_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            issuer: None,
            audience: None,
            expires_in_secs: 3600,
        }
    }
}

/// CORS settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any.
    pub allowed_origins: Vec<String>,

    /// Allowed methods.
    pub allowed_methods: Vec<String>,

    /// Allowed request headers.
    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: ["content-type", "authorization"].map(String::from).to_vec(),
            max_age_secs: 3600,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall deadline for one inbound request, retries and backoff
    /// included.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Retry backoff configuration. The retry *count* is per-service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Backoff step in milliseconds; retry n sleeps n × step.
    pub backoff_step_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { backoff_step_ms: 100 }
    }
}

/// Circuit breaker tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Rolling counting window while Closed, in milliseconds.
    pub counting_interval_ms: u64,

    /// Open → Half-Open cool-down in seconds.
    pub cooldown_secs: u64,

    /// Minimum samples before a trip decision.
    pub min_requests: u32,

    /// Failure ratio that trips the breaker.
    pub failure_ratio: f64,

    /// Concurrent probe bound while Half-Open.
    pub max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            counting_interval_ms: 1_000,
            cooldown_secs: 5,
            min_requests: 3,
            failure_ratio: 0.6,
            max_probes: 10,
        }
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(cfg: &BreakerConfig) -> Self {
        Self {
            counting_interval: Duration::from_millis(cfg.counting_interval_ms),
            cooldown: Duration::from_secs(cfg.cooldown_secs),
            min_requests: cfg.min_requests,
            failure_ratio: cfg.failure_ratio,
            max_probes: cfg.max_probes,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable per-client rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON logs instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
