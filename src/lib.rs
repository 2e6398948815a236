//! API gateway with per-service circuit breaking.
//!
//! Authenticates inbound requests, forwards them to named upstream
//! services, and keeps serving healthy upstreams when one backend
//! degrades. Each service gets its own circuit breaker, retry budget,
//! and timeout; the aggregate breaker state feeds the health endpoint.

pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
