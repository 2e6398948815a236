//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (read, deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → schema.rs types, read-only for the life of the process
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BreakerConfig, CorsConfig, GatewayConfig, JwtConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, RetryConfig, ServiceConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
