//! HTTP boundary.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (request ID)
//!     → middleware.rs (rate limit, JWT → Identity)
//!     → server.rs (service resolution, dispatch to routing engine)
//!     → response.rs (upstream passthrough or JSON error)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, GatewayServer};
