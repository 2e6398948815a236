//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → service name resolved at the HTTP boundary
//!     → router.rs: registry lookup, breaker-wrapped forward,
//!       error translation
//! ```

pub mod router;

pub use router::Router;
