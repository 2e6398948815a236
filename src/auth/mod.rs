//! Authentication collaborator.
//!
//! Yields a validated identity or a rejection; the routing core only
//! ever sees the result, never the token.

pub mod jwt;

pub use jwt::{extract_bearer, AuthError, Claims, Identity, TokenValidator};
