//! Inbound middleware: authentication and rate limiting.
//!
//! Both sit in front of the proxy routes only; the health endpoint
//! stays public.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::extract_bearer;
use crate::http::request::REQUEST_ID_HEADER;
use crate::http::response::json_error;
use crate::http::server::AppState;

fn request_id_of(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Reject the request unless it carries a valid bearer token; on
/// success the validated identity rides along as a request extension.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let identity = match extract_bearer(header).and_then(|token| state.validator.validate(token)) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(error = %e, "request rejected");
            return json_error(
                StatusCode::UNAUTHORIZED,
                &e.to_string(),
                request_id_of(&request).as_deref(),
            );
        }
    };

    tracing::debug!(user_id = %identity.user_id, username = %identity.username, "token validated");
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Per-client-IP rate limiting; a no-op unless enabled in config.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = &state.limiter else {
        return next.run(request).await;
    };

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !limiter.check(&client) {
        tracing::warn!(client = %client, "rate limit exceeded");
        return json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded",
            request_id_of(&request).as_deref(),
        );
    }

    next.run(request).await
}
