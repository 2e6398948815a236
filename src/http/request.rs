//! Request identification.
//!
//! # Responsibilities
//! - Stamp a unique request ID as early as possible
//! - Leave caller-supplied IDs untouched so traces can span systems
//!
//! The ID travels with the request headers, so the executor forwards
//! it upstream like any other header.

use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request};
use tower::{Layer, Service};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer that assigns a UUID v4 request ID when none is present.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestId<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestId { inner }
    }
}

#[derive(Clone)]
pub struct RequestId<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestId<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if !req.headers().contains_key(REQUEST_ID_HEADER) {
            if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
                req.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
        }
        self.inner.call(req)
    }
}
