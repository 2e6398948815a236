//! Upstream executor: one HTTP round trip to a resolved target.
//!
//! # Responsibilities
//! - Build the target URI from the service base URL plus the inbound
//!   path and query, carried over verbatim
//! - Copy inbound headers minus the transport-owned deny-list
//! - Stamp identity claims onto the forwarded request
//! - Enforce the per-attempt deadline
//! - Fully read the upstream response body

use axum::body::{Body, Bytes};
use axum::http::uri::Uri;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;
use url::Url;

use crate::auth::Identity;
use crate::upstream::{FailureReason, ServiceDescriptor};

/// Headers never copied to the outbound request; the transport layer
/// must set these itself. `HeaderName` is always lowercase, so the
/// match is case-insensitive by construction.
const DENIED_HEADERS: [&str; 5] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "upgrade",
];

/// What the gateway forwards on behalf of one inbound request.
///
/// Ephemeral: built per call from the inbound request and the resolved
/// service descriptor.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Inbound path and query, byte-for-byte. No re-encoding.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Overall deadline for the whole retrying call.
    pub deadline: Instant,
    pub identity: Option<Identity>,
}

/// A fully-read upstream response.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Performs single HTTP round trips against upstream services.
#[derive(Clone)]
pub struct UpstreamExecutor {
    client: Client<HttpConnector, Body>,
}

impl UpstreamExecutor {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// One attempt: build the outbound request, send it with the
    /// per-attempt deadline, read the body.
    ///
    /// The deadline for the attempt is the service timeout, clipped by
    /// whatever remains of the caller's overall deadline.
    pub async fn dispatch(
        &self,
        service: &ServiceDescriptor,
        req: &ProxyRequest,
    ) -> Result<ProxyResponse, FailureReason> {
        let now = Instant::now();
        if now >= req.deadline {
            return Err(FailureReason::Cancelled);
        }
        let budget = service.timeout.min(req.deadline - now);

        let uri = match target_uri(&service.base_url, &req.path_and_query) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(service = %service.name, error = %e, "failed to build target URI");
                return Err(FailureReason::Connect);
            }
        };

        let mut builder = Request::builder().method(req.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = outbound_headers(req);
        }
        let outbound = match builder.body(Body::from(req.body.clone())) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(service = %service.name, error = %e, "failed to build proxy request");
                return Err(FailureReason::Connect);
            }
        };

        let response = match tokio::time::timeout(budget, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(service = %service.name, error = %e, "upstream connection failed");
                return Err(FailureReason::Connect);
            }
            Err(_) => {
                if Instant::now() >= req.deadline {
                    return Err(FailureReason::Cancelled);
                }
                tracing::warn!(
                    service = %service.name,
                    timeout = ?service.timeout,
                    "upstream attempt timed out"
                );
                return Err(FailureReason::Timeout);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match axum::body::to_bytes(Body::new(response.into_body()), usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(service = %service.name, error = %e, "failed to read upstream body");
                return Err(FailureReason::Connect);
            }
        };

        tracing::debug!(
            service = %service.name,
            status = %status,
            response_size = body.len(),
            "request forwarded"
        );

        Ok(ProxyResponse { status, headers, body })
    }
}

impl Default for UpstreamExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Target URI: scheme and authority from the service base URL, path
/// and query from the inbound request, unmodified.
pub(crate) fn target_uri(base: &Url, path_and_query: &str) -> Result<Uri, axum::http::Error> {
    let host = base.host_str().unwrap_or("localhost");
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Uri::builder()
        .scheme(base.scheme())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
}

/// Headers for the outbound request: everything inbound except the
/// deny-list, preserving duplicates and order per key, plus identity
/// claim headers when the caller is authenticated.
pub(crate) fn outbound_headers(req: &ProxyRequest) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for (name, value) in req.headers.iter() {
        if DENIED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(identity) = &req.identity {
        apply_identity(identity, &mut headers);
    }

    headers
}

/// Stamp validated claims onto the forwarded request. `insert`, not
/// `append`: a client-supplied claim header must not survive.
fn apply_identity(identity: &Identity, headers: &mut HeaderMap) {
    let claims = [
        ("x-user-id", &identity.user_id),
        ("x-username", &identity.username),
        ("x-user-email", &identity.email),
        ("x-user-role", &identity.role),
    ];
    for (name, value) in claims {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => {
                tracing::warn!(header = name, "claim not representable as header value");
            }
        }
    }
}
