//! Response translation.
//!
//! # Responsibilities
//! - Turn an upstream ProxyResponse back into an outbound response
//! - Strip transport framing headers the server must set itself
//! - Render gateway errors as JSON bodies with stable shape

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::error::GatewayError;
use crate::upstream::ProxyResponse;

/// Response headers owned by the transport; the buffered body gets
/// fresh framing.
const STRIPPED_RESPONSE_HEADERS: [&str; 3] = ["connection", "content-length", "transfer-encoding"];

/// JSON body for every gateway-generated error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Pass the upstream response through, status and body untouched.
pub fn upstream_response(proxied: ProxyResponse) -> axum::response::Response {
    let mut builder = Response::builder().status(proxied.status);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in proxied.headers.iter() {
            if STRIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
    }
    match builder.body(Body::from(proxied.body)) {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to assemble upstream response");
            json_error(StatusCode::BAD_GATEWAY, "invalid upstream response", None)
        }
    }
}

/// Render a gateway error with its canonical status code.
pub fn error_response(err: &GatewayError, request_id: Option<&str>) -> axum::response::Response {
    json_error(err.status_code(), &err.to_string(), request_id)
}

pub fn json_error(
    status: StatusCode,
    message: &str,
    request_id: Option<&str>,
) -> axum::response::Response {
    let body = ErrorBody {
        error: message.to_string(),
        status: status.as_u16(),
        request_id: request_id.map(String::from),
    };
    (status, axum::Json(body)).into_response()
}
