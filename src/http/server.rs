//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers and middleware
//! - Resolve the target service from the inbound path
//! - Hand requests to the routing engine and translate the result
//! - Expose the public health endpoint

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use axum::Router as AxumRouter;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{Identity, TokenValidator};
use crate::config::{ConfigError, CorsConfig, GatewayConfig};
use crate::error::GatewayError;
use crate::health::{HealthAggregator, ServiceStatus};
use crate::http::middleware::{enforce_rate_limit, require_identity};
use crate::http::request::{RequestIdLayer, REQUEST_ID_HEADER};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::Router;
use crate::security::RateLimiter;
use crate::upstream::{ProxyRequest, RetryPolicy, ServiceRegistry};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub health: HealthAggregator,
    pub validator: Arc<TokenValidator>,
    pub limiter: Option<Arc<RateLimiter>>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    app: AxumRouter,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Wire up the registry, router, and middleware from configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(ServiceRegistry::from_config(
            &config.services,
            (&config.circuit_breaker).into(),
        )?);

        let retry = RetryPolicy {
            backoff_step: Duration::from_millis(config.retries.backoff_step_ms),
        };
        let router = Arc::new(Router::new(registry.clone(), retry));

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        let state = AppState {
            router,
            health: HealthAggregator::new(registry),
            validator: Arc::new(TokenValidator::new(&config.jwt)),
            limiter,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_bytes: config.listener.max_body_bytes,
        };

        let app = Self::build_router(&config, state);
        Ok(Self { app, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> AxumRouter {
        let protected = AxumRouter::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_identity,
            ))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                enforce_rate_limit,
            ));

        AxumRouter::new()
            .route("/health", get(health_handler))
            .merge(protected)
            .with_state(state)
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.cors))
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.config.services.len(),
            "gateway listening"
        );

        let app = self
            .app
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler: first path segment names the service, the full
/// path and query are forwarded verbatim.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = std::time::Instant::now();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let method = request.method().clone();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let service_name = request
        .uri()
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_string();

    if service_name.is_empty() {
        tracing::warn!(request_id = %request_id, "no service in path");
        metrics::record_request(method.as_str(), 404, "none", start);
        return response::json_error(
            StatusCode::NOT_FOUND,
            "no matching service for path",
            Some(&request_id),
        );
    }

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        service = %service_name,
        path = %path_and_query,
        "proxying request"
    );

    let identity = request.extensions().get::<Identity>().cloned();
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(_) => {
            metrics::record_request(method.as_str(), 413, &service_name, start);
            return response::json_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body too large",
                Some(&request_id),
            );
        }
    };

    let proxy_req = ProxyRequest {
        method: parts.method,
        path_and_query,
        headers: parts.headers,
        body,
        deadline: tokio::time::Instant::now() + state.request_timeout,
        identity,
    };

    match state.router.route(&service_name, proxy_req).await {
        Ok(proxied) => {
            metrics::record_request(method.as_str(), proxied.status.as_u16(), &service_name, start);
            response::upstream_response(proxied)
        }
        Err(err) => {
            if matches!(err, GatewayError::CircuitOpen(_)) {
                metrics::record_circuit_open(&service_name);
            }
            metrics::record_request(
                method.as_str(),
                err.status_code().as_u16(),
                &service_name,
                start,
            );
            response::error_response(&err, Some(&request_id))
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: BTreeMap<String, ServiceStatus>,
}

/// Public health endpoint reporting per-service breaker state.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let services = state.health.status_of_all();
    let status = if services.values().any(|s| *s == ServiceStatus::Open) {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse { status, services })
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().max_age(Duration::from_secs(cfg.max_age_secs));

    let layer = if cfg.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(cors::Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    };

    let layer = if cfg.allowed_methods.iter().any(|m| m == "*") {
        layer.allow_methods(cors::Any)
    } else {
        let methods: Vec<Method> = cfg
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        layer.allow_methods(methods)
    };

    if cfg.allowed_headers.iter().any(|h| h == "*") {
        layer.allow_headers(cors::Any)
    } else {
        let headers: Vec<axum::http::HeaderName> = cfg
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        layer.allow_headers(headers)
    }
}
