//! HTTP routing
//!
//! Builds the axum router for the verification API and wraps it in the
//! middleware stack (CORS, body limit, timeout, optional rate limiting, tracing).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::Config;
use crate::handlers::{
    get_duplicates_handler, get_result_handler, health, metrics_summary_handler, ready,
    verify_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Slack between the core request deadline and the outer HTTP timeout
const TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Build the application router.
pub fn create_router(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/verify", post(verify_handler))
        .route("/result/{id}", get(get_result_handler))
        .route("/duplicates/{id}", get(get_duplicates_handler))
        .route("/metrics/summary", get(metrics_summary_handler));

    let ops = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    let body_limit = config.body_limit_mb * 1024 * 1024;

    // The outer timeout trails the core deadline so stage-tagged timeouts win
    let router = api
        .merge(ops)
        .with_state(state)
        // Multipart otherwise stops at axum's 2 MiB default
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(config.allowed_origins.as_deref()))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout() + TIMEOUT_SLACK,
        ));

    with_rate_limit(router, config).layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .unwrap_or_default()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS open to any origin; set ALLOWED_ORIGINS to restrict");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    tracing::info!(origins = origins.len(), "CORS restricted");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Apply the per-IP limiter unless it is disabled or misconfigured.
fn with_rate_limit(router: Router, config: &Config) -> Router {
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting disabled");
        return router;
    }

    let Some(governor) = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish()
    else {
        tracing::warn!(
            per_sec = config.rate_limit_per_sec,
            burst = config.rate_limit_burst,
            "Rate limit settings rejected, limiter disabled"
        );
        return router;
    };

    tracing::info!(
        per_sec = config.rate_limit_per_sec,
        burst = config.rate_limit_burst,
        "Rate limiting enabled"
    );
    router.layer(GovernorLayer::new(Arc::new(governor)))
}
