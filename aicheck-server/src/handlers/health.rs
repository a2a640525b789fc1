//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use std::time::Duration;

use aicheck_core::RequestContext;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Upper bound on the store ping made by the probes
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "ok" or "degraded"
    #[schema(example = "ok")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Durable store backend in use
    #[schema(example = "postgres")]
    pub store: &'static str,
    /// Cache backend in use
    #[schema(example = "redis")]
    pub cache: &'static str,
}

/// Service health
///
/// Reports "degraded" when the durable store does not answer a ping.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.service.repository();
    let ctx = RequestContext::with_timeout(PROBE_TIMEOUT);

    let status = match store.ping(&ctx).await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unreachable");
            "degraded"
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "aicheck-server",
        store: store.backend_name(),
        cache: state.service.cache().backend_name(),
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Kubernetes readiness probe
///
/// Returns 200 when the durable store answers a ping, 503 otherwise.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = ReadyResponse),
        (status = 503, description = "Durable store unreachable", body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let ctx = RequestContext::with_timeout(PROBE_TIMEOUT);

    match state.service.repository().ping(&ctx).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    message: Some("Durable store unreachable"),
                }),
            )
        }
    }
}
