//! Metrics summary handler

use aicheck_core::MetricsSummary;
use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Aggregate figures over every stored verification
///
/// Wire form of [`MetricsSummary`]; the core type stays free of `utoipa`, so the
/// schema derive lives here.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub total_requests: i64,
    pub successful_requests: i64,
    /// `successful_requests / total_requests`, 0 when there are none
    #[schema(example = 0.6)]
    pub success_rate: f64,
    pub average_score: f64,
    pub average_processing_latency_ms: f64,
}

impl From<MetricsSummary> for MetricsResponse {
    fn from(summary: MetricsSummary) -> Self {
        Self {
            total_requests: summary.total_requests,
            successful_requests: summary.successful_requests,
            success_rate: summary.success_rate,
            average_score: summary.average_score,
            average_processing_latency_ms: summary.average_processing_latency_ms,
        }
    }
}

#[utoipa::path(
    get,
    path = "/metrics/summary",
    tag = "Metrics",
    responses(
        (status = 200, description = "Metrics summary", body = MetricsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to load metrics")
    ),
    security(
        ("bearer_token" = [])
    )
)]
pub async fn metrics_summary_handler(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let ctx = state.request_context();
    let summary = state.service.get_metrics_summary(&ctx).await?;

    Ok(Json(summary.into()))
}
