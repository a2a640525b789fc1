//! Duplicate report handler
//!
//! Handles GET /duplicates/{id}: other verifications of the same image.

use aicheck_core::{DuplicateReport, VerificationRecord};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

/// One earlier or later verification of the same image
#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicateEntry {
    pub request_id: String,
    pub score: f32,
    pub success: bool,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl From<VerificationRecord> for DuplicateEntry {
    fn from(record: VerificationRecord) -> Self {
        Self {
            request_id: record.request_id,
            score: record.score,
            success: record.success,
            details: record.details,
            created_at: record.created_at,
        }
    }
}

/// The requested verification and its duplicates, newest first
#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicatesResponse {
    pub request_id: String,
    pub user_id: String,
    pub sha1_hash: String,
    pub duplicate_count: usize,
    pub duplicates: Vec<DuplicateEntry>,
}

impl From<DuplicateReport> for DuplicatesResponse {
    fn from(report: DuplicateReport) -> Self {
        let duplicates: Vec<DuplicateEntry> =
            report.duplicates.into_iter().map(DuplicateEntry::from).collect();

        Self {
            request_id: report.original.request_id,
            user_id: report.original.user_id,
            sha1_hash: report.original.fingerprint,
            duplicate_count: duplicates.len(),
            duplicates,
        }
    }
}

/// List verifications sharing the image fingerprint of a request
#[utoipa::path(
    get,
    path = "/duplicates/{id}",
    tag = "Verification",
    params(
        ("id" = String, Path, description = "Request ID returned by /verify")
    ),
    responses(
        (status = 200, description = "Duplicate report", body = DuplicatesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Result not found")
    ),
    security(
        ("bearer_token" = [])
    )
)]
pub async fn get_duplicates_handler(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<DuplicatesResponse>, ApiError> {
    let request_id = request_id.trim();
    if request_id.is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }

    let ctx = state.request_context();
    let report = state
        .service
        .get_duplicate_report(&ctx, &user.user_id, request_id)
        .await?;

    Ok(Json(report.into()))
}
