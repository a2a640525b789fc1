//! Verification result lookup
//!
//! Handles GET /result/{id}, served from the cache when a snapshot is present.

use aicheck_core::VerificationRecord;
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

/// A stored verification
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultResponse {
    pub request_id: String,
    pub user_id: String,
    pub score: f32,
    pub success: bool,
    #[schema(example = "status:true score:0.920000 hash:a9993e364706816aba3e25717850c26c9cd0d89d")]
    pub details: String,
    /// SHA-1 hex digest of the image
    pub sha1_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<VerificationRecord> for ResultResponse {
    fn from(record: VerificationRecord) -> Self {
        Self {
            request_id: record.request_id,
            user_id: record.user_id,
            score: record.score,
            success: record.success,
            details: record.details,
            sha1_hash: record.fingerprint,
            created_at: record.created_at,
        }
    }
}

/// Fetch a verification result owned by the caller
#[utoipa::path(
    get,
    path = "/result/{id}",
    tag = "Verification",
    params(
        ("id" = String, Path, description = "Request ID returned by /verify")
    ),
    responses(
        (status = 200, description = "Verification result", body = ResultResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Result not found")
    ),
    security(
        ("bearer_token" = [])
    )
)]
pub async fn get_result_handler(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let request_id = request_id.trim();
    if request_id.is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }

    let ctx = state.request_context();
    let record = state
        .service
        .get_result(&ctx, &user.user_id, request_id)
        .await?;

    Ok(Json(record.into()))
}
