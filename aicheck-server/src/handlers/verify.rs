//! Image verification handler
//!
//! Handles POST /verify requests: scores the uploaded image, persists and caches the outcome.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{validate_content_type, validate_file_size};

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Scoring details echoed back with the verdict
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyMetadata {
    /// When the record was created
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub score: f32,
}

/// Response for a completed verification
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    /// Identifier for later `/result/{id}` and `/duplicates/{id}` lookups
    #[schema(example = "5f0c2b9e-7d43-4c36-9a55-3f3a4c1f2e10")]
    pub request_id: String,
    /// Whether the scorer judged the image authentic
    #[schema(example = true)]
    pub verified: bool,
    #[schema(example = 0.92)]
    pub score: f32,
    /// Message returned by the scorer
    pub message: String,
    pub metadata: VerifyMetadata,
    pub created_at: DateTime<Utc>,
}

/// Verify an image
///
/// Accepts multipart/form-data with:
/// - **image** (required): JPEG, PNG, GIF or WebP, at most 8 MiB by default
///
/// Uploading the same image twice for the same user is rejected with 409.
#[utoipa::path(
    post,
    path = "/verify",
    tag = "Verification",
    request_body(
        content_type = "multipart/form-data",
        description = "Image to verify in the `image` field"
    ),
    responses(
        (status = 200, description = "Verification completed", body = VerifyResponse),
        (status = 400, description = "Missing or empty image"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Image already verified for this user"),
        (status = 413, description = "Image too large"),
        (status = 415, description = "Unsupported image type"),
        (status = 503, description = "Image processor unavailable")
    ),
    security(
        ("bearer_token" = [])
    )
)]
pub async fn verify_handler(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut image: Option<(Vec<u8>, Option<String>)> = None;

    // Parse multipart form
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(multipart_error)?.to_vec();
        image = Some((data, content_type));
    }

    let (data, content_type) =
        image.ok_or_else(|| ApiError::bad_request("image file is required"))?;

    validate_file_size(data.len(), state.max_upload_bytes)?;
    validate_content_type(content_type.as_deref())?;

    let ctx = state.request_context();
    let outcome = state
        .service
        .verify_image(&ctx, &user.user_id, &data)
        .await?;

    let record = outcome.record;
    Ok(Json(VerifyResponse {
        request_id: outcome.request_id,
        verified: outcome.result.success,
        score: outcome.result.score,
        message: outcome.result.message,
        metadata: VerifyMetadata {
            timestamp: record.created_at,
            success: record.success,
            score: record.score,
        },
        created_at: record.created_at,
    }))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(format!("Failed to parse multipart: {}", e.body_text()))
    }
}
