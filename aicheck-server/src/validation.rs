//! Upload validation module
//!
//! Provides validation utilities for the multipart image upload.

use crate::error::ApiError;

/// Image formats the scorer accepts
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Validates the Content-Type of an uploaded image
///
/// Parameters after `;` are ignored and the comparison is case-insensitive.
/// A missing Content-Type is rejected.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_lowercase())
        .unwrap_or_default();

    if ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(ApiError::unsupported_media_type(format!(
            "Unsupported Content-Type: '{}'. Allowed types: {}",
            content_type.unwrap_or_default(),
            ALLOWED_CONTENT_TYPES.join(", ")
        )))
    }
}

/// Validates the size of an uploaded image
///
/// Empty uploads are a bad request; uploads over `max_size` are too large.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size == 0 {
        Err(ApiError::bad_request("image file is empty"))
    } else if size > max_size {
        Err(ApiError::payload_too_large(format!(
            "File too large: {} bytes exceeds maximum of {} bytes",
            size, max_size
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_validate_content_type_images() {
        assert!(validate_content_type(Some("image/jpeg")).is_ok());
        assert!(validate_content_type(Some("image/png")).is_ok());
        assert!(validate_content_type(Some("image/gif")).is_ok());
        assert!(validate_content_type(Some("image/webp")).is_ok());
        assert!(validate_content_type(Some("IMAGE/JPEG")).is_ok()); // case insensitive
    }

    #[test]
    fn test_validate_content_type_ignores_parameters() {
        assert!(validate_content_type(Some("image/png; charset=binary")).is_ok());
        assert!(validate_content_type(Some(" image/webp ;q=1")).is_ok());
    }

    #[test]
    fn test_validate_content_type_rejected() {
        for ct in ["image/svg+xml", "application/octet-stream", "text/html", ""] {
            let err = validate_content_type(Some(ct)).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE, "{ct}");
        }
    }

    #[test]
    fn test_validate_content_type_missing() {
        assert!(validate_content_type(None).is_err());
    }

    #[test]
    fn test_validate_file_size_ok() {
        let max = 8 * 1024 * 1024;
        assert!(validate_file_size(1, max).is_ok());
        assert!(validate_file_size(max, max).is_ok()); // exactly max
    }

    #[test]
    fn test_validate_file_size_too_large() {
        let max = 8 * 1024 * 1024;
        let err = validate_file_size(max + 1, max).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_validate_file_size_empty() {
        let err = validate_file_size(0, 1024).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
