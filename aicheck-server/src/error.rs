//! HTTP error type
//!
//! Every handler returns [`ApiError`]; core failures are mapped onto it here.

use aicheck_core::{is_transient, Interrupt, OperationError, StoreError, VerifyError, VerifyFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Error returned by API handlers, rendered as `{"error", "code"}` JSON
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request or missing upload field
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Bearer token missing or rejected; `code` is one of the `AUTH_*` codes
    #[error("{message}")]
    AuthError { message: String, code: &'static str },

    /// No verification for this id and user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Same image already verified by this user
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload above the configured size limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload is not JPEG, PNG, GIF or WebP
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The request deadline passed
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Image processor or durable store unreachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// 401 carrying an `AUTH_*` code
    pub fn auth_error(code: &'static str, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable `code` field of the response body
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::AuthError { code, .. } => *code,
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "DUPLICATE_IMAGE",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::AuthError { .. } => "auth_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::PayloadTooLarge(_) | Self::UnsupportedMediaType(_) => "invalid_upload",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        if let Some(interrupt) = err.interruption() {
            return interrupt_error(interrupt, &err);
        }

        match err.failure() {
            Some(VerifyFailure::Store(StoreError::Conflict(_))) => {
                Self::conflict("This image has already been verified for this user")
            }
            Some(VerifyFailure::Scorer(scorer)) if is_transient(scorer) => {
                tracing::error!(stage = err.operation(), error = %err, "Image processor unavailable");
                Self::service_unavailable("Image processor unavailable")
            }
            _ => {
                tracing::error!(stage = err.operation(), error = %err, "Verification failed");
                Self::internal(format!("Verification failed at {}", err.operation()))
            }
        }
    }
}

impl From<OperationError<StoreError>> for ApiError {
    fn from(err: OperationError<StoreError>) -> Self {
        if err.is_not_found() {
            return Self::not_found("result not found");
        }
        if let Some(interrupt) = err.interruption() {
            return interrupt_error(interrupt, &err);
        }

        tracing::error!(operation = err.operation(), error = %err, "Store operation failed");
        Self::internal("A database error occurred")
    }
}

fn interrupt_error<E>(interrupt: Interrupt, err: &OperationError<E>) -> ApiError {
    match interrupt {
        Interrupt::DeadlineExceeded => {
            ApiError::timeout(format!("{} did not finish in time", err.operation()))
        }
        Interrupt::Cancelled => ApiError::internal(format!("{} was cancelled", err.operation())),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() && !matches!(self, Self::ServiceUnavailable(_)) {
            tracing::error!(%status, category, code, error = %message, "Request failed");
        } else {
            tracing::warn!(%status, category, code, error = %message, "Request rejected");
        }

        let body = serde_json::json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
