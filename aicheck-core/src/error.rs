//! Error types for the verification core.
//!
//! Every failure that leaves a retry-wrapped operation is an [`OperationError`]:
//! it names the operation and the correlation (request) id it ran under, so callers
//! and tests can match on operation identity instead of parsing text.

use std::fmt;

use thiserror::Error;

use crate::context::Interrupt;

/// Underlying reason an operation failed.
#[derive(Debug)]
pub enum Cause<E> {
    /// The operation itself returned an error
    Failed(E),
    /// The request context fired before the operation could finish
    Interrupted(Interrupt),
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => err.fmt(f),
            Self::Interrupted(interrupt) => interrupt.fmt(f),
        }
    }
}

/// An error annotated with the operation and correlation id it occurred under.
#[derive(Debug)]
pub struct OperationError<E> {
    operation: &'static str,
    correlation_id: String,
    cause: Cause<E>,
}

impl<E> OperationError<E> {
    /// Wrap a failure returned by the operation.
    pub fn failed(operation: &'static str, correlation_id: impl Into<String>, err: E) -> Self {
        Self {
            operation,
            correlation_id: correlation_id.into(),
            cause: Cause::Failed(err),
        }
    }

    /// Wrap a context interruption.
    pub fn interrupted(
        operation: &'static str,
        correlation_id: impl Into<String>,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            operation,
            correlation_id: correlation_id.into(),
            cause: Cause::Interrupted(interrupt),
        }
    }

    /// Operation name, e.g. `repository.save_log`.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Correlation id (the request id, or empty when not yet known).
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The operation's own error, if it failed rather than being interrupted.
    pub fn failure(&self) -> Option<&E> {
        match &self.cause {
            Cause::Failed(err) => Some(err),
            Cause::Interrupted(_) => None,
        }
    }

    /// The interruption, if the context fired.
    pub fn interruption(&self) -> Option<Interrupt> {
        match self.cause {
            Cause::Interrupted(interrupt) => Some(interrupt),
            Cause::Failed(_) => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interruption().is_some()
    }

    /// Re-tag under a new operation name, converting the failure payload.
    ///
    /// The correlation id and any interruption are preserved.
    pub fn map_failure<F>(self, operation: &'static str, f: impl FnOnce(E) -> F) -> OperationError<F> {
        OperationError {
            operation,
            correlation_id: self.correlation_id,
            cause: match self.cause {
                Cause::Failed(err) => Cause::Failed(f(err)),
                Cause::Interrupted(interrupt) => Cause::Interrupted(interrupt),
            },
        }
    }
}

impl<E: fmt::Display> fmt::Display for OperationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.correlation_id.is_empty() {
            write!(f, "{}: {}", self.operation, self.cause)
        } else {
            write!(
                f,
                "{} (request_id={}): {}",
                self.operation, self.correlation_id, self.cause
            )
        }
    }
}

impl<E> std::error::Error for OperationError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Cause::Failed(err) => Some(err),
            Cause::Interrupted(interrupt) => Some(interrupt),
        }
    }
}

/// Durable store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched the lookup
    #[error("record not found")]
    NotFound,

    /// The `(user_id, fingerprint)` pair or the request id already exists
    #[error("uniqueness violation: {0}")]
    Conflict(String),

    /// Driver-level failure
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Backend unavailable (non-SQL backends)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            other => Self::Database(other),
        }
    }
}

impl OperationError<StoreError> {
    pub fn is_not_found(&self) -> bool {
        matches!(self.failure(), Some(StoreError::NotFound))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.failure(), Some(StoreError::Conflict(_)))
    }
}

/// Key-value cache failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is not present (distinguished: a miss, never a fault)
    #[error("cache miss")]
    Miss,

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Backend failure reported by a non-Redis cache
    #[error("cache unavailable: {message}")]
    Unavailable { message: String, transient: bool },
}

impl OperationError<CacheError> {
    pub fn is_miss(&self) -> bool {
        matches!(self.failure(), Some(CacheError::Miss))
    }
}

/// External scorer failures.
#[derive(Debug, Error)]
pub enum ScorerError {
    /// The remote service answered with a non-OK gRPC status
    #[cfg(feature = "grpc")]
    #[error("scorer returned status {}: {}", .0.code(), .0.message())]
    Status(tonic::Status),

    /// The call never reached the service
    #[error("scorer transport error: {0}")]
    Transport(String),

    /// The service answered with something unusable
    #[error("invalid scorer response: {0}")]
    InvalidResponse(String),
}

#[cfg(feature = "grpc")]
impl From<tonic::Status> for ScorerError {
    fn from(status: tonic::Status) -> Self {
        Self::Status(status)
    }
}

/// Failure payload of the verification flow, tagged by stage.
#[derive(Debug, Error)]
pub enum VerifyFailure {
    #[error(transparent)]
    Cache(CacheError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Scorer(ScorerError),

    #[error("failed to encode cached snapshot: {0}")]
    Encode(serde_json::Error),
}

/// Error returned by [`crate::VerificationService::verify_image`].
pub type VerifyError = OperationError<VerifyFailure>;

impl OperationError<VerifyFailure> {
    /// True when the durable store rejected a duplicate `(user_id, fingerprint)`.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.failure(),
            Some(VerifyFailure::Store(StoreError::Conflict(_)))
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.failure(), Some(VerifyFailure::Store(StoreError::NotFound)))
    }
}
