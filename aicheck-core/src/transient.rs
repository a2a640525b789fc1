//! Transient error classification.
//!
//! Decides whether retrying an operation unchanged could succeed. Timeouts,
//! dropped or refused connections, and "try again later" server replies are
//! transient; not-found, uniqueness violations, and validation failures never are.

use std::io;

use crate::context::Interrupt;
use crate::error::{CacheError, ScorerError, StoreError};

/// Errors that know whether they are worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Free-function form of [`Transient::is_transient`].
pub fn is_transient<E: Transient + ?Sized>(err: &E) -> bool {
    err.is_transient()
}

impl<T: Transient + ?Sized> Transient for &T {
    fn is_transient(&self) -> bool {
        (**self).is_transient()
    }
}

impl Transient for Interrupt {
    fn is_transient(&self) -> bool {
        true
    }
}

impl Transient for io::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::TimedOut
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::Interrupted
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::UnexpectedEof
        )
    }
}

/// SQLSTATE codes that signal a broken or temporarily refused connection,
/// or a conflict the server expects the client to retry.
#[cfg(feature = "postgres")]
const TRANSIENT_SQLSTATES: &[&str] = &["57P01", "57P02", "57P03", "40001", "40P01", "53300"];

#[cfg(feature = "postgres")]
impl Transient for sqlx::Error {
    fn is_transient(&self) -> bool {
        match self {
            sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Io(err) => err.is_transient(),
            sqlx::Error::Database(db) => db
                .code()
                .map(|code| {
                    // Class 08: connection exception (the driver's "bad connection").
                    code.starts_with("08") || TRANSIENT_SQLSTATES.contains(&code.as_ref())
                })
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(feature = "redis")]
impl Transient for redis::RedisError {
    fn is_transient(&self) -> bool {
        self.is_timeout()
            || self.is_connection_dropped()
            || self.is_connection_refusal()
            || self.is_io_error()
            || matches!(
                self.kind(),
                redis::ErrorKind::TryAgain | redis::ErrorKind::BusyLoadingError
            )
    }
}

#[cfg(feature = "grpc")]
impl Transient for tonic::Status {
    fn is_transient(&self) -> bool {
        matches!(
            self.code(),
            tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::ResourceExhausted
        )
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::NotFound | StoreError::Conflict(_) | StoreError::Unavailable(_) => false,
            #[cfg(feature = "postgres")]
            StoreError::Database(err) => err.is_transient(),
        }
    }
}

impl Transient for ScorerError {
    fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "grpc")]
            ScorerError::Status(status) => status.is_transient(),
            ScorerError::Transport(_) => true,
            ScorerError::InvalidResponse(_) => false,
        }
    }
}

impl Transient for CacheError {
    fn is_transient(&self) -> bool {
        match self {
            CacheError::Miss => false,
            #[cfg(feature = "redis")]
            CacheError::Redis(err) => err.is_transient(),
            CacheError::Unavailable { transient, .. } => *transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupts_are_transient() {
        assert!(is_transient(&Interrupt::DeadlineExceeded));
        assert!(is_transient(&Interrupt::Cancelled));
    }

    #[test]
    fn test_io_timeouts_are_transient() {
        assert!(io::Error::from(io::ErrorKind::TimedOut).is_transient());
        assert!(io::Error::from(io::ErrorKind::ConnectionReset).is_transient());
        assert!(!io::Error::from(io::ErrorKind::PermissionDenied).is_transient());
        assert!(!io::Error::from(io::ErrorKind::InvalidData).is_transient());
    }

    #[test]
    fn test_not_found_and_conflict_never_transient() {
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::Conflict("dup".into()).is_transient());
        assert!(!CacheError::Miss.is_transient());
    }

    #[test]
    fn test_cache_unavailable_honours_flag() {
        let temporary = CacheError::Unavailable {
            message: "loading".into(),
            transient: true,
        };
        let fatal = CacheError::Unavailable {
            message: "wrong type".into(),
            transient: false,
        };
        assert!(temporary.is_transient());
        assert!(!fatal.is_transient());
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_sqlx_pool_timeout_is_transient() {
        assert!(sqlx::Error::PoolTimedOut.is_transient());
        assert!(!sqlx::Error::RowNotFound.is_transient());
        assert!(sqlx::Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_transient());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_io_error_is_transient() {
        let err = redis::RedisError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(err.is_transient());

        let err = redis::RedisError::from((redis::ErrorKind::TypeError, "wrong type"));
        assert!(!err.is_transient());
    }

    #[cfg(feature = "grpc")]
    #[test]
    fn test_grpc_unavailable_is_transient() {
        assert!(tonic::Status::unavailable("down").is_transient());
        assert!(!tonic::Status::invalid_argument("empty image").is_transient());
    }

    #[test]
    fn test_scorer_transport_is_transient() {
        assert!(ScorerError::Transport("connection refused".into()).is_transient());
        assert!(!ScorerError::InvalidResponse("score is NaN".into()).is_transient());
    }
}
