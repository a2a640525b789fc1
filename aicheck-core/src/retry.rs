//! Bounded exponential-backoff retry executor.
//!
//! Shared by the durable store and the cache. Every attempt and every backoff wait
//! races against the caller's [`RequestContext`], and every loop has a hard attempt
//! ceiling.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn, Span};

use crate::context::RequestContext;
use crate::error::OperationError;
use crate::transient::Transient;

/// Attempt budget and backoff window for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (values below 1 behave as 1)
    pub max_attempts: u32,
    /// Wait before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single wait
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Durable store operations.
    pub const PERSISTENCE: Self = Self::new(3, Duration::from_millis(100), Duration::from_secs(2));

    /// Cache operations.
    pub const CACHE: Self = Self::new(3, Duration::from_millis(50), Duration::from_secs(1));

    pub const fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Wait before retry number `retry` (zero-based): `min(initial * 2^retry, max)`.
    pub fn backoff_after(&self, retry: u32) -> Duration {
        1u32.checked_shl(retry)
            .and_then(|factor| self.initial_backoff.checked_mul(factor))
            .map_or(self.max_backoff, |backoff| backoff.min(self.max_backoff))
    }
}

/// Runs fallible async operations under a [`RetryPolicy`].
///
/// `span` is the logging collaborator: every retry, failure and recovery event is
/// emitted as a child of it.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    span: Span,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, span: Span) -> Self {
        Self { policy, span }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, exhausts the
    /// attempt budget, or the context fires.
    ///
    /// With a budget of one (or zero) `op` runs exactly once and no backoff or
    /// context logic is applied; only a failure is wrapped.
    pub async fn execute<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        correlation_id: &str,
        mut op: F,
    ) -> Result<T, OperationError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        if self.policy.max_attempts <= 1 {
            return op()
                .await
                .map_err(|err| OperationError::failed(operation, correlation_id, err));
        }

        let request_id = (!correlation_id.is_empty()).then_some(correlation_id);
        let mut attempt: u32 = 1;

        loop {
            let outcome = match ctx.run(op()).await {
                Ok(outcome) => outcome,
                Err(interrupt) => {
                    error!(
                        parent: &self.span,
                        operation,
                        request_id,
                        attempt,
                        error = %interrupt,
                        "operation failed"
                    );
                    return Err(OperationError::interrupted(operation, correlation_id, interrupt));
                }
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            parent: &self.span,
                            operation,
                            request_id,
                            attempt,
                            "operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= self.policy.max_attempts {
                error!(
                    parent: &self.span,
                    operation,
                    request_id,
                    attempt,
                    transient = err.is_transient(),
                    error = %err,
                    "operation failed"
                );
                return Err(OperationError::failed(operation, correlation_id, err));
            }

            let backoff = self.policy.backoff_after(attempt - 1);
            warn!(
                parent: &self.span,
                operation,
                request_id,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "transient error encountered"
            );

            if let Err(interrupt) = ctx.sleep(backoff).await {
                error!(
                    parent: &self.span,
                    operation,
                    request_id,
                    attempt,
                    error = %interrupt,
                    "operation aborted while waiting to retry"
                );
                return Err(OperationError::interrupted(operation, correlation_id, interrupt));
            }

            attempt += 1;
        }
    }
}
