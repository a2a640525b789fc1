//! Cache-aside layer over a key-value cache.
//!
//! Backends:
//! - **Redis** (`redis` feature): shared cache for multi-instance deployments.
//! - **Memory**: process-local `DashMap` with lazy expiry, used when `REDIS_URL`
//!   is not set and in tests.
//!
//! [`CacheAside`] routes every call through the retry executor with
//! [`RetryPolicy::CACHE`]. Absence of a key surfaces as [`CacheError::Miss`], which
//! is never retried and never logged as a failure.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Span;

use crate::context::RequestContext;
use crate::error::{CacheError, OperationError};
use crate::retry::{RetryExecutor, RetryPolicy};

/// Marker stored under a request's key while it is being processed.
pub const PROCESSING_MARKER: &str = "processing";

/// Lifetime of the processing marker.
pub const PROCESSING_TTL: Duration = Duration::from_secs(60);

/// Lifetime of a cached result snapshot.
pub const RESULT_TTL: Duration = Duration::from_secs(300);

/// Cache key for a request's marker and result snapshot.
pub fn result_cache_key(request_id: &str) -> String {
    format!("verification:{request_id}")
}

/// Minimal key-value capability the cache-aside layer needs.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the value under `key`; `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Short backend name for health output.
    fn backend_name(&self) -> &'static str;
}

/// Retry-wrapped cache access.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn KeyValueCache>,
    executor: RetryExecutor,
}

impl CacheAside {
    /// Wrap `cache` with the cache retry policy, logging under `span`.
    pub fn new(cache: Arc<dyn KeyValueCache>, span: Span) -> Self {
        Self {
            cache,
            executor: RetryExecutor::new(RetryPolicy::CACHE, span),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Write `value` under `key`.
    ///
    /// Errors are returned to the caller as hard failures; the read path relies on
    /// the written marker or snapshot being present.
    pub async fn set(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        correlation_id: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), OperationError<CacheError>> {
        self.executor
            .execute(ctx, operation, correlation_id, || self.cache.set(key, value, ttl))
            .await
    }

    /// Read the value under `key`, failing with [`CacheError::Miss`] when absent.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        correlation_id: &str,
        key: &str,
    ) -> Result<String, OperationError<CacheError>> {
        self.executor
            .execute(ctx, operation, correlation_id, || self.cache.get(key))
            .await?
            .ok_or_else(|| OperationError::failed(operation, correlation_id, CacheError::Miss))
    }
}
