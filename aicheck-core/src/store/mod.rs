//! Durable verification store.
//!
//! The store is authoritative; the cache is a disposable view of it.
//!
//! - **PostgreSQL** (`postgres` feature): production backend, `verification_logs` table
//!   with a unique `(user_id, sha1_hash)` index.
//! - **Memory**: development fallback when `DATABASE_URL` is not set, and the test
//!   backend. Enforces the same uniqueness rules.
//!
//! [`VerificationRepository`] wraps a backend so that every call goes through the
//! retry executor with [`RetryPolicy::PERSISTENCE`] under its own operation name.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::{PoolSettings, PostgresStore};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Span;

use crate::context::RequestContext;
use crate::error::{OperationError, StoreError};
use crate::model::{MetricsAggregate, VerificationRecord};
use crate::retry::{RetryExecutor, RetryPolicy};

/// Storage capability for verification records.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Create the table and indexes if missing. Idempotent.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert a new record.
    ///
    /// Fails with [`StoreError::Conflict`] when the request id or the
    /// `(user_id, fingerprint)` pair already exists.
    async fn save(&self, record: &VerificationRecord) -> Result<(), StoreError>;

    /// Fetch the record owned by `user_id`, or [`StoreError::NotFound`].
    async fn find_by_request_and_user(
        &self,
        request_id: &str,
        user_id: &str,
    ) -> Result<VerificationRecord, StoreError>;

    /// Records with `fingerprint`, optionally scoped to one owner and excluding one
    /// request id, newest first.
    async fn find_duplicates_by_hash(
        &self,
        user_id: Option<&str>,
        fingerprint: &str,
        exclude_request_id: Option<&str>,
    ) -> Result<Vec<VerificationRecord>, StoreError>;

    /// Count, success count, mean score and mean latency over every record.
    async fn aggregate_metrics(&self) -> Result<MetricsAggregate, StoreError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for health output.
    fn backend_name(&self) -> &'static str;
}

/// Retry-wrapped access to a [`VerificationStore`].
#[derive(Clone)]
pub struct VerificationRepository {
    store: Arc<dyn VerificationStore>,
    executor: RetryExecutor,
}

impl VerificationRepository {
    pub fn new(store: Arc<dyn VerificationStore>, span: Span) -> Self {
        Self {
            store,
            executor: RetryExecutor::new(RetryPolicy::PERSISTENCE, span),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn ensure_schema(&self, ctx: &RequestContext) -> Result<(), OperationError<StoreError>> {
        self.executor
            .execute(ctx, "repository.ensure_schema", "", || self.store.ensure_schema())
            .await
    }

    pub async fn save(
        &self,
        ctx: &RequestContext,
        record: &VerificationRecord,
    ) -> Result<(), OperationError<StoreError>> {
        self.executor
            .execute(ctx, "repository.save_log", &record.request_id, || {
                self.store.save(record)
            })
            .await
    }

    pub async fn find_by_request_and_user(
        &self,
        ctx: &RequestContext,
        request_id: &str,
        user_id: &str,
    ) -> Result<VerificationRecord, OperationError<StoreError>> {
        self.executor
            .execute(ctx, "repository.find_by_request_and_user", request_id, || {
                self.store.find_by_request_and_user(request_id, user_id)
            })
            .await
    }

    /// Correlated by the excluded request id, which is the request being reported on.
    pub async fn find_duplicates_by_hash(
        &self,
        ctx: &RequestContext,
        user_id: Option<&str>,
        fingerprint: &str,
        exclude_request_id: Option<&str>,
    ) -> Result<Vec<VerificationRecord>, OperationError<StoreError>> {
        self.executor
            .execute(
                ctx,
                "repository.find_duplicates_by_hash",
                exclude_request_id.unwrap_or_default(),
                || {
                    self.store
                        .find_duplicates_by_hash(user_id, fingerprint, exclude_request_id)
                },
            )
            .await
    }

    pub async fn aggregate_metrics(
        &self,
        ctx: &RequestContext,
    ) -> Result<MetricsAggregate, OperationError<StoreError>> {
        self.executor
            .execute(ctx, "repository.aggregate_metrics", "", || {
                self.store.aggregate_metrics()
            })
            .await
    }

    /// Single-attempt health probe bounded by `ctx`.
    pub async fn ping(&self, ctx: &RequestContext) -> Result<(), OperationError<StoreError>> {
        match ctx.run(self.store.ping()).await {
            Ok(result) => result.map_err(|err| OperationError::failed("repository.ping", "", err)),
            Err(interrupt) => Err(OperationError::interrupted("repository.ping", "", interrupt)),
        }
    }
}
