//! AI Check Core - resilient core of the image verification service
//!
//! Every image submitted for verification is scored by an external service, persisted
//! to a durable store, and cached for fast repeat lookups. The parts that make this
//! dependable live here:
//!
//! - **Transient classification**: [`Transient`] decides whether a failure is worth retrying
//! - **Retry executor**: [`RetryExecutor`] runs operations with bounded exponential
//!   backoff, racing every wait against the caller's [`RequestContext`]
//! - **Cache-aside**: [`CacheAside`] over Redis or an in-process map
//! - **Durable store**: [`VerificationRepository`] over PostgreSQL or memory, with
//!   `(user_id, fingerprint)` uniqueness
//! - **Fingerprinting**: [`fingerprint()`] derives the SHA-1 hex digest used for
//!   duplicate detection
//! - **Orchestration**: [`VerificationService`] ties the pieces into the verify, result,
//!   duplicate and metrics flows
//!
//! # Features
//!
//! - `postgres`: [`PostgresStore`] (sqlx)
//! - `redis`: [`RedisCache`]
//! - `grpc`: [`GrpcScorer`] (tonic)
//!
//! All are enabled by default.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use aicheck_core::{CacheAside, MemoryCache, MemoryStore, RequestContext, VerificationRepository};
//!
//! # async fn example() {
//! let store = VerificationRepository::new(Arc::new(MemoryStore::new()), tracing::Span::none());
//! let cache = CacheAside::new(Arc::new(MemoryCache::new()), tracing::Span::none());
//!
//! let ctx = RequestContext::with_timeout(std::time::Duration::from_secs(5));
//! store.ensure_schema(&ctx).await.unwrap();
//! # let _ = cache;
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod retry;
pub mod scorer;
pub mod service;
pub mod store;
pub mod transient;

pub use cache::{CacheAside, KeyValueCache, MemoryCache};
pub use context::{CancelHandle, Interrupt, RequestContext};
pub use error::{
    CacheError, OperationError, ScorerError, StoreError, VerifyError, VerifyFailure,
};
pub use fingerprint::{fingerprint, FINGERPRINT_LEN};
pub use model::{
    CachedSnapshot, DuplicateReport, MetricsAggregate, MetricsSummary, VerificationRecord,
};
pub use retry::{RetryExecutor, RetryPolicy};
pub use scorer::{ImageScorer, ScoreResult};
pub use service::{DuplicateScope, VerificationOutcome, VerificationService};
pub use store::{MemoryStore, VerificationRepository, VerificationStore};
pub use transient::{is_transient, Transient};

#[cfg(feature = "redis")]
pub use cache::RedisCache;
#[cfg(feature = "grpc")]
pub use scorer::GrpcScorer;
#[cfg(feature = "postgres")]
pub use store::{PoolSettings, PostgresStore};
