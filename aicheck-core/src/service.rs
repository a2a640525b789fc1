//! Verification orchestrator.
//!
//! Per request: `Created → ProcessingMarked → Scored → Persisted → Cached`, with any
//! failure aborting the flow. Each stage tags its error so callers can tell which
//! step failed:
//!
//! | stage            | operation tag          |
//! |------------------|------------------------|
//! | processing mark  | `cache.set.processing` |
//! | scorer call      | `grpc_process_image`   |
//! | persistence      | `save_log`             |
//! | result snapshot  | `cache.set.result`     |
//!
//! Reads go cache first and fall back to the durable store; cache trouble on the
//! read path is never fatal.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Span};
use uuid::Uuid;

use crate::cache::{result_cache_key, CacheAside, PROCESSING_MARKER, PROCESSING_TTL, RESULT_TTL};
use crate::context::RequestContext;
use crate::error::{OperationError, StoreError, VerifyError, VerifyFailure};
use crate::fingerprint::fingerprint;
use crate::model::{CachedSnapshot, DuplicateReport, MetricsSummary, VerificationRecord};
use crate::scorer::{ImageScorer, ScoreResult};
use crate::store::VerificationRepository;

const OP_MARK_PROCESSING: &str = "cache.set.processing";
const OP_SCORE: &str = "grpc_process_image";
const OP_SAVE: &str = "save_log";
const OP_CACHE_RESULT: &str = "cache.set.result";
const OP_READ_CACHED: &str = "cache.get.result";

/// Which records count as duplicates of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateScope {
    /// Only the requesting user's own records
    #[default]
    Owner,
    /// Records from any user
    Global,
}

impl FromStr for DuplicateScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" | "user" => Ok(Self::Owner),
            "global" | "all" => Ok(Self::Global),
            other => Err(format!("unknown duplicate scope: {other}")),
        }
    }
}

/// Result of a completed verification.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub request_id: String,
    pub result: ScoreResult,
    /// The record as persisted
    pub record: VerificationRecord,
}

/// Composes the scorer, the durable store and the cache into the verification flow.
#[derive(Clone)]
pub struct VerificationService {
    store: VerificationRepository,
    cache: CacheAside,
    scorer: Arc<dyn ImageScorer>,
    duplicate_scope: DuplicateScope,
    span: Span,
}

impl VerificationService {
    pub fn new(
        store: VerificationRepository,
        cache: CacheAside,
        scorer: Arc<dyn ImageScorer>,
        span: Span,
    ) -> Self {
        Self {
            store,
            cache,
            scorer,
            duplicate_scope: DuplicateScope::default(),
            span,
        }
    }

    pub fn with_duplicate_scope(mut self, scope: DuplicateScope) -> Self {
        self.duplicate_scope = scope;
        self
    }

    pub fn repository(&self) -> &VerificationRepository {
        &self.store
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Score `image` for `user_id`, persist the outcome and cache it.
    pub async fn verify_image(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        image: &[u8],
    ) -> Result<VerificationOutcome, VerifyError> {
        let request_id = Uuid::new_v4().to_string();
        let key = result_cache_key(&request_id);

        self.cache
            .set(ctx, OP_MARK_PROCESSING, &request_id, &key, PROCESSING_MARKER, PROCESSING_TTL)
            .await
            .map_err(|err| self.abort(err.map_failure(OP_MARK_PROCESSING, VerifyFailure::Cache)))?;

        let started = Instant::now();
        let result = match ctx.run(self.scorer.process(ctx, user_id, image)).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                return Err(self.abort(OperationError::failed(
                    OP_SCORE,
                    &request_id,
                    VerifyFailure::Scorer(err),
                )))
            }
            Err(interrupt) => {
                return Err(self.abort(OperationError::interrupted(OP_SCORE, &request_id, interrupt)))
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let hash = fingerprint(image);
        let record = VerificationRecord {
            request_id: request_id.clone(),
            user_id: user_id.to_string(),
            details: format!(
                "status:{} score:{:.6} hash:{}",
                result.success, result.score, hash
            ),
            fingerprint: hash,
            score: result.score,
            success: result.success,
            processing_latency_ms: latency_ms,
            created_at: Utc::now(),
        };

        self.store
            .save(ctx, &record)
            .await
            .map_err(|err| self.abort(err.map_failure(OP_SAVE, VerifyFailure::Store)))?;

        let snapshot = serde_json::to_string(&CachedSnapshot::from(&record)).map_err(|err| {
            self.abort(OperationError::failed(
                OP_CACHE_RESULT,
                &request_id,
                VerifyFailure::Encode(err),
            ))
        })?;

        self.cache
            .set(ctx, OP_CACHE_RESULT, &request_id, &key, &snapshot, RESULT_TTL)
            .await
            .map_err(|err| self.abort(err.map_failure(OP_CACHE_RESULT, VerifyFailure::Cache)))?;

        info!(
            parent: &self.span,
            request_id = %request_id,
            user_id,
            score = result.score,
            success = result.success,
            latency_ms,
            "verification completed"
        );

        Ok(VerificationOutcome {
            request_id,
            result,
            record,
        })
    }

    /// Look up a verification owned by `user_id`, serving from cache when possible.
    pub async fn get_result(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        request_id: &str,
    ) -> Result<VerificationRecord, OperationError<StoreError>> {
        let key = result_cache_key(request_id);

        match self.cache.get(ctx, OP_READ_CACHED, request_id, &key).await {
            Ok(cached) if cached == PROCESSING_MARKER => {
                debug!(parent: &self.span, request_id, "result still processing, reading store");
            }
            Ok(cached) => match serde_json::from_str::<CachedSnapshot>(&cached) {
                Ok(snapshot) => return Ok(snapshot.into_record(user_id, request_id)),
                Err(err) => warn!(
                    parent: &self.span,
                    request_id,
                    error = %err,
                    "failed to decode cached result"
                ),
            },
            Err(err) if err.is_miss() => {}
            Err(err) => warn!(parent: &self.span, request_id, error = %err, "failed to read cache"),
        }

        self.store
            .find_by_request_and_user(ctx, request_id, user_id)
            .await
    }

    /// The request's record and the other records sharing its fingerprint.
    pub async fn get_duplicate_report(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        request_id: &str,
    ) -> Result<DuplicateReport, OperationError<StoreError>> {
        let original = self
            .store
            .find_by_request_and_user(ctx, request_id, user_id)
            .await?;

        let owner = match self.duplicate_scope {
            DuplicateScope::Owner => Some(user_id),
            DuplicateScope::Global => None,
        };
        let duplicates = self
            .store
            .find_duplicates_by_hash(
                ctx,
                owner,
                &original.fingerprint,
                Some(original.request_id.as_str()),
            )
            .await?;

        Ok(DuplicateReport {
            original,
            duplicates,
        })
    }

    pub async fn get_metrics_summary(
        &self,
        ctx: &RequestContext,
    ) -> Result<MetricsSummary, OperationError<StoreError>> {
        self.store
            .aggregate_metrics(ctx)
            .await
            .map(MetricsSummary::from)
    }

    fn abort(&self, err: VerifyError) -> VerifyError {
        error!(
            parent: &self.span,
            stage = err.operation(),
            request_id = err.correlation_id(),
            error = %err,
            "verification aborted"
        );
        err
    }
}
