//! PostgreSQL verification store
//!
//! Schema is created in place with `IF NOT EXISTS` statements so `ensure_schema`
//! can run on every startup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::VerificationStore;
use crate::error::StoreError;
use crate::model::{MetricsAggregate, VerificationRecord};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS verification_logs (
        id BIGSERIAL PRIMARY KEY,
        request_id VARCHAR(64) NOT NULL UNIQUE,
        user_id VARCHAR(64) NOT NULL,
        sha1_hash CHAR(40) NOT NULL,
        score REAL NOT NULL,
        success BOOLEAN NOT NULL,
        details TEXT NOT NULL DEFAULT '',
        processing_latency_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_verification_logs_sha1_hash ON verification_logs (sha1_hash)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_verification_logs_user_hash ON verification_logs (user_id, sha1_hash)",
];

const SELECT_COLUMNS: &str = "request_id, user_id, sha1_hash, score, success, details, \
                              processing_latency_ms, created_at";

/// Connection pool bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection before `PoolTimedOut`
    pub acquire_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

/// PostgreSQL-backed store over a bounded `PgPool`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct VerificationRow {
    request_id: String,
    user_id: String,
    sha1_hash: String,
    score: f32,
    success: bool,
    details: String,
    processing_latency_ms: f64,
    created_at: DateTime<Utc>,
}

impl From<VerificationRow> for VerificationRecord {
    fn from(row: VerificationRow) -> Self {
        Self {
            request_id: row.request_id,
            user_id: row.user_id,
            // CHAR(n) pads with spaces
            fingerprint: row.sha1_hash.trim_end().to_string(),
            score: row.score,
            success: row.success,
            details: row.details,
            processing_latency_ms: row.processing_latency_ms,
            created_at: row.created_at,
        }
    }
}

impl PostgresStore {
    /// Connect to `database_url` with the given pool bounds.
    pub async fn connect(database_url: &str, settings: PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .max_lifetime(settings.max_lifetime)
            .connect(database_url)
            .await?;

        tracing::info!(
            max_connections = settings.max_connections,
            min_connections = settings.min_connections,
            "Connected to PostgreSQL database"
        );
        Ok(Self { pool })
    }
}

#[async_trait]
impl VerificationStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn save(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO verification_logs
                (request_id, user_id, sha1_hash, score, success, details,
                 processing_latency_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.request_id)
        .bind(&record.user_id)
        .bind(&record.fingerprint)
        .bind(record.score)
        .bind(record.success)
        .bind(&record.details)
        .bind(record.processing_latency_ms)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_request_and_user(
        &self,
        request_id: &str,
        user_id: &str,
    ) -> Result<VerificationRecord, StoreError> {
        let row = sqlx::query_as::<_, VerificationRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM verification_logs \
             WHERE request_id = $1 AND user_id = $2 LIMIT 1"
        ))
        .bind(request_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VerificationRecord::from).ok_or(StoreError::NotFound)
    }

    async fn find_duplicates_by_hash(
        &self,
        user_id: Option<&str>,
        fingerprint: &str,
        exclude_request_id: Option<&str>,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        // NULL parameters disable the optional filters
        let rows = sqlx::query_as::<_, VerificationRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM verification_logs \
             WHERE sha1_hash = $1 \
               AND ($2::TEXT IS NULL OR user_id = $2) \
               AND ($3::TEXT IS NULL OR request_id <> $3) \
             ORDER BY created_at DESC"
        ))
        .bind(fingerprint)
        .bind(user_id)
        .bind(exclude_request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VerificationRecord::from).collect())
    }

    async fn aggregate_metrics(&self) -> Result<MetricsAggregate, StoreError> {
        let (total_count, success_count, average_score, average_latency_ms) =
            sqlx::query_as::<_, (i64, i64, f64, f64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE success),
                    COALESCE(AVG(score), 0)::FLOAT8,
                    COALESCE(AVG(processing_latency_ms), 0)::FLOAT8
                FROM verification_logs
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(MetricsAggregate {
            total_count,
            success_count,
            average_score,
            average_latency_ms,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
