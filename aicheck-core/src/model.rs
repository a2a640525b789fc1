//! Verification records and the views derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted outcome of one verification request.
///
/// Built once by the orchestrator after a successful scorer call and immutable
/// afterwards. `(user_id, fingerprint)` and `request_id` are each unique in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    /// Globally unique request identifier
    pub request_id: String,
    /// Owner, taken verbatim from the authenticated identity
    pub user_id: String,
    /// SHA-1 hex digest of the submitted bytes
    pub fingerprint: String,
    /// Score reported by the external scorer
    pub score: f32,
    /// Outcome reported by the external scorer
    pub success: bool,
    /// Free-text summary
    pub details: String,
    /// Wall-clock duration of the scorer call
    pub processing_latency_ms: f64,
    pub created_at: DateTime<Utc>,
}

/// Serialized projection of a [`VerificationRecord`] kept in the cache.
///
/// Field names are the cache wire format shared with other readers of the same keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub user_id: String,
    pub score: f32,
    pub success: bool,
    #[serde(default)]
    pub details: String,
    #[serde(rename = "sha1_hash")]
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl From<&VerificationRecord> for CachedSnapshot {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            request_id: record.request_id.clone(),
            user_id: record.user_id.clone(),
            score: record.score,
            success: record.success,
            details: record.details.clone(),
            fingerprint: record.fingerprint.clone(),
            created_at: record.created_at,
        }
    }
}

impl CachedSnapshot {
    /// Rebuild a record view for a lookup of `(user_id, request_id)`.
    ///
    /// Cached identity fields win when present and non-empty. Latency is not part
    /// of the snapshot and reads back as zero.
    pub fn into_record(self, user_id: &str, request_id: &str) -> VerificationRecord {
        let pick = |cached: String, fallback: &str| {
            if cached.is_empty() {
                fallback.to_string()
            } else {
                cached
            }
        };

        VerificationRecord {
            request_id: pick(self.request_id, request_id),
            user_id: pick(self.user_id, user_id),
            fingerprint: self.fingerprint,
            score: self.score,
            success: self.success,
            details: self.details,
            processing_latency_ms: 0.0,
            created_at: self.created_at,
        }
    }
}

/// A record plus the other records sharing its fingerprint, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateReport {
    pub original: VerificationRecord,
    pub duplicates: Vec<VerificationRecord>,
}

/// Raw aggregate over every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsAggregate {
    pub total_count: i64,
    pub success_count: i64,
    /// Mean score (zero when the store is empty)
    pub average_score: f64,
    /// Mean scorer latency in milliseconds (zero when the store is empty)
    pub average_latency_ms: f64,
}

/// Metrics as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub total_requests: i64,
    pub successful_requests: i64,
    /// `successful_requests / total_requests`, or 0 when there are no requests
    pub success_rate: f64,
    pub average_score: f64,
    pub average_processing_latency_ms: f64,
}

impl From<MetricsAggregate> for MetricsSummary {
    fn from(aggregate: MetricsAggregate) -> Self {
        let success_rate = if aggregate.total_count > 0 {
            aggregate.success_count as f64 / aggregate.total_count as f64
        } else {
            0.0
        };

        Self {
            total_requests: aggregate.total_count,
            successful_requests: aggregate.success_count,
            success_rate,
            average_score: aggregate.average_score,
            average_processing_latency_ms: aggregate.average_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> VerificationRecord {
        VerificationRecord {
            request_id: "req-1".into(),
            user_id: "user-1".into(),
            fingerprint: "a9993e364706816aba3e25717850c26c9cd0d89d".into(),
            score: 0.75,
            success: true,
            details: "status:true score:0.750000 hash:a9993e364706816aba3e25717850c26c9cd0d89d"
                .into(),
            processing_latency_ms: 12.5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_uses_sha1_hash_field() {
        let snapshot = CachedSnapshot::from(&record());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["sha1_hash"], "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(json["request_id"], "req-1");
        assert!(json.get("fingerprint").is_none());
    }

    #[test]
    fn test_snapshot_identity_overrides_only_when_present() {
        let original = record();
        let mut snapshot = CachedSnapshot::from(&original);

        let view = snapshot.clone().into_record("other-user", "other-req");
        assert_eq!(view.user_id, "user-1");
        assert_eq!(view.request_id, "req-1");

        snapshot.user_id.clear();
        snapshot.request_id.clear();
        let view = snapshot.into_record("other-user", "other-req");
        assert_eq!(view.user_id, "other-user");
        assert_eq!(view.request_id, "other-req");
        assert_eq!(view.fingerprint, original.fingerprint);
    }

    #[test]
    fn test_success_rate() {
        let summary = MetricsSummary::from(MetricsAggregate {
            total_count: 5,
            success_count: 3,
            average_score: 0.5,
            average_latency_ms: 20.0,
        });
        assert!((summary.success_rate - 0.6).abs() < f64::EPSILON);

        let empty = MetricsSummary::from(MetricsAggregate::default());
        assert_eq!(empty.success_rate, 0.0);
        assert_eq!(empty.total_requests, 0);
    }
}
