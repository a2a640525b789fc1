//! In-memory verification store
//!
//! Development fallback and test backend. Records are lost on restart.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::VerificationStore;
use crate::error::StoreError;
use crate::model::{MetricsAggregate, VerificationRecord};

/// `Vec`-backed store enforcing the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<VerificationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;

        if records.iter().any(|r| r.request_id == record.request_id) {
            return Err(StoreError::Conflict(format!(
                "request_id {} already exists",
                record.request_id
            )));
        }
        if records
            .iter()
            .any(|r| r.user_id == record.user_id && r.fingerprint == record.fingerprint)
        {
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint \"idx_verification_logs_user_hash\""
                    .to_string(),
            ));
        }

        records.push(record.clone());
        Ok(())
    }

    async fn find_by_request_and_user(
        &self,
        request_id: &str,
        user_id: &str,
    ) -> Result<VerificationRecord, StoreError> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.request_id == request_id && r.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_duplicates_by_hash(
        &self,
        user_id: Option<&str>,
        fingerprint: &str,
        exclude_request_id: Option<&str>,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        let mut matches: Vec<_> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.fingerprint == fingerprint)
            .filter(|r| user_id.map_or(true, |owner| r.user_id == owner))
            .filter(|r| exclude_request_id.map_or(true, |excluded| r.request_id != excluded))
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn aggregate_metrics(&self) -> Result<MetricsAggregate, StoreError> {
        let records = self.records.read().await;
        if records.is_empty() {
            return Ok(MetricsAggregate::default());
        }

        let total = records.len() as f64;
        Ok(MetricsAggregate {
            total_count: records.len() as i64,
            success_count: records.iter().filter(|r| r.success).count() as i64,
            average_score: records.iter().map(|r| f64::from(r.score)).sum::<f64>() / total,
            average_latency_ms: records.iter().map(|r| r.processing_latency_ms).sum::<f64>()
                / total,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::fingerprint;

    fn record(request_id: &str, user_id: &str, image: &[u8], minutes_ago: i64) -> VerificationRecord {
        VerificationRecord {
            request_id: request_id.into(),
            user_id: user_id.into(),
            fingerprint: fingerprint(image),
            score: 0.5,
            success: true,
            details: String::new(),
            processing_latency_ms: 10.0,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_same_user_same_bytes_conflicts() {
        let store = MemoryStore::new();
        store.save(&record("a", "alice", b"img", 0)).await.unwrap();

        let err = store.save(&record("b", "alice", b"img", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Another owner may submit the same bytes.
        store.save(&record("c", "bob", b"img", 0)).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_request_id_conflicts() {
        let store = MemoryStore::new();
        store.save(&record("a", "alice", b"one", 0)).await.unwrap();

        let err = store.save(&record("a", "bob", b"two", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_requires_matching_owner() {
        let store = MemoryStore::new();
        store.save(&record("a", "alice", b"img", 0)).await.unwrap();

        assert!(store.find_by_request_and_user("a", "alice").await.is_ok());
        assert!(matches!(
            store.find_by_request_and_user("a", "mallory").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicates_newest_first_excluding_self() {
        let store = MemoryStore::new();
        store.save(&record("old", "alice", b"img", 30)).await.unwrap();
        store.save(&record("mid", "bob", b"img", 20)).await.unwrap();
        store.save(&record("new", "carol", b"img", 10)).await.unwrap();
        store.save(&record("other", "alice", b"different", 5)).await.unwrap();

        let hash = fingerprint(b"img");
        let all = store
            .find_duplicates_by_hash(None, &hash, Some("old"))
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, ["new", "mid"]);

        let scoped = store
            .find_duplicates_by_hash(Some("alice"), &hash, Some("old"))
            .await
            .unwrap();
        assert!(scoped.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_metrics() {
        let store = MemoryStore::new();
        assert_eq!(
            store.aggregate_metrics().await.unwrap(),
            MetricsAggregate::default()
        );

        let mut failed = record("b", "alice", b"two", 0);
        failed.success = false;
        failed.score = 0.25;
        failed.processing_latency_ms = 30.0;
        store.save(&record("a", "alice", b"one", 0)).await.unwrap();
        store.save(&failed).await.unwrap();

        let aggregate = store.aggregate_metrics().await.unwrap();
        assert_eq!(aggregate.total_count, 2);
        assert_eq!(aggregate.success_count, 1);
        assert!((aggregate.average_score - 0.375).abs() < 1e-9);
        assert!((aggregate.average_latency_ms - 20.0).abs() < 1e-9);
    }
}
