//! In-process record store backend.
//!
//! Non-durable: records live only as long as the owning process. Scoring
//! is exact cosine similarity computed in Rust, which also makes this
//! backend the reference for the search contract. Score ties are broken
//! by insertion order.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordStore, StoreInfo, cosine_similarity, validate_search_params};
use crate::error::StoreError;
use crate::models::{NewRecord, SearchHit, StoredRecord};

pub struct MemoryBackend {
    collection: String,
    dimension: usize,
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryBackend {
    pub fn new(collection: &str, dimension: usize) -> Self {
        Self {
            collection: collection.to_string(),
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }

    fn check_dimension(&self, len: usize) -> Result<(), StoreError> {
        if len != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: len,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn ensure_ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn info(&self) -> Result<Option<StoreInfo>, StoreError> {
        let records = self.records.read().await;
        Ok(Some(StoreInfo {
            record_count: records.len() as u64,
        }))
    }

    async fn insert(&self, record: NewRecord) -> Result<String, StoreError> {
        self.check_dimension(record.embedding.len())?;

        let id = uuid::Uuid::new_v4().to_string();
        let stored = StoredRecord {
            id: id.clone(),
            text: record.text,
            reference_id: record.reference_id,
            embedding: record.embedding,
            language: record.language,
            meta: record.meta,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        self.records.write().await.push(stored);
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records.write().await.retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_by_reference(&self, reference_id: &str) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.reference_id != reference_id);
        Ok((before - records.len()) as u64)
    }

    async fn list_by_reference(&self, reference_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.reference_id == reference_id)
            .cloned()
            .collect())
    }

    async fn search(
        &self,
        query: &[f32],
        cutoff: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        validate_search_params(cutoff, top_k)?;
        self.check_dimension(query.len())?;

        let records = self.records.read().await;
        let mut hits: Vec<SearchHit> = records
            .iter()
            .map(|r| SearchHit {
                id: r.id.clone(),
                text: r.text.clone(),
                reference_id: r.reference_id.clone(),
                score: cosine_similarity(&r.embedding, query),
            })
            .filter(|hit| hit.score > cutoff)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::empty_meta;

    fn record(text: &str, reference_id: &str, embedding: Vec<f32>) -> NewRecord {
        NewRecord {
            text: text.to_string(),
            reference_id: reference_id.to_string(),
            embedding,
            language: None,
            meta: empty_meta(),
        }
    }

    #[tokio::test]
    async fn test_insert_returns_fresh_ids() {
        let store = MemoryBackend::new("test", 3);
        let a = store.insert(record("a", "ref", vec![1.0, 0.0, 0.0])).await.unwrap();
        let b = store.insert(record("b", "ref", vec![0.0, 1.0, 0.0])).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.info().await.unwrap().unwrap().record_count, 2);
    }

    #[tokio::test]
    async fn test_insert_dimension_mismatch() {
        let store = MemoryBackend::new("test", 3);
        let result = store.insert(record("a", "ref", vec![1.0, 0.0])).await;
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch {
                expected: 3,
                got: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch() {
        let store = MemoryBackend::new("test", 3);
        let result = store.search(&[1.0, 0.0], 0.2, 10).await;
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_exact_match_scores_one() {
        let store = MemoryBackend::new("test", 3);
        store.insert(record("a", "ref", vec![1.0, 0.0, 0.0])).await.unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 0.2, 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[0].text, "a");
        assert_eq!(hits[0].reference_id, "ref");
    }

    #[tokio::test]
    async fn test_search_cutoff_is_strict() {
        let store = MemoryBackend::new("test", 2);
        // Orthogonal to the query: score exactly 0.
        store.insert(record("a", "ref", vec![0.0, 1.0])).await.unwrap();

        let at_zero = store.search(&[1.0, 0.0], 0.0, 10).await.unwrap();
        assert!(at_zero.is_empty());

        let below_zero = store.search(&[1.0, 0.0], -0.1, 10).await.unwrap();
        assert_eq!(below_zero.len(), 1);
    }

    #[tokio::test]
    async fn test_search_ranking_and_top_k() {
        let store = MemoryBackend::new("test", 2);
        store.insert(record("far", "r", vec![0.0, 1.0])).await.unwrap();
        store.insert(record("near", "r", vec![1.0, 0.1])).await.unwrap();
        store.insert(record("exact", "r", vec![1.0, 0.0])).await.unwrap();

        let hits = store.search(&[1.0, 0.0], -1.0, 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "exact");
        assert_eq!(hits[1].text, "near");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_tie_break_by_insertion_order() {
        let store = MemoryBackend::new("test", 2);
        let first = store.insert(record("first", "r", vec![1.0, 0.0])).await.unwrap();
        let second = store.insert(record("second", "r", vec![2.0, 0.0])).await.unwrap();

        // Both score 1.0 against the query; insertion order decides.
        let hits = store.search(&[1.0, 0.0], 0.5, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, first);
        assert_eq!(hits[1].id, second);
    }

    #[tokio::test]
    async fn test_search_invalid_params() {
        let store = MemoryBackend::new("test", 2);
        assert!(matches!(
            store.search(&[1.0, 0.0], 1.5, 10).await,
            Err(StoreError::InvalidCutoff(_))
        ));
        assert!(matches!(
            store.search(&[1.0, 0.0], 0.2, 0).await,
            Err(StoreError::ZeroTopK)
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryBackend::new("test", 2);
        let id = store.insert(record("a", "ref", vec![1.0, 0.0])).await.unwrap();

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        store.delete("never-existed").await.unwrap();

        assert_eq!(store.info().await.unwrap().unwrap().record_count, 0);
    }

    #[tokio::test]
    async fn test_delete_by_reference_counts() {
        let store = MemoryBackend::new("test", 2);
        store.insert(record("a1", "a", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("a2", "a", vec![0.0, 1.0])).await.unwrap();
        store.insert(record("b1", "b", vec![1.0, 1.0])).await.unwrap();

        assert_eq!(store.delete_by_reference("a").await.unwrap(), 2);
        assert_eq!(store.delete_by_reference("a").await.unwrap(), 0);
        assert_eq!(store.info().await.unwrap().unwrap().record_count, 1);
    }

    #[tokio::test]
    async fn test_delete_by_reference_then_orthogonal_search() {
        // Records under ref A ([1,0,0]) and ref B ([0,1,0]); deleting A and
        // searching [1,0,0] with cutoff 0.2 finds nothing: A is gone and B
        // scores 0.
        let store = MemoryBackend::new("test", 3);
        store.insert(record("a", "A", vec![1.0, 0.0, 0.0])).await.unwrap();
        store.insert(record("b", "B", vec![0.0, 1.0, 0.0])).await.unwrap();

        store.delete_by_reference("A").await.unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 0.2, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_reference() {
        let store = MemoryBackend::new("test", 2);
        store.insert(record("a1", "a", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("a2", "a", vec![0.0, 1.0])).await.unwrap();
        store.insert(record("b1", "b", vec![1.0, 1.0])).await.unwrap();

        let listed = store.list_by_reference("a").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].text, "a1");
        assert_eq!(listed[1].text, "a2");

        assert!(store.list_by_reference("missing").await.unwrap().is_empty());
    }
}
