//! Record store abstraction layer.
//!
//! A trait-based abstraction over vector-capable storage backends (Qdrant,
//! PostgreSQL/pgvector, in-memory) so the pipeline is backend-agnostic.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::MemoryBackend;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{NewRecord, SearchHit, StoreConfig, StoreDriver, StoredRecord};

/// Collection/table information.
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub record_count: u64,
}

/// Abstract persistence for embedding records.
///
/// Records are immutable once written: there is no update operation.
/// Inserts are committed before returning and each one yields a fresh
/// unique id. Deletes of absent records are benign no-ops.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check if the store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Create the collection/table if it doesn't exist.
    async fn ensure_ready(&self) -> Result<(), StoreError>;

    /// Get information about the current collection/table.
    /// Returns None if the collection doesn't exist.
    async fn info(&self) -> Result<Option<StoreInfo>, StoreError>;

    /// Insert one record and return its generated id. The write is durable
    /// and visible to subsequent queries once this returns. Fails on an
    /// embedding whose length differs from the store's dimension.
    async fn insert(&self, record: NewRecord) -> Result<String, StoreError>;

    /// Delete one record by id; absent ids are a no-op.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Delete every record sharing `reference_id`; returns the count,
    /// which may be zero.
    async fn delete_by_reference(&self, reference_id: &str) -> Result<u64, StoreError>;

    /// List records sharing `reference_id`, oldest first. Lets callers
    /// reconcile partially ingested documents.
    async fn list_by_reference(&self, reference_id: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Similarity search: hits with cosine similarity strictly above
    /// `cutoff`, descending by score, at most `top_k`. A query whose
    /// length differs from the store's dimension is a hard error.
    async fn search(
        &self,
        query: &[f32],
        cutoff: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;

    /// Vector length this store was created with.
    fn dimension(&self) -> usize;

    /// Collection/table name.
    fn collection(&self) -> &str;
}

/// Reject out-of-range search parameters before touching the backend.
pub fn validate_search_params(cutoff: f32, top_k: usize) -> Result<(), StoreError> {
    if !(-1.0..=1.0).contains(&cutoff) || cutoff.is_nan() {
        return Err(StoreError::InvalidCutoff(cutoff));
    }
    if top_k == 0 {
        return Err(StoreError::ZeroTopK);
    }
    Ok(())
}

/// Cosine similarity of two equal-length vectors; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Create a record store backend based on configuration.
pub async fn create_backend(
    config: &StoreConfig,
    dimension: usize,
) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config.driver {
        StoreDriver::Qdrant => {
            let backend = QdrantBackend::new(config, dimension)?;
            Ok(Arc::new(backend))
        }
        StoreDriver::Postgres => {
            let backend = PgVectorBackend::new(config, dimension).await?;
            Ok(Arc::new(backend))
        }
        StoreDriver::Memory => Ok(Arc::new(MemoryBackend::new(&config.collection, dimension))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_validate_search_params() {
        assert!(validate_search_params(0.2, 10).is_ok());
        assert!(validate_search_params(-1.0, 1).is_ok());
        assert!(validate_search_params(1.0, 1).is_ok());
        assert!(matches!(
            validate_search_params(1.5, 10),
            Err(StoreError::InvalidCutoff(_))
        ));
        assert!(matches!(
            validate_search_params(f32::NAN, 10),
            Err(StoreError::InvalidCutoff(_))
        ));
        assert!(matches!(
            validate_search_params(0.0, 0),
            Err(StoreError::ZeroTopK)
        ));
    }
}
