//! Ingestion and retrieval pipeline.
//!
//! Composes chunker, encoder and record store for ingestion, and encoder
//! plus record store for search. All collaborators are injected; the
//! pipeline holds no global state.

use std::sync::Arc;
use std::time::Instant;

use crate::error::PipelineError;
use crate::models::{
    BulkEncodedChunk, BulkItem, EncodedChunk, IngestedChunk, NewRecord, SearchResults,
    StoredRecord,
};
use crate::services::chunker::TextChunker;
use crate::services::encoder::Encoder;
use crate::services::record_store::RecordStore;

/// Characters repeated between consecutive chunks. Fixed internally, not
/// caller-tunable.
pub const CHUNK_OVERLAP: usize = 20;

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CUTOFF: f32 = 0.2;
pub const DEFAULT_TOP_K: usize = 10;

/// Per-request sizing for chunking and encoding.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub batch_size: usize,
    pub chunk_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    encoder: Encoder,
    store: Arc<dyn RecordStore>,
}

impl Pipeline {
    pub fn new(encoder: Encoder, store: Arc<dyn RecordStore>) -> Self {
        Self { encoder, store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Chunk, encode and persist `text` under `reference_id`.
    ///
    /// Chunks are inserted one by one in source order. Ingestion is not
    /// atomic: when an insert fails partway, earlier chunks stay persisted
    /// and the error is surfaced. Callers can inspect the damage with
    /// [`Pipeline::list_by_reference`] and re-issue or delete by reference.
    pub async fn ingest(
        &self,
        text: &str,
        reference_id: &str,
        language: Option<String>,
        meta: serde_json::Value,
        opts: &EncodeOptions,
    ) -> Result<Vec<IngestedChunk>, PipelineError> {
        let chunker = TextChunker::new(opts.chunk_size, CHUNK_OVERLAP)?;
        let chunks = chunker.split(text);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.encoder.encode(&texts, opts.batch_size).await?;

        let mut ingested = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let id = self
                .store
                .insert(NewRecord {
                    text: chunk.text.clone(),
                    reference_id: reference_id.to_string(),
                    embedding: embedding.clone(),
                    language: language.clone(),
                    meta: meta.clone(),
                })
                .await?;

            ingested.push(IngestedChunk {
                id,
                text: chunk.text,
                embedding,
            });
        }

        Ok(ingested)
    }

    /// Encode `query` and return records scoring strictly above `cutoff`,
    /// best first, at most `top_k`.
    ///
    /// `language` is accepted for request-shape compatibility but is not
    /// applied as a filter.
    pub async fn search(
        &self,
        query: &str,
        _language: Option<&str>,
        cutoff: f32,
        top_k: usize,
    ) -> Result<SearchResults, PipelineError> {
        let start = Instant::now();

        let embedding = self.encoder.encode_one(query).await?;
        let hits = self.store.search(&embedding, cutoff, top_k).await?;

        Ok(SearchResults::new(
            query.to_string(),
            hits,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Chunk and encode without persisting.
    pub async fn encode(
        &self,
        text: &str,
        opts: &EncodeOptions,
    ) -> Result<Vec<EncodedChunk>, PipelineError> {
        let chunker = TextChunker::new(opts.chunk_size, CHUNK_OVERLAP)?;
        let chunks = chunker.split(text);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.encoder.encode(&texts, opts.batch_size).await?;

        Ok(texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| EncodedChunk { text, embedding })
            .collect())
    }

    /// Encode a query string as-is, without chunking.
    pub async fn encode_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(self.encoder.encode_one(text).await?)
    }

    /// Chunk and encode many items in one encoding pass. The output is
    /// flattened, one entry per chunk, each inheriting its source item's
    /// id; item order and chunk order within an item are preserved.
    pub async fn bulk_encode(
        &self,
        items: &[BulkItem],
        opts: &EncodeOptions,
    ) -> Result<Vec<BulkEncodedChunk>, PipelineError> {
        let chunker = TextChunker::new(opts.chunk_size, CHUNK_OVERLAP)?;

        let mut ids = Vec::new();
        let mut texts = Vec::new();
        for item in items {
            for chunk in chunker.split(&item.text) {
                ids.push(item.id.clone());
                texts.push(chunk.text);
            }
        }

        let embeddings = self.encoder.encode(&texts, opts.batch_size).await?;

        Ok(ids
            .into_iter()
            .zip(texts)
            .zip(embeddings)
            .map(|((id, text), embedding)| BulkEncodedChunk {
                id,
                text,
                embedding,
            })
            .collect())
    }

    /// Delete one record; absent ids are a no-op.
    pub async fn delete(&self, id: &str) -> Result<(), PipelineError> {
        Ok(self.store.delete(id).await?)
    }

    /// Delete all records under `reference_id`; returns the count removed.
    pub async fn delete_by_reference(&self, reference_id: &str) -> Result<u64, PipelineError> {
        Ok(self.store.delete_by_reference(reference_id).await?)
    }

    /// List records under `reference_id` for reconciliation after a
    /// partial ingestion.
    pub async fn list_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Vec<StoredRecord>, PipelineError> {
        Ok(self.store.list_by_reference(reference_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, StoreError};
    use crate::models::{SearchHit, empty_meta};
    use crate::services::encoder::test_support::SequenceEmbedder;
    use crate::services::record_store::{MemoryBackend, StoreInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 4;

    fn pipeline_with_store(store: Arc<dyn RecordStore>) -> Pipeline {
        let encoder = Encoder::new(Arc::new(SequenceEmbedder::new(DIM)));
        Pipeline::new(encoder, store)
    }

    fn pipeline() -> Pipeline {
        pipeline_with_store(Arc::new(MemoryBackend::new("test", DIM)))
    }

    fn opts(batch_size: usize, chunk_size: usize) -> EncodeOptions {
        EncodeOptions {
            batch_size,
            chunk_size,
        }
    }

    /// Store double whose inserts start failing after a threshold.
    struct FlakyStore {
        inner: MemoryBackend,
        inserts: AtomicUsize,
        fail_after: usize,
    }

    impl FlakyStore {
        fn new(fail_after: usize) -> Self {
            Self {
                inner: MemoryBackend::new("flaky", DIM),
                inserts: AtomicUsize::new(0),
                fail_after,
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn health_check(&self) -> Result<bool, StoreError> {
            self.inner.health_check().await
        }

        async fn ensure_ready(&self) -> Result<(), StoreError> {
            self.inner.ensure_ready().await
        }

        async fn info(&self) -> Result<Option<StoreInfo>, StoreError> {
            self.inner.info().await
        }

        async fn insert(&self, record: NewRecord) -> Result<String, StoreError> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err(StoreError::InsertError("connection lost".to_string()));
            }
            self.inner.insert(record).await
        }

        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn delete_by_reference(&self, reference_id: &str) -> Result<u64, StoreError> {
            self.inner.delete_by_reference(reference_id).await
        }

        async fn list_by_reference(
            &self,
            reference_id: &str,
        ) -> Result<Vec<StoredRecord>, StoreError> {
            self.inner.list_by_reference(reference_id).await
        }

        async fn search(
            &self,
            query: &[f32],
            cutoff: f32,
            top_k: usize,
        ) -> Result<Vec<SearchHit>, StoreError> {
            self.inner.search(query, cutoff, top_k).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn collection(&self) -> &str {
            self.inner.collection()
        }
    }

    #[tokio::test]
    async fn test_ingest_preserves_chunk_order() {
        let pipeline = pipeline();

        let text = "alpha beta gamma delta ".repeat(20);
        let ingested = pipeline
            .ingest(&text, "doc-1", None, empty_meta(), &opts(4, 100))
            .await
            .unwrap();

        assert!(ingested.len() > 1);
        // The sequence embedder writes the global input index into the
        // vector, so chunk order must show up as 0, 1, 2, ...
        for (i, chunk) in ingested.iter().enumerate() {
            assert_eq!(chunk.embedding[0], i as f32);
            assert!(!chunk.id.is_empty());
        }

        let stored = pipeline.list_by_reference("doc-1").await.unwrap();
        assert_eq!(stored.len(), ingested.len());
    }

    #[tokio::test]
    async fn test_ingest_empty_text() {
        let pipeline = pipeline();
        let ingested = pipeline
            .ingest("", "doc-1", None, empty_meta(), &EncodeOptions::default())
            .await
            .unwrap();
        assert!(ingested.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_chunk_size() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest("text", "doc-1", None, empty_meta(), &opts(32, 0))
            .await;
        assert!(matches!(result, Err(PipelineError::Chunk(_))));
    }

    #[tokio::test]
    async fn test_ingest_partial_failure_keeps_earlier_chunks() {
        let store = Arc::new(FlakyStore::new(2));
        let pipeline = pipeline_with_store(store.clone());

        let text = "alpha beta gamma delta ".repeat(20);
        let result = pipeline
            .ingest(&text, "doc-1", None, empty_meta(), &opts(8, 100))
            .await;
        assert!(matches!(result, Err(PipelineError::Store(_))));

        // The two inserts that succeeded before the failure are visible
        // through the reconciliation listing.
        let stored = pipeline.list_by_reference("doc-1").await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_propagates_zero_batch_size() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest("some text", "doc-1", None, empty_meta(), &opts(0, 100))
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::Embedding(EmbeddingError::ZeroBatchSize))
        ));
    }

    #[tokio::test]
    async fn test_search_roundtrip() {
        let store = Arc::new(MemoryBackend::new("test", 3));
        let encoder = Encoder::new(Arc::new(SequenceEmbedder::new(3)));
        let pipeline = Pipeline::new(encoder, store.clone());

        store
            .insert(NewRecord {
                text: "stored chunk".to_string(),
                reference_id: "doc".to_string(),
                // First sequence vector is [0, 0, 0] + index 0 -> [0,...];
                // store a record matching the query's direction instead.
                embedding: vec![1.0, 0.0, 0.0],
                language: None,
                meta: empty_meta(),
            })
            .await
            .unwrap();

        // SequenceEmbedder's first call yields [0.0, 0.0, 0.0]; zero
        // vectors score 0 against everything, below the default cutoff.
        let results = pipeline
            .search("query", None, DEFAULT_CUTOFF, DEFAULT_TOP_K)
            .await
            .unwrap();
        assert!(results.is_empty());

        // The second call yields [1.0, 0.0, 0.0]: an exact match.
        let results = pipeline
            .search("query", None, DEFAULT_CUTOFF, DEFAULT_TOP_K)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!((results.results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_encode_does_not_persist() {
        let store = Arc::new(MemoryBackend::new("test", DIM));
        let pipeline = pipeline_with_store(store.clone());

        let text = "alpha beta gamma delta ".repeat(20);
        let encoded = pipeline.encode(&text, &opts(8, 100)).await.unwrap();

        assert!(encoded.len() > 1);
        for chunk in &encoded {
            assert_eq!(chunk.embedding.len(), DIM);
        }
        assert_eq!(store.info().await.unwrap().unwrap().record_count, 0);
    }

    #[tokio::test]
    async fn test_encode_query_skips_chunking() {
        let pipeline = pipeline();
        // Far longer than any chunk size; still one vector.
        let text = "q".repeat(5000);
        let embedding = pipeline.encode_query(&text).await.unwrap();
        assert_eq!(embedding.len(), DIM);
    }

    #[tokio::test]
    async fn test_bulk_encode_inherits_item_ids() {
        let pipeline = pipeline();

        let items = vec![
            BulkItem {
                id: "one".to_string(),
                text: "alpha beta gamma delta ".repeat(10),
            },
            BulkItem {
                id: "two".to_string(),
                text: "short".to_string(),
            },
        ];

        let encoded = pipeline.bulk_encode(&items, &opts(8, 100)).await.unwrap();

        let ones: Vec<_> = encoded.iter().filter(|c| c.id == "one").collect();
        let twos: Vec<_> = encoded.iter().filter(|c| c.id == "two").collect();
        assert!(ones.len() > 1);
        assert_eq!(twos.len(), 1);
        assert_eq!(twos[0].text, "short");
        // Flattened order: all of item one's chunks, then item two's.
        assert_eq!(encoded.len(), ones.len() + twos.len());
        for (i, chunk) in encoded.iter().enumerate() {
            assert_eq!(chunk.embedding[0], i as f32);
        }
    }

    #[tokio::test]
    async fn test_delete_passthrough_idempotent() {
        let pipeline = pipeline();
        let ingested = pipeline
            .ingest("tiny", "doc", None, empty_meta(), &EncodeOptions::default())
            .await
            .unwrap();
        assert_eq!(ingested.len(), 1);

        pipeline.delete(&ingested[0].id).await.unwrap();
        pipeline.delete(&ingested[0].id).await.unwrap();

        assert_eq!(pipeline.delete_by_reference("doc").await.unwrap(), 0);
        assert_eq!(pipeline.delete_by_reference("doc").await.unwrap(), 0);
    }
}
