//! Batch encoding over an external embedding capability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// External embedding capability: one fixed-length vector per input text,
/// order preserved. Implementations are injected into the [`Encoder`] so
/// deployments and tests choose their own model transport.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Vector length this capability produces.
    fn dimension(&self) -> usize;
}

/// Order-preserving batch encoder.
///
/// Partitions input into sub-batches to bound peak resource use per
/// external call; results are concatenated in input order. Failures from
/// the capability are surfaced as-is, retry policy is the caller's.
#[derive(Clone)]
pub struct Encoder {
    embedder: Arc<dyn Embedder>,
}

impl Encoder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Encode `texts` in sub-batches of at most `batch_size`.
    ///
    /// The output has the same length and order as the input. A sub-batch
    /// returning a different number of vectors than it was sent is an
    /// error, not a silent misalignment.
    pub async fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if batch_size == 0 {
            return Err(EmbeddingError::ZeroBatchSize);
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size) {
            let embeddings = self.embedder.embed(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    got: embeddings.len(),
                });
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    /// Encode a single text as a one-item batch.
    pub async fn encode_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self.encode(&[text.to_string()], 1).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder double: vector `i` encodes the global input
    /// index, so order preservation is observable.
    pub struct SequenceEmbedder {
        pub dimension: usize,
        pub calls: AtomicUsize,
        pub max_batch_seen: AtomicUsize,
        counter: AtomicUsize,
    }

    impl SequenceEmbedder {
        pub fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
                max_batch_seen: AtomicUsize::new(0),
                counter: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for SequenceEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_batch_seen.fetch_max(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|_| {
                    let index = self.counter.fetch_add(1, Ordering::SeqCst);
                    let mut vector = vec![0.0; self.dimension];
                    vector[0] = index as f32;
                    vector
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    /// Embedder double that returns the wrong number of vectors.
    pub struct ShortchangingEmbedder;

    #[async_trait]
    impl Embedder for ShortchangingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().skip(1).map(|_| vec![0.0; 4]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{SequenceEmbedder, ShortchangingEmbedder};
    use super::*;
    use std::sync::atomic::Ordering;

    fn inputs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    #[tokio::test]
    async fn test_encode_preserves_order() {
        let embedder = Arc::new(SequenceEmbedder::new(4));
        let encoder = Encoder::new(embedder);

        let embeddings = encoder.encode(&inputs(10), 3).await.unwrap();

        assert_eq!(embeddings.len(), 10);
        for (i, vector) in embeddings.iter().enumerate() {
            assert_eq!(vector[0], i as f32);
            assert_eq!(vector.len(), 4);
        }
    }

    #[tokio::test]
    async fn test_encode_respects_batch_size() {
        let embedder = Arc::new(SequenceEmbedder::new(4));
        let encoder = Encoder::new(embedder.clone());

        encoder.encode(&inputs(10), 3).await.unwrap();

        // 10 inputs at batch size 3: four calls, none larger than 3.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(embedder.max_batch_seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_encode_empty_input() {
        let encoder = Encoder::new(Arc::new(SequenceEmbedder::new(4)));
        let embeddings = encoder.encode(&[], 8).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_encode_zero_batch_size() {
        let encoder = Encoder::new(Arc::new(SequenceEmbedder::new(4)));
        let result = encoder.encode(&inputs(2), 0).await;
        assert!(matches!(result, Err(EmbeddingError::ZeroBatchSize)));
    }

    #[tokio::test]
    async fn test_encode_count_mismatch() {
        let encoder = Encoder::new(Arc::new(ShortchangingEmbedder));
        let result = encoder.encode(&inputs(3), 8).await;
        assert!(matches!(
            result,
            Err(EmbeddingError::CountMismatch {
                expected: 3,
                got: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_encode_one() {
        let encoder = Encoder::new(Arc::new(SequenceEmbedder::new(4)));
        let vector = encoder.encode_one("query").await.unwrap();
        assert_eq!(vector.len(), 4);
    }
}
