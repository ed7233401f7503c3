pub mod chunker;
pub mod encoder;
mod embedding;
mod metrics;
pub mod pipeline;
pub mod record_store;

pub use chunker::TextChunker;
pub use embedding::{EmbeddingClient, HealthResponse};
pub use encoder::{Embedder, Encoder};
pub use metrics::{MetricsStore, MetricsSummary};
pub use pipeline::{
    CHUNK_OVERLAP, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_CUTOFF, DEFAULT_TOP_K,
    EncodeOptions, Pipeline,
};
pub use record_store::{
    MemoryBackend, PgVectorBackend, QdrantBackend, RecordStore, StoreInfo, create_backend,
};
