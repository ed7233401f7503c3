mod config;
mod record;
mod search;

pub use config::{
    Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_URL,
    DEFAULT_POSTGRES_URL, DEFAULT_QDRANT_URL, DaemonConfig, EmbeddingConfig, IngestConfig,
    MetricsConfig, SearchConfig, StoreConfig, StoreDriver,
};
pub use record::{
    BulkEncodedChunk, BulkItem, Chunk, EncodedChunk, IngestedChunk, NewRecord, StoredRecord,
    empty_meta,
};
pub use search::{OutputFormat, SearchHit, SearchResults};
