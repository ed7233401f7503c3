//! Error types for the embedding service.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors from chunker configuration and splitting.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk size ({max_size})")]
    OverlapTooLarge { overlap: usize, max_size: usize },
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding count mismatch: sent {expected} texts, got {got} vectors")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection and timeout errors are retryable
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // Server errors might be transient (e.g., 503 Service Unavailable)
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            // Request errors depend on the underlying cause
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            // Bad configuration and malformed responses are not retryable
            EmbeddingError::ZeroBatchSize
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::CountMismatch { .. } => false,
        }
    }
}

/// Errors related to record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to record store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("insert error: {0}")]
    InsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("embedding dimension mismatch: store uses {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("cutoff must be within [-1, 1], got {0}")]
    InvalidCutoff(f32),

    #[error("top_k must be greater than zero")]
    ZeroTopK,
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection errors are always retryable
            StoreError::ConnectionError(_) => true,
            // Other backend errors might be transient
            StoreError::CollectionError(msg)
            | StoreError::InsertError(msg)
            | StoreError::SearchError(msg)
            | StoreError::DeleteError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
            // Caller mistakes never resolve by retrying
            StoreError::DimensionMismatch { .. }
            | StoreError::InvalidCutoff(_)
            | StoreError::ZeroTopK => false,
        }
    }
}

/// Errors from the ingestion and search pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Chunk(_) => false,
            PipelineError::Embedding(e) => e.is_retryable(),
            PipelineError::Store(e) => e.is_retryable(),
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to the daemon and its socket protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon is not running")]
    NotRunning,

    #[error("failed to spawn daemon: {0}")]
    SpawnError(String),

    #[error("timed out waiting for daemon")]
    Timeout,

    #[error("failed to connect to daemon: {0}")]
    ConnectionFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("daemon error: {0}")]
    Daemon(#[from] DaemonError),

    #[error("{0}")]
    Other(String),
}
