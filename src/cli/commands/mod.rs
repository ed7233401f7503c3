mod config;
mod delete;
mod encode;
mod ingest;
mod records;
mod search;
mod serve;
mod status;

pub use config::ConfigCommand;
pub use delete::DeleteCommand;
pub use encode::EncodeArgs;
pub use ingest::IngestArgs;
pub use records::RecordsArgs;
pub use search::SearchArgs;
pub use serve::ServeArgs;

pub use config::handle_config;
pub use delete::handle_delete;
pub use encode::handle_encode;
pub use ingest::handle_ingest;
pub use records::handle_records;
pub use search::handle_search;
pub use serve::handle_serve;
pub use status::handle_status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{EmbeddingClient, Encoder, Pipeline, create_backend};

/// Build a pipeline straight from configuration: embedding client plus
/// record store backend, with the store made ready for writes.
pub(crate) async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedding_client =
        EmbeddingClient::new(&config.embedding).context("failed to create embedding client")?;

    let store = create_backend(&config.store, config.embedding.dimension as usize)
        .await
        .context("failed to connect to record store")?;
    store
        .ensure_ready()
        .await
        .context("failed to prepare record store")?;

    Ok(Pipeline::new(
        Encoder::new(Arc::new(embedding_client)),
        store,
    ))
}
