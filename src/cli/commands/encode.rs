//! Encode command: embeddings without persistence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::models::{BulkItem, Config, OutputFormat};
use crate::services::pipeline::EncodeOptions;
use crate::services::{Embedder, EmbeddingClient, Encoder, MemoryBackend, Pipeline};
use crate::utils::file::read_input;

#[derive(Debug, Args)]
pub struct EncodeArgs {
    #[arg(help = "File to encode; reads stdin when omitted")]
    pub path: Option<PathBuf>,

    #[arg(long, help = "Encode this text instead of reading a file or stdin")]
    pub text: Option<String>,

    #[arg(long, short = 'q', help = "Encode as a query: one vector, no chunking")]
    pub query: bool,

    #[arg(
        long,
        help = "Bulk mode: input is JSON Lines of {\"id\", \"text\"}, output is one entry per chunk"
    )]
    pub bulk: bool,

    #[arg(long, help = "Embedding batch size")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Maximum chunk size in characters")]
    pub chunk_size: Option<usize>,
}

pub async fn handle_encode(args: EncodeArgs, _format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;

    let input = match args.text {
        Some(ref text) => text.clone(),
        None => read_input(args.path.as_deref(), config.ingest.max_input_size)
            .context("failed to read input")?,
    };

    if input.trim().is_empty() {
        anyhow::bail!("input text is empty");
    }

    let opts = EncodeOptions {
        batch_size: args
            .batch_size
            .unwrap_or(config.embedding.batch_size as usize),
        chunk_size: args.chunk_size.unwrap_or(config.ingest.chunk_size as usize),
    };

    // Encoding never persists anything, so no store backend is opened.
    let embedding_client =
        EmbeddingClient::new(&config.embedding).context("failed to create embedding client")?;
    let dimension = embedding_client.dimension();
    let pipeline = Pipeline::new(
        Encoder::new(Arc::new(embedding_client)),
        Arc::new(MemoryBackend::new("encode", dimension)),
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Encoding...");

    let output = if args.query {
        let embedding = pipeline.encode_query(input.trim_end()).await;
        spinner.finish_and_clear();
        serde_json::to_string_pretty(&serde_json::json!({ "embedding": embedding? }))?
    } else if args.bulk {
        let items = parse_bulk_items(&input)?;
        if verbose {
            eprintln!("Bulk encoding {} items", items.len());
        }
        let chunks = pipeline.bulk_encode(&items, &opts).await;
        spinner.finish_and_clear();
        serde_json::to_string_pretty(&serde_json::json!({ "chunks": chunks? }))?
    } else {
        let chunks = pipeline.encode(&input, &opts).await;
        spinner.finish_and_clear();
        serde_json::to_string_pretty(&serde_json::json!({ "chunks": chunks? }))?
    };

    println!("{}", output);

    Ok(())
}

fn parse_bulk_items(input: &str) -> Result<Vec<BulkItem>> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid bulk item on line {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bulk_items() {
        let input = r#"
            {"id": "a", "text": "first"}
            {"id": "b", "text": "second"}
        "#;
        let items = parse_bulk_items(input).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[1].text, "second");
    }

    #[test]
    fn test_parse_bulk_items_rejects_garbage() {
        assert!(parse_bulk_items("not json").is_err());
    }
}
