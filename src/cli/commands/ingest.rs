//! Ingest command implementation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::{IngestStats, get_formatter};
use crate::models::{Config, OutputFormat, empty_meta};
use crate::services::pipeline::EncodeOptions;
use crate::utils::file::read_input;

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(help = "File to ingest; reads stdin when omitted")]
    pub path: Option<PathBuf>,

    #[arg(long, help = "Ingest this text instead of reading a file or stdin")]
    pub text: Option<String>,

    #[arg(long, short = 'r', help = "Reference id grouping this document's chunks")]
    pub reference_id: String,

    #[arg(long, short = 'l', help = "Language tag stored with each record")]
    pub language: Option<String>,

    #[arg(long, short = 'm', help = "Metadata as a JSON object")]
    pub meta: Option<String>,

    #[arg(long, help = "Embedding batch size")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Maximum chunk size in characters")]
    pub chunk_size: Option<usize>,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let text = match args.text {
        Some(text) => text,
        None => read_input(args.path.as_deref(), config.ingest.max_input_size)
            .context("failed to read input")?,
    };

    if text.trim().is_empty() {
        anyhow::bail!("input text is empty");
    }

    let meta = match args.meta {
        Some(ref raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("failed to parse --meta as JSON")?;
            if !value.is_object() {
                anyhow::bail!("--meta must be a JSON object");
            }
            value
        }
        None => empty_meta(),
    };

    let opts = EncodeOptions {
        batch_size: args
            .batch_size
            .unwrap_or(config.embedding.batch_size as usize),
        chunk_size: args.chunk_size.unwrap_or(config.ingest.chunk_size as usize),
    };

    if verbose {
        eprintln!("Reference: {}", args.reference_id);
        eprintln!("  Input: {} chars", text.chars().count());
        eprintln!("  Chunk size: {}", opts.chunk_size);
        eprintln!("  Batch size: {}", opts.batch_size);
    }

    let pipeline = super::build_pipeline(&config).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Encoding and storing chunks...");

    let result = pipeline
        .ingest(&text, &args.reference_id, args.language, meta, &opts)
        .await;
    spinner.finish_and_clear();

    let ingested = match result {
        Ok(ingested) => ingested,
        Err(e) => {
            // Ingestion is not atomic: some chunks may already be stored.
            let stored = pipeline
                .list_by_reference(&args.reference_id)
                .await
                .map(|records| records.len())
                .unwrap_or(0);
            if stored > 0 {
                eprintln!(
                    "Warning: ingestion failed after {} chunks were stored; \
                     inspect with `semstore records {}` or delete with \
                     `semstore delete reference {}`",
                    stored, args.reference_id, args.reference_id
                );
            }
            return Err(e).context("ingestion failed");
        }
    };

    let stats = IngestStats {
        reference_id: args.reference_id,
        chunks_created: ingested.len() as u64,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };

    print!("{}", formatter.format_ingest_stats(&stats));

    Ok(())
}
