use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::utils::retry::{RetryConfig, with_retry};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub top_k: Option<usize>,

    #[arg(long, short = 'c', help = "Minimum similarity score, exclusive (-1.0 to 1.0)")]
    pub cutoff: Option<f32>,

    #[arg(long, short = 'l', help = "Language tag (accepted, not yet filtered on)")]
    pub language: Option<String>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let top_k = args.top_k.unwrap_or(config.search.default_top_k as usize);
    let cutoff = args.cutoff.unwrap_or(config.search.default_cutoff);

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Top k: {top_k}");
        eprintln!("  Cutoff: {cutoff:.3}");
        if let Some(ref language) = args.language {
            eprintln!("  Language: {language}");
        }
    }

    let pipeline = super::build_pipeline(&config).await?;

    // Search is read-only, so transient failures are safe to retry here.
    let results = with_retry(&RetryConfig::default(), || {
        pipeline.search(query, args.language.as_deref(), cutoff, top_k)
    })
    .await
    .context("search failed")?;

    if verbose {
        eprintln!("Total: {}ms", start_time.elapsed().as_millis());
        eprintln!();
    }

    print!("{}", formatter.format_search_results(&results));

    Ok(())
}
