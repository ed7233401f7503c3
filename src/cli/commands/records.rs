use anyhow::Result;
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct RecordsArgs {
    #[arg(required = true, help = "Reference id to list records for")]
    pub reference_id: String,
}

/// List what is actually stored under a reference id. Ingestion is not
/// atomic, so this is how callers detect and repair partial documents.
pub async fn handle_records(args: RecordsArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let pipeline = super::build_pipeline(&config).await?;

    let records = pipeline.list_by_reference(&args.reference_id).await?;
    print!("{}", formatter.format_records(&records));

    Ok(())
}
