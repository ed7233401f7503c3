use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum DeleteCommand {
    /// Delete a single record by its id
    Id {
        #[arg(required = true)]
        id: String,
    },

    /// Delete every record stored under a reference id
    Reference {
        #[arg(required = true)]
        reference_id: String,
    },
}

pub async fn handle_delete(cmd: DeleteCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let pipeline = super::build_pipeline(&config).await?;

    match cmd {
        DeleteCommand::Id { id } => {
            pipeline.delete(&id).await?;
            print!("{}", formatter.format_message(&format!("Deleted: {}", id)));
        }
        DeleteCommand::Reference { reference_id } => {
            let count = pipeline.delete_by_reference(&reference_id).await?;
            print!(
                "{}",
                formatter.format_message(&format!(
                    "Deleted {} records under reference: {}",
                    count, reference_id
                ))
            );
        }
    }

    Ok(())
}
