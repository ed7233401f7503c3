//! CLI module for the embedding service.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Embedding ingestion and semantic retrieval service.
#[derive(Debug, Parser)]
#[command(name = "semstore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check infrastructure status (daemon, embedding server, record store)
    Status,

    /// Chunk, embed and store text under a reference id
    Ingest(commands::IngestArgs),

    /// Search stored records by semantic similarity
    Search(commands::SearchArgs),

    /// Delete records by id or by reference id
    #[command(subcommand)]
    Delete(commands::DeleteCommand),

    /// List stored records for a reference id
    Records(commands::RecordsArgs),

    /// Embed text without storing it
    Encode(commands::EncodeArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Run or control the daemon
    Serve(commands::ServeArgs),
}
