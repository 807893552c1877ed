//! bookgenome CLI: sequence scanned books into genomes and repair their metadata.
//!
//! Batch runs are resumable: re-running `sequence` over the same records only
//! performs the steps that have no marker yet.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
