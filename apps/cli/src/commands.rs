//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use bookgenome_archive::ArchiveClient;
use bookgenome_core::{BatchDriver, BatchProgress, BatchReport, DocumentOutcome, DocumentStatus};
use bookgenome_sequencer::{Document, Pipeline};
use bookgenome_shared::{
    AppConfig, BatchConfig, MarkerBackend, credentials_from_env, init_config, load_config,
    load_config_from, validate_identifier,
};
use bookgenome_storage::{MarkerStore, Markers};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bookgenome: sequence scanned books into genomes.
#[derive(Parser)]
#[command(
    name = "bookgenome",
    version,
    about = "Sequence scanned books into genomes and repair their catalogue metadata.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.bookgenome/bookgenome.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Marker store backend.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum MarkersArg {
    Fs,
    Libsql,
}

impl From<MarkersArg> for MarkerBackend {
    fn from(arg: MarkersArg) -> Self {
        match arg {
            MarkersArg::Fs => MarkerBackend::Fs,
            MarkersArg::Libsql => MarkerBackend::Libsql,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the batch driver over a line-delimited JSON file of records.
    Sequence {
        /// File with one `{"identifier": ...}` object per line.
        records: PathBuf,

        /// Documents processed concurrently.
        #[arg(short, long)]
        processes: Option<usize>,

        /// Results directory (one sub-directory per document).
        #[arg(long)]
        results: Option<PathBuf>,

        /// Re-attempt documents recorded as not found or forbidden.
        #[arg(long)]
        retry_missing: bool,

        /// Marker store backend.
        #[arg(long)]
        markers: Option<MarkersArg>,
    },

    /// Sequence a single document and print its genome. Records no markers.
    Genome {
        identifier: String,

        /// Write the genome to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the markers recorded for a document.
    Status {
        identifier: String,

        #[arg(long)]
        results: Option<PathBuf>,

        #[arg(long)]
        markers: Option<MarkersArg>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bookgenome=info",
        1 => "bookgenome=debug",
        _ => "bookgenome=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Sequence {
            records,
            processes,
            results,
            retry_missing,
            markers,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(processes) = processes {
                config.defaults.processes = processes;
            }
            if let Some(results) = results {
                config.defaults.results_dir = results.to_string_lossy().into_owned();
            }
            if retry_missing {
                config.defaults.retry_missing = true;
            }
            if let Some(markers) = markers {
                config.markers.backend = markers.into();
            }
            cmd_sequence(&records, &config).await
        }
        Command::Genome { identifier, out } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_genome(&identifier, out.as_deref(), &config).await
        }
        Command::Status {
            identifier,
            results,
            markers,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(results) = results {
                config.defaults.results_dir = results.to_string_lossy().into_owned();
            }
            if let Some(markers) = markers {
                config.markers.backend = markers.into();
            }
            cmd_status(&identifier, &config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sequence(records: &Path, config: &AppConfig) -> Result<()> {
    let identifiers = bookgenome_core::read_records(records).await?;
    let batch = BatchConfig::from(config);

    // Metadata repair and uploads write remotely
    let credentials = credentials_from_env(&config.archive)?;
    let client = ArchiveClient::new(config.archive.clone(), Some(credentials))?;
    let markers = Markers::open(&batch.results_dir, &config.markers).await?;
    let pipeline = Pipeline::new(config.pipeline_spec())?;

    info!(
        records = %records.display(),
        documents = identifiers.len(),
        processes = batch.processes,
        "sequencing batch"
    );

    let results_dir = batch.results_dir.clone();
    let driver = BatchDriver::new(batch, pipeline, Arc::new(client), Arc::new(markers));
    let report = driver.run(identifiers, Arc::new(CliProgress::new())).await?;

    println!();
    println!("  Run:       {}", report.run_id);
    println!("  Succeeded: {}", report.succeeded.len());
    println!("  Skipped:   {}", report.skipped.len());
    println!("  Failed:    {}", report.failed.len());
    println!(
        "  Log:       {}",
        results_dir.join(bookgenome_core::RUN_LOG_FILE).display()
    );
    println!();

    if !report.failed.is_empty() {
        return Err(eyre!(
            "{} document(s) failed; re-run to retry them",
            report.failed.len()
        ));
    }
    Ok(())
}

async fn cmd_genome(identifier: &str, out: Option<&Path>, config: &AppConfig) -> Result<()> {
    validate_identifier(identifier)?;
    let client = ArchiveClient::new(config.archive.clone(), None)?;
    let pipeline = Pipeline::new(config.pipeline_spec())?;

    let mut document = Document::new(identifier);
    let genome = pipeline.run(&mut document, &client).await?;
    let json = serde_json::to_string_pretty(&genome)?;

    match out {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
            info!(identifier, path = %path.display(), "genome written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn cmd_status(identifier: &str, config: &AppConfig) -> Result<()> {
    validate_identifier(identifier)?;
    let results_dir = PathBuf::from(&config.defaults.results_dir);
    let markers = Markers::open(&results_dir, &config.markers).await?;
    let recorded = markers.list(identifier).await?;

    if recorded.is_empty() {
        println!("{identifier}: no markers recorded");
        return Ok(());
    }
    println!("{identifier}:");
    for marker in recorded {
        let summary = marker
            .payload
            .as_deref()
            .and_then(|p| p.lines().next())
            .unwrap_or("");
        println!("  {:<24} {summary}", marker.kind.tag());
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Batch progress bar using indicatif.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl BatchProgress for CliProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn document_started(&self, identifier: &str) {
        self.bar.set_message(identifier.to_string());
    }

    fn document_finished(&self, outcome: &DocumentOutcome) {
        if let DocumentStatus::Failed { message } = &outcome.status {
            self.bar
                .println(format!("  FAILED {}: {message}", outcome.identifier));
        }
        self.bar.inc(1);
    }

    fn finished(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sequence_flags() {
        let cli = Cli::try_parse_from([
            "bookgenome",
            "sequence",
            "records.jsonl",
            "--processes",
            "4",
            "--retry-missing",
            "--markers",
            "libsql",
            "-vv",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Sequence {
                records,
                processes,
                retry_missing,
                markers,
                ..
            } => {
                assert_eq!(records, PathBuf::from("records.jsonl"));
                assert_eq!(processes, Some(4));
                assert!(retry_missing);
                assert_eq!(
                    markers.map(MarkerBackend::from),
                    Some(MarkerBackend::Libsql)
                );
            }
            _ => panic!("expected sequence"),
        }
    }
}
