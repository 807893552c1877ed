//! Shared types, error model, and configuration for the book genome sequencer.
//!
//! This crate is the foundation depended on by all other bookgenome crates.
//! It provides:
//! - [`GenomeError`]: the unified error type
//! - Domain types ([`Genome`], [`Marker`], [`MarkerKind`], [`BatchRecord`])
//! - Declarative pipeline descriptions ([`PipelineSpec`])
//! - Configuration ([`AppConfig`], [`BatchConfig`], config loading)

pub mod config;
pub mod error;
pub mod marker;
pub mod pipeline;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArchiveConfig, BatchConfig, Credentials, DefaultsConfig, MarkerBackend,
    MarkersConfig, config_dir, config_file_path, credentials_from_env, init_config, load_config,
    load_config_from,
};
pub use error::{GenomeError, Result};
pub use marker::{Marker, MarkerCategory, MarkerKind, PutOutcome};
pub use pipeline::{
    IsbnStrictness, ModuleKind, ModuleSpec, PipelineSpec, ProcessorKind, ProcessorSpec, StopWordSet,
};
pub use types::{
    BatchRecord, GENOME_FILE_NAME, Genome, GenomeMetadata, ModuleOutput, ProcessorOutput,
    SourceStats, round_secs, validate_identifier,
};
