//! Batch orchestration for the book genome sequencer.
//!
//! This crate ties the sequencer, the document store and the marker store
//! together into the resumable batch run (see [`BatchDriver`]).

pub mod batch;
pub mod genome;
pub mod isbn;
pub mod records;
pub mod repair;
pub mod report;
pub mod urls;

#[cfg(test)]
mod testing;

pub use batch::BatchDriver;
pub use genome::{PersistedGenome, artifact_name, genome_path, load_genome, persist_genome};
pub use isbn::{IsbnSources, canonical_isbn};
pub use records::{parse_records, read_records};
pub use repair::{RepairOutcome, repair_metadata};
pub use report::{
    BatchProgress, BatchReport, DocumentOutcome, DocumentStatus, RUN_LOG_FILE, RunLog,
    SilentProgress,
};
pub use urls::{UrlCollector, urls_payload};
