//! Local genome persistence.
//!
//! Each document's genome lives at `<results>/<identifier>/book_genome.json`
//! and is uploaded to the remote store as `<identifier>_genome.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use bookgenome_shared::{GENOME_FILE_NAME, Genome, GenomeError, ModuleKind, PipelineSpec, Result};

/// A genome as written to disk.
#[derive(Debug, Clone)]
pub struct PersistedGenome {
    pub path: PathBuf,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
    pub size_bytes: usize,
}

/// Where the genome of `identifier` is stored under `results_dir`.
pub fn genome_path(results_dir: &Path, identifier: &str) -> PathBuf {
    results_dir.join(identifier).join(GENOME_FILE_NAME)
}

/// Name of the uploaded genome artifact.
pub fn artifact_name(identifier: &str) -> String {
    format!("{identifier}_genome.json")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// `(processor, module)` names of every module in `spec` matching `wanted`,
/// in declaration order.
pub(crate) fn module_paths(
    spec: &PipelineSpec,
    wanted: impl Fn(&ModuleKind) -> bool,
) -> Vec<(String, String)> {
    spec.processors
        .iter()
        .flat_map(|p| {
            p.modules
                .iter()
                .filter(|m| wanted(&m.kind))
                .map(|m| (p.name.clone(), m.name.clone()))
        })
        .collect()
}

/// Write the genome atomically: a reader sees either no file or the complete one.
#[instrument(skip_all, fields(identifier = %genome.identifier()))]
pub async fn persist_genome(results_dir: &Path, genome: &Genome) -> Result<PersistedGenome> {
    let target = genome_path(results_dir, genome.identifier());
    let dir = results_dir.join(genome.identifier());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| GenomeError::io(&dir, e))?;

    let json = genome.to_json()?;
    let temp = dir.join(format!(".{GENOME_FILE_NAME}.tmp"));
    tokio::fs::write(&temp, json.as_bytes())
        .await
        .map_err(|e| GenomeError::io(&temp, e))?;
    tokio::fs::rename(&temp, &target)
        .await
        .map_err(|e| GenomeError::io(&target, e))?;

    debug!(path = %target.display(), size = json.len(), "genome persisted");
    Ok(PersistedGenome {
        sha256: sha256_hex(json.as_bytes()),
        size_bytes: json.len(),
        path: target,
    })
}

/// Load a previously persisted genome. `Ok(None)` when there is none.
pub async fn load_genome(results_dir: &Path, identifier: &str) -> Result<Option<Genome>> {
    let path = genome_path(results_dir, identifier);
    match tokio::fs::read_to_string(&path).await {
        Ok(json) => Genome::from_json(&json).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GenomeError::io(&path, e)),
    }
}

/// Raw bytes of the persisted genome, as uploaded.
pub async fn read_genome_bytes(results_dir: &Path, identifier: &str) -> Result<Vec<u8>> {
    let path = genome_path(results_dir, identifier);
    tokio::fs::read(&path)
        .await
        .map_err(|e| GenomeError::io(&path, e))
}
