//! Core domain types: genomes, batch input records, identifiers.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GenomeError, Result};

/// File name of the locally persisted genome inside a document's result directory.
pub const GENOME_FILE_NAME: &str = "book_genome.json";

// ---------------------------------------------------------------------------
// Genome
// ---------------------------------------------------------------------------

/// Results of a single module plus the time spent inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Module-specific results (counts, matches, page records, scores).
    pub results: serde_json::Value,
    /// Seconds spent consuming input and producing results.
    pub time: f64,
}

/// Results of one processor run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorOutput {
    /// Module results keyed by module name.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleOutput>,
    /// Seconds spent in the whole processor, including input preparation.
    pub total_time: f64,
    /// Set when the processor could not run over its input (e.g. malformed page XML).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fetch statistics for one source view of a document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Seconds spent fetching.
    pub time: f64,
    /// Size of the fetched body in kilobytes.
    pub kb: f64,
}

/// The `metadata` entry of a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeMetadata {
    /// Document identifier.
    pub identifier: String,
    /// When the genome was produced.
    pub timestamp: DateTime<Utc>,
    /// Sequencer version that produced the genome.
    pub version: String,
    /// Seconds spent sequencing the whole document.
    #[serde(default)]
    pub total_time: f64,
    /// Fetch statistics keyed by source view (`full_text`, `page_xml`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, SourceStats>,
}

/// The structured output of running a pipeline against one document.
///
/// Serializes as `{<processor>: {modules, total_time}, ..., metadata: {...}}`.
/// Processors and modules are written sorted by name, not in pipeline order,
/// so the same results always produce the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Processor outputs keyed by processor name.
    #[serde(flatten)]
    pub processors: BTreeMap<String, ProcessorOutput>,
    pub metadata: GenomeMetadata,
}

impl Genome {
    /// Look up the results of `processor.module`, if both ran.
    pub fn module_results(&self, processor: &str, module: &str) -> Option<&serde_json::Value> {
        self.processors
            .get(processor)?
            .modules
            .get(module)
            .map(|m| &m.results)
    }

    /// Identifier of the document this genome belongs to.
    pub fn identifier(&self) -> &str {
        &self.metadata.identifier
    }

    /// Serialize to the canonical JSON form used on disk and for upload.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GenomeError::validation(format!("genome serialization failed: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GenomeError::validation(format!("invalid genome JSON: {e}")))
    }
}

/// Round a duration to seconds with millisecond precision.
pub fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Batch input
// ---------------------------------------------------------------------------

/// One line of a line-delimited batch input file. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub identifier: String,
}

/// Check that an identifier is safe to use as a marker namespace (a directory name).
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(GenomeError::validation("identifier is empty"));
    }
    if identifier.starts_with('.') {
        return Err(GenomeError::validation(format!(
            "identifier '{identifier}' must not start with '.'"
        )));
    }
    if let Some(c) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(GenomeError::validation(format!(
            "identifier '{identifier}' contains invalid character {c:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_genome() -> Genome {
        let mut modules = BTreeMap::new();
        modules.insert(
            "urls".to_string(),
            ModuleOutput {
                results: serde_json::json!([["http://example.com", 3]]),
                time: 0.001,
            },
        );
        let mut processors = BTreeMap::new();
        processors.insert(
            "1grams".to_string(),
            ProcessorOutput {
                modules,
                total_time: 0.01,
                error: None,
            },
        );
        Genome {
            processors,
            metadata: GenomeMetadata {
                identifier: "hpmor".into(),
                timestamp: Utc::now(),
                version: "0.1.0".into(),
                total_time: 0.5,
                sources: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn genome_serializes_processors_at_top_level() {
        let genome = sample_genome();
        let value: serde_json::Value =
            serde_json::from_str(&genome.to_json().expect("serialize")).expect("json");
        assert!(value["1grams"]["modules"]["urls"]["results"].is_array());
        assert_eq!(value["metadata"]["identifier"], "hpmor");
        assert!(value["1grams"].get("error").is_none());
    }

    #[test]
    fn genome_json_orders_processors_by_name() {
        let mut genome = sample_genome();
        let first = genome.processors["1grams"].clone();
        genome.processors.insert("pagetypes".into(), first.clone());
        genome.processors.insert("bigrams".into(), first);
        let json = genome.to_json().expect("serialize");
        let at = |key: &str| json.find(&format!("\"{key}\":")).expect(key);
        assert!(at("1grams") < at("bigrams"));
        assert!(at("bigrams") < at("pagetypes"));
        assert!(at("pagetypes") < at("metadata"));
    }

    #[test]
    fn genome_json_reloads() {
        let genome = sample_genome();
        let parsed = Genome::from_json(&genome.to_json().unwrap()).expect("deserialize");
        assert_eq!(parsed, genome);
        assert!(parsed.module_results("1grams", "urls").is_some());
        assert!(parsed.module_results("2grams", "urls").is_none());
    }

    #[test]
    fn round_secs_keeps_milliseconds() {
        assert_eq!(round_secs(Duration::from_micros(1_234_567)), 1.235);
        assert_eq!(round_secs(Duration::ZERO), 0.0);
    }

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("9780262517638OpenAccess").is_ok());
        assert!(validate_identifier("arcadeflyer_the-ninja-kids").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("..").is_err());
        assert!(validate_identifier("a/b").is_err());
        assert!(validate_identifier("with space").is_err());
    }

    #[test]
    fn batch_record_ignores_extra_fields() {
        let rec: BatchRecord =
            serde_json::from_str(r#"{"identifier": "hpmor", "title": "HPMOR"}"#).unwrap();
        assert_eq!(rec.identifier, "hpmor");
    }
}
