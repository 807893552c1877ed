//! Per-document outcomes, the batch summary, and the run log.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use bookgenome_shared::{GenomeError, Result};

/// Run log file name inside the results directory.
pub const RUN_LOG_FILE: &str = "run.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Succeeded,
    Skipped { reason: String },
    Failed { message: String },
}

/// How one document's run ended.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub identifier: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.status == DocumentStatus::Succeeded
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub run_id: String,
    pub succeeded: Vec<String>,
    /// `(identifier, reason)`
    pub skipped: Vec<(String, String)>,
    /// `(identifier, message)`
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &DocumentOutcome) {
        let identifier = outcome.identifier.clone();
        match &outcome.status {
            DocumentStatus::Succeeded => self.succeeded.push(identifier),
            DocumentStatus::Skipped { reason } => self.skipped.push((identifier, reason.clone())),
            DocumentStatus::Failed { message } => self.failed.push((identifier, message.clone())),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Callback trait for batch progress (used by the CLI for progress bars).
pub trait BatchProgress: Send + Sync {
    fn started(&self, total: usize);
    fn document_started(&self, identifier: &str);
    fn document_finished(&self, outcome: &DocumentOutcome);
    fn finished(&self, report: &BatchReport);
}

/// A no-op progress reporter.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn started(&self, _total: usize) {}
    fn document_started(&self, _identifier: &str) {}
    fn document_finished(&self, _outcome: &DocumentOutcome) {}
    fn finished(&self, _report: &BatchReport) {}
}

// ---------------------------------------------------------------------------
// Run log
// ---------------------------------------------------------------------------

/// Append-only, tab-separated log of document outcomes.
///
/// `<rfc3339>\t<run_id>\tOK\t<id>`, `...\tSKIPPED\t<id>\t<reason>`,
/// `...\tFAILED\t<id>\t<message>`.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
    run_id: String,
}

impl RunLog {
    pub fn new(results_dir: &Path, run_id: impl Into<String>) -> Self {
        Self {
            path: results_dir.join(RUN_LOG_FILE),
            run_id: run_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&self, outcome: &DocumentOutcome) -> String {
        let fields = match &outcome.status {
            DocumentStatus::Succeeded => format!("OK\t{}", outcome.identifier),
            DocumentStatus::Skipped { reason } => {
                format!("SKIPPED\t{}\t{}", outcome.identifier, single_line(reason))
            }
            DocumentStatus::Failed { message } => {
                format!("FAILED\t{}\t{}", outcome.identifier, single_line(message))
            }
        };
        format!("{}\t{}\t{fields}\n", Utc::now().to_rfc3339(), self.run_id)
    }

    /// Append one line. Each call is a single write on an append-mode handle.
    pub async fn append(&self, outcome: &DocumentOutcome) -> Result<()> {
        let line = self.line(outcome);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| GenomeError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| GenomeError::io(&self.path, e))?;
        Ok(())
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r', '\t'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(identifier: &str, status: DocumentStatus) -> DocumentOutcome {
        DocumentOutcome {
            identifier: identifier.into(),
            status,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn report_buckets_outcomes() {
        let mut report = BatchReport::new("run");
        report.record(&outcome("a", DocumentStatus::Succeeded));
        report.record(&outcome(
            "b",
            DocumentStatus::Skipped {
                reason: "SOURCE_NOT_FOUND recorded".into(),
            },
        ));
        report.record(&outcome(
            "c",
            DocumentStatus::Failed {
                message: "timeout".into(),
            },
        ));
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, ["a"]);
        assert_eq!(report.failed[0].1, "timeout");
    }

    #[test]
    fn log_lines_are_tab_separated() {
        let log = RunLog::new(Path::new("/tmp"), "0190aa");
        let ok = log.line(&outcome("a", DocumentStatus::Succeeded));
        let fields: Vec<&str> = ok.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(&fields[1..], ["0190aa", "OK", "a"]);

        let failed = log.line(&outcome(
            "b",
            DocumentStatus::Failed {
                message: "line one\nline two".into(),
            },
        ));
        assert!(failed.ends_with("\tFAILED\tb\tline one line two\n"));
    }

    #[tokio::test]
    async fn append_accumulates() {
        let dir = std::env::temp_dir().join(format!("bg-runlog-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let log = RunLog::new(&dir, "run");
        log.append(&outcome("a", DocumentStatus::Succeeded)).await.expect("append");
        log.append(&outcome("b", DocumentStatus::Succeeded)).await.expect("append");
        let content = std::fs::read_to_string(log.path()).expect("read");
        assert_eq!(content.lines().count(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
