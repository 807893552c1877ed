//! Idempotent, resumable batch driver.
//!
//! Every step of a document's run is guarded by a marker: a step whose marker
//! exists is skipped, so re-running a batch only does the work that is missing.
//!
//! Per document:
//! 1. skip if a `SOURCE_*` marker exists (unless retrying missing sources)
//! 2. load the persisted genome, or sequence and persist it
//! 3. upload the genome (`GENOME_UPLOADED`)
//! 4. canonical ISBN and metadata repair (`ISBN_*`, `UPDATE_*`)
//! 5. URL collection (`URLS_<n>`)

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use bookgenome_archive::DocumentStore;
use bookgenome_sequencer::{Document, Pipeline};
use bookgenome_shared::{
    BatchConfig, Genome, GenomeError, Marker, MarkerCategory, MarkerKind, PutOutcome, Result,
    validate_identifier,
};
use bookgenome_storage::MarkerStore;

use crate::genome::{artifact_name, load_genome, persist_genome, read_genome_bytes, sha256_hex};
use crate::isbn::IsbnSources;
use crate::repair::{RepairOutcome, repair_metadata};
use crate::report::{BatchProgress, BatchReport, DocumentOutcome, DocumentStatus, RunLog};
use crate::urls::{UrlCollector, urls_payload};

/// Append-once write that turns a contradiction into a `CONFLICT_<CATEGORY>`
/// marker before returning the conflict.
pub(crate) async fn record<M: MarkerStore>(markers: &M, marker: Marker) -> Result<PutOutcome> {
    let document_id = marker.document_id.clone();
    let category = marker.kind.category();
    match markers.put(marker).await {
        Err(e @ GenomeError::StateConflict { .. }) => {
            warn!(identifier = %document_id, error = %e, "conflicting marker");
            let conflict = Marker::new(&document_id, MarkerKind::StateConflict(category))
                .with_payload(e.to_string());
            markers.replace(conflict).await?;
            Err(e)
        }
        other => other,
    }
}

/// Drives a list of documents through the pipeline on a fixed-size worker pool.
pub struct BatchDriver<S, M> {
    worker: Arc<Worker<S, M>>,
}

struct Worker<S, M> {
    config: BatchConfig,
    pipeline: Pipeline,
    isbns: IsbnSources,
    urls: UrlCollector,
    store: Arc<S>,
    markers: Arc<M>,
}

enum Advance {
    Done,
    Skipped(String),
}

impl<S, M> BatchDriver<S, M>
where
    S: DocumentStore + 'static,
    M: MarkerStore + 'static,
{
    pub fn new(config: BatchConfig, pipeline: Pipeline, store: Arc<S>, markers: Arc<M>) -> Self {
        let isbns = IsbnSources::from_spec(pipeline.spec());
        let urls = UrlCollector::new(pipeline.spec(), config.self_domain.as_str());
        Self {
            worker: Arc::new(Worker {
                config,
                pipeline,
                isbns,
                urls,
                store,
                markers,
            }),
        }
    }

    /// Process every identifier. Per-document failures are recorded and
    /// reported, never returned; only setup errors abort the batch.
    #[instrument(skip_all, fields(documents = identifiers.len()))]
    pub async fn run(
        &self,
        identifiers: Vec<String>,
        progress: Arc<dyn BatchProgress>,
    ) -> Result<BatchReport> {
        let config = &self.worker.config;
        tokio::fs::create_dir_all(&config.results_dir)
            .await
            .map_err(|e| GenomeError::io(&config.results_dir, e))?;

        let run_id = Uuid::now_v7().to_string();
        let log = RunLog::new(&config.results_dir, run_id.clone());
        let semaphore = Arc::new(Semaphore::new(config.processes.max(1)));

        info!(
            %run_id,
            processes = config.processes,
            results_dir = %config.results_dir.display(),
            "starting batch"
        );
        progress.started(identifiers.len());

        let mut handles = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| GenomeError::validation(format!("worker pool closed: {e}")))?;
            let worker = Arc::clone(&self.worker);
            let progress = Arc::clone(&progress);
            let log = log.clone();
            let task_identifier = identifier.clone();

            handles.push((
                identifier,
                tokio::spawn(async move {
                    let _permit = permit;
                    progress.document_started(&task_identifier);
                    let outcome = worker.process(&task_identifier).await;
                    if let Err(e) = log.append(&outcome).await {
                        warn!(identifier = %task_identifier, error = %e, "failed to append run log");
                    }
                    progress.document_finished(&outcome);
                    outcome
                }),
            ));
        }

        let mut report = BatchReport::new(run_id);
        for (identifier, handle) in handles {
            match handle.await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(%identifier, error = %e, "document task aborted");
                    report.failed.push((identifier, format!("task aborted: {e}")));
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        progress.finished(&report);
        Ok(report)
    }
}

impl<S, M> Worker<S, M>
where
    S: DocumentStore,
    M: MarkerStore,
{
    async fn process(&self, identifier: &str) -> DocumentOutcome {
        let started = Instant::now();
        let status = match self.advance(identifier).await {
            Ok(Advance::Done) => {
                match self.markers.delete(identifier, &MarkerKind::SequenceFailure).await {
                    Ok(_) => {
                        info!(
                            identifier,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "document complete"
                        );
                        DocumentStatus::Succeeded
                    }
                    Err(e) => DocumentStatus::Failed {
                        message: e.to_string(),
                    },
                }
            }
            Ok(Advance::Skipped(reason)) => {
                debug!(identifier, %reason, "document skipped");
                DocumentStatus::Skipped { reason }
            }
            Err(e) => {
                warn!(identifier, error = %e, "document failed");
                self.record_failure(identifier, &e).await;
                DocumentStatus::Failed {
                    message: e.to_string(),
                }
            }
        };
        DocumentOutcome {
            identifier: identifier.to_string(),
            status,
            elapsed: started.elapsed(),
        }
    }

    #[instrument(skip_all, fields(identifier = %identifier))]
    async fn advance(&self, identifier: &str) -> Result<Advance> {
        validate_identifier(identifier)?;

        let missing = self
            .markers
            .in_category(identifier, MarkerCategory::Source)
            .await?;
        if let Some(marker) = missing.first() {
            if !self.config.retry_missing {
                return Ok(Advance::Skipped(format!("{} recorded", marker.kind)));
            }
            for marker in &missing {
                self.markers.delete(identifier, &marker.kind).await?;
            }
            info!(identifier, "retrying document with missing sources");
        }

        let genome = self.sequenced(identifier).await?;
        // Source errors past this point are about the store, not the document.
        self.publish(identifier, &genome)
            .await
            .map_err(|e| match e {
                e @ (GenomeError::NotFound { .. } | GenomeError::Forbidden { .. }) => {
                    GenomeError::Remote(e.to_string())
                }
                other => other,
            })?;
        Ok(Advance::Done)
    }

    /// The persisted genome, sequencing the document first if there is none.
    async fn sequenced(&self, identifier: &str) -> Result<Genome> {
        let results_dir = &self.config.results_dir;
        if let Some(genome) = load_genome(results_dir, identifier).await? {
            debug!(identifier, "genome already persisted");
            return Ok(genome);
        }

        let mut document = Document::new(identifier);
        let genome = self.pipeline.run(&mut document, self.store.as_ref()).await?;

        let errors: Vec<String> = genome
            .processors
            .iter()
            .filter_map(|(name, output)| output.error.as_ref().map(|e| format!("{name}: {e}")))
            .collect();
        if !errors.is_empty() {
            record(
                self.markers.as_ref(),
                Marker::new(identifier, MarkerKind::LayoutMalformed).with_payload(errors.join("\n")),
            )
            .await?;
        }

        let persisted = persist_genome(results_dir, &genome).await?;
        info!(
            identifier,
            size_bytes = persisted.size_bytes,
            total_time = genome.metadata.total_time,
            "genome sequenced"
        );
        Ok(genome)
    }

    async fn publish(&self, identifier: &str, genome: &Genome) -> Result<()> {
        self.upload(identifier).await?;
        let repair = self.repair(identifier, genome).await?;
        self.collect_urls(identifier, genome).await?;

        if let Some(RepairOutcome::Failed(status)) = repair {
            return Err(GenomeError::Remote(format!(
                "metadata update rejected with status {status}"
            )));
        }
        Ok(())
    }

    async fn upload(&self, identifier: &str) -> Result<()> {
        if self
            .markers
            .exists(identifier, &MarkerKind::GenomeUploaded)
            .await?
        {
            return Ok(());
        }
        let bytes = read_genome_bytes(&self.config.results_dir, identifier).await?;
        let digest = sha256_hex(&bytes);
        self.store
            .upload_artifact(identifier, &artifact_name(identifier), bytes)
            .await?;
        record(
            self.markers.as_ref(),
            Marker::new(identifier, MarkerKind::GenomeUploaded).with_payload(digest),
        )
        .await?;
        Ok(())
    }

    /// Runs when no ISBN has been recorded, when the last update failed, or
    /// when an ISBN was recorded but the update never finished.
    async fn repair(&self, identifier: &str, genome: &Genome) -> Result<Option<RepairOutcome>> {
        let markers = self.markers.list(identifier).await?;
        let isbn = markers
            .iter()
            .find(|m| m.kind.category() == MarkerCategory::Isbn);
        let update = markers
            .iter()
            .find(|m| m.kind.category() == MarkerCategory::Update);
        let pending = match (isbn, update) {
            (None, _) => true,
            (Some(_), Some(update)) => update.kind == MarkerKind::UpdateFailed,
            (Some(isbn), None) => isbn.kind != MarkerKind::IsbnNone,
        };
        if !pending {
            return Ok(None);
        }

        let canonical = self.isbns.canonical(genome);
        let outcome = repair_metadata(
            self.store.as_ref(),
            self.markers.as_ref(),
            identifier,
            canonical,
        )
        .await?;
        Ok(Some(outcome))
    }

    async fn collect_urls(&self, identifier: &str, genome: &Genome) -> Result<()> {
        let recorded = self
            .markers
            .in_category(identifier, MarkerCategory::Urls)
            .await?;
        if !recorded.is_empty() {
            return Ok(());
        }
        let urls = self.urls.collect(genome);
        record(
            self.markers.as_ref(),
            Marker::new(identifier, MarkerKind::UrlsFound(urls.len()))
                .with_payload(urls_payload(&urls)),
        )
        .await?;
        Ok(())
    }

    /// Best effort; a failure here is logged and the run goes on.
    async fn record_failure(&self, identifier: &str, error: &GenomeError) {
        if validate_identifier(identifier).is_err() {
            return;
        }
        let kind = match error {
            GenomeError::NotFound { .. } => MarkerKind::SourceNotFound,
            GenomeError::Forbidden { .. } => MarkerKind::SourceForbidden,
            // already recorded as CONFLICT_<CATEGORY>
            GenomeError::StateConflict { .. } => return,
            _ => MarkerKind::SequenceFailure,
        };
        let marker = Marker::new(identifier, kind).with_payload(error.to_string());
        if let Err(e) = self.markers.replace(marker).await {
            warn!(identifier, error = %e, "could not record failure");
        }
    }
}
