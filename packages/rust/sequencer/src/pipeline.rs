//! Pipeline execution: spec in, genome out.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use bookgenome_archive::DocumentStore;
use bookgenome_shared::{
    Genome, GenomeError, GenomeMetadata, PipelineSpec, ProcessorOutput, Result, round_secs,
};

use crate::document::Document;
use crate::modules::InputKind;
use crate::pagexml::PageTree;
use crate::processor::Processor;

/// Version string recorded in every genome.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reserved top-level genome key.
const METADATA_KEY: &str = "metadata";

/// A validated, read-only pipeline template. Every [`Pipeline::run`] builds
/// its own processors and modules, so concurrent runs share no state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    spec: PipelineSpec,
}

impl Pipeline {
    /// Validate `spec` by building it once.
    pub fn new(spec: PipelineSpec) -> Result<Self> {
        if spec.processors.is_empty() {
            return Err(GenomeError::validation("pipeline has no processors"));
        }
        let mut names = HashSet::new();
        for processor in &spec.processors {
            if processor.name == METADATA_KEY {
                return Err(GenomeError::validation(format!(
                    "processor name {METADATA_KEY:?} is reserved"
                )));
            }
            if !names.insert(processor.name.as_str()) {
                return Err(GenomeError::validation(format!(
                    "duplicate processor name {}",
                    processor.name
                )));
            }
            Processor::from_spec(processor)?;
        }
        Ok(Self { spec })
    }

    /// The standard sequencing pipeline.
    pub fn standard() -> Result<Self> {
        Self::new(PipelineSpec::standard())
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    fn instantiate(&self) -> Result<Vec<Processor>> {
        self.spec.processors.iter().map(Processor::from_spec).collect()
    }

    /// Run every processor over the document, in declaration order.
    ///
    /// Missing sources fail the whole run. Malformed page XML only fails the
    /// page processors: their output carries the error and no module results.
    #[instrument(skip_all, fields(identifier = %document.identifier()))]
    pub async fn run<S: DocumentStore>(&self, document: &mut Document, store: &S) -> Result<Genome> {
        let started = Instant::now();
        let mut processors = BTreeMap::new();
        let mut layout: Option<std::result::Result<PageTree, String>> = None;

        for processor in self.instantiate()? {
            let name = processor.name().to_string();
            let output = match processor.input() {
                InputKind::Terms | InputKind::Text => {
                    let text = document.full_text(store).await?;
                    processor.run_text(text)?
                }
                InputKind::Pages => {
                    if layout.is_none() {
                        layout = Some(load_layout(document, store).await?);
                    }
                    match &layout {
                        Some(Ok(tree)) => processor.run_pages(tree)?,
                        Some(Err(message)) => ProcessorOutput {
                            error: Some(message.clone()),
                            ..ProcessorOutput::default()
                        },
                        None => ProcessorOutput::default(),
                    }
                }
            };
            debug!(processor = %name, total_time = output.total_time, "processor finished");
            processors.insert(name, output);
        }

        Ok(Genome {
            processors,
            metadata: GenomeMetadata {
                identifier: document.identifier().to_string(),
                timestamp: Utc::now(),
                version: VERSION.to_string(),
                total_time: round_secs(started.elapsed()),
                sources: document.sources().clone(),
            },
        })
    }
}

/// Fetch and parse the page layout. Parse failures are returned as the inner
/// `Err` so only page processors are affected; fetch failures propagate.
async fn load_layout<S: DocumentStore>(
    document: &mut Document,
    store: &S,
) -> Result<std::result::Result<PageTree, String>> {
    let xml = document.page_xml(store).await?;
    match PageTree::parse(xml) {
        Ok(tree) if tree.is_empty() => Err(GenomeError::not_found(
            document.identifier(),
            "page layout contains no pages",
        )),
        Ok(tree) => Ok(Ok(tree)),
        Err(e) => {
            warn!(identifier = %document.identifier(), error = %e, "page layout unparseable");
            Ok(Err(e.to_string()))
        }
    }
}
