//! A processor drives a named set of modules over one view of the document.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bookgenome_shared::{
    GenomeError, ModuleOutput, ProcessorKind, ProcessorOutput, ProcessorSpec, Result, round_secs,
};

use crate::modules::{self, InputKind, Module, Unit};
use crate::pagexml::PageTree;
use crate::stopwords::StopWords;
use crate::tokenizer;

struct Slot {
    name: String,
    module: Box<dyn Module>,
    elapsed: Duration,
}

/// A freshly built processor. Modules run in declaration order.
pub struct Processor {
    name: String,
    input: InputKind,
    ngram: usize,
    stop_words: Option<StopWords>,
    slots: Vec<Slot>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("input", &self.input)
            .field(
                "modules",
                &self.slots.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Processor {
    /// Build a processor and fresh modules from its spec, rejecting modules
    /// that cannot consume the processor's input.
    pub fn from_spec(spec: &ProcessorSpec) -> Result<Self> {
        let (input, ngram, stop_words) = match &spec.kind {
            ProcessorKind::NGram { n, stop_words } => {
                if *n == 0 {
                    return Err(GenomeError::validation(format!(
                        "processor {}: n-gram size must be at least 1",
                        spec.name
                    )));
                }
                (InputKind::Terms, *n, StopWords::from_set(stop_words))
            }
            ProcessorKind::FullText => (InputKind::Text, 0, None),
            ProcessorKind::PageTypes => (InputKind::Pages, 0, None),
        };

        let mut slots: Vec<Slot> = Vec::with_capacity(spec.modules.len());
        for module in &spec.modules {
            if slots.iter().any(|s| s.name == module.name) {
                return Err(GenomeError::validation(format!(
                    "processor {}: duplicate module name {}",
                    spec.name, module.name
                )));
            }
            let expected = modules::input_of(&module.kind);
            if expected != input {
                return Err(GenomeError::validation(format!(
                    "processor {}: module {} consumes {expected}, processor yields {input}",
                    spec.name, module.name
                )));
            }
            slots.push(Slot {
                name: module.name.clone(),
                module: modules::build(&module.kind)?,
                elapsed: Duration::ZERO,
            });
        }

        Ok(Self {
            name: spec.name.clone(),
            input,
            ngram,
            stop_words,
            slots,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> InputKind {
        self.input
    }

    /// Run over the full text: tokenized for n-gram processors, whole otherwise.
    pub fn run_text(mut self, text: &str) -> Result<ProcessorOutput> {
        let started = Instant::now();
        match self.input {
            InputKind::Terms => {
                let terms = tokenizer::ngrams(text, self.ngram, self.stop_words.as_ref());
                for (index, term) in terms.iter().enumerate() {
                    self.feed(&Unit::Term { term, index })?;
                }
            }
            InputKind::Text => self.feed(&Unit::Text(text))?,
            InputKind::Pages => {
                return Err(GenomeError::validation(format!(
                    "processor {} consumes pages, not text",
                    self.name
                )));
            }
        }
        Ok(self.finish(started))
    }

    /// Run over every page of the tree in document order.
    pub fn run_pages(mut self, tree: &PageTree) -> Result<ProcessorOutput> {
        if self.input != InputKind::Pages {
            return Err(GenomeError::validation(format!(
                "processor {} consumes {}, not pages",
                self.name, self.input
            )));
        }
        let started = Instant::now();
        for page in &tree.pages {
            self.feed(&Unit::Page { page, tree })?;
        }
        Ok(self.finish(started))
    }

    fn feed(&mut self, unit: &Unit<'_>) -> Result<()> {
        for slot in &mut self.slots {
            let started = Instant::now();
            slot.module.consume(unit).map_err(|e| {
                GenomeError::module(format!("{}.{}", self.name, slot.name), e.to_string())
            })?;
            slot.elapsed += started.elapsed();
        }
        Ok(())
    }

    fn finish(self, started: Instant) -> ProcessorOutput {
        let modules: BTreeMap<String, ModuleOutput> = self
            .slots
            .into_iter()
            .map(|slot| {
                let output = ModuleOutput {
                    results: slot.module.results(),
                    time: round_secs(slot.elapsed),
                };
                (slot.name, output)
            })
            .collect();
        ProcessorOutput {
            modules,
            total_time: round_secs(started.elapsed()),
            error: None,
        }
    }
}
