//! Stateful accumulators driven by a processor.
//!
//! Every module consumes one kind of [`Unit`] and reports its accumulated
//! state as JSON. Modules never see each other's state.

mod extractor;
mod frequency;
mod pages;
mod readability;

use bookgenome_shared::{GenomeError, ModuleKind, Result};

use crate::pagexml::{Page, PageTree};

pub use extractor::{Extractor, PatternExtractor};
pub use frequency::FrequencyCounter;
pub use pages::{LastPageDetector, PageKeywordDetector, PageMatch, PageScope};
pub use readability::{ReadabilityScorer, ReadingStats};

/// One unit of processor input.
#[derive(Debug, Clone, Copy)]
pub enum Unit<'a> {
    /// An n-gram and its position in the token stream.
    Term { term: &'a str, index: usize },
    /// The whole full text.
    Text(&'a str),
    /// One page, with the tree it belongs to.
    Page { page: &'a Page, tree: &'a PageTree },
}

impl Unit<'_> {
    pub fn input(&self) -> InputKind {
        match self {
            Self::Term { .. } => InputKind::Terms,
            Self::Text(_) => InputKind::Text,
            Self::Page { .. } => InputKind::Pages,
        }
    }
}

/// The view of the document a module consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Terms,
    Text,
    Pages,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Terms => "terms",
            Self::Text => "full text",
            Self::Pages => "pages",
        })
    }
}

/// A stateful accumulator.
pub trait Module: Send {
    /// The unit kind this module accepts.
    fn input(&self) -> InputKind;

    fn consume(&mut self, unit: &Unit<'_>) -> Result<()>;

    fn results(&self) -> serde_json::Value;
}

/// The unit kind a module spec consumes, without building it.
pub fn input_of(kind: &ModuleKind) -> InputKind {
    match kind {
        ModuleKind::TermFrequency { .. }
        | ModuleKind::UrlExtractor
        | ModuleKind::IsbnExtractor { .. } => InputKind::Terms,
        ModuleKind::ReadingLevel => InputKind::Text,
        ModuleKind::CopyrightPage
        | ModuleKind::TableOfContents
        | ModuleKind::Headings { .. }
        | ModuleKind::KeywordPage { .. }
        | ModuleKind::BackpageIsbn => InputKind::Pages,
    }
}

/// Instantiate a fresh module from its spec.
pub fn build(kind: &ModuleKind) -> Result<Box<dyn Module>> {
    let module: Box<dyn Module> = match kind {
        ModuleKind::TermFrequency { threshold } => Box::new(FrequencyCounter::new(*threshold)),
        ModuleKind::UrlExtractor => Box::new(PatternExtractor::new(Extractor::Url)),
        ModuleKind::IsbnExtractor { strictness } => {
            Box::new(PatternExtractor::new(Extractor::Isbn(*strictness)))
        }
        ModuleKind::CopyrightPage => Box::new(PageKeywordDetector::copyright()),
        ModuleKind::TableOfContents => Box::new(PageKeywordDetector::table_of_contents()),
        ModuleKind::Headings {
            pattern,
            lines,
            limit,
        } => Box::new(PageKeywordDetector::headings(pattern, *lines, *limit)?),
        ModuleKind::KeywordPage {
            keywords,
            limit,
            isbns,
        } => Box::new(PageKeywordDetector::keywords(keywords, *limit, *isbns)?),
        ModuleKind::BackpageIsbn => Box::new(LastPageDetector::default()),
        ModuleKind::ReadingLevel => Box::new(ReadabilityScorer::default()),
    };
    Ok(module)
}

/// Error for a unit a module cannot consume.
pub(crate) fn unsupported(expected: InputKind, unit: &Unit<'_>) -> GenomeError {
    GenomeError::validation(format!(
        "module consumes {expected}, received {}",
        unit.input()
    ))
}
