//! Declarative pipeline descriptions.
//!
//! A [`PipelineSpec`] is plain data naming which processors and modules to
//! build. The sequencer instantiates a fresh module set from it for every
//! document, so no accumulator state is ever shared between runs.

use serde::{Deserialize, Serialize};

/// Ordered list of processors. Execution follows declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub processors: Vec<ProcessorSpec>,
}

/// One processor and the modules it drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ProcessorKind,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

/// Which view of the document a processor runs over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorKind {
    /// Token (n-gram) stream of the full text.
    #[serde(rename = "ngram")]
    NGram {
        n: usize,
        #[serde(default)]
        stop_words: StopWordSet,
    },
    /// The whole full text at once.
    FullText,
    /// The page tree parsed from the page-layout XML.
    PageTypes,
}

/// Stop words removed before n-gramming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopWordSet {
    #[default]
    None,
    /// The built-in English list.
    Standard,
    Custom(Vec<String>),
}

/// One named module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModuleKind,
}

/// Module variants. Token modules belong in n-gram processors, `reading_level`
/// in full-text processors, the page detectors in page-type processors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleKind {
    TermFrequency {
        /// Minimum occurrences for a term to be reported (inclusive).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<usize>,
    },
    UrlExtractor,
    IsbnExtractor {
        #[serde(default)]
        strictness: IsbnStrictness,
    },
    CopyrightPage,
    TableOfContents,
    /// Regex over the first `lines` lines of each page.
    Headings {
        pattern: String,
        #[serde(default = "default_heading_lines")]
        lines: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    /// Exact word match anywhere on a page.
    KeywordPage {
        keywords: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        /// Attach line-scanned ISBNs to each matched page.
        #[serde(default)]
        isbns: bool,
    },
    BackpageIsbn,
    ReadingLevel,
}

/// How ISBN candidates are recognised in a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsbnStrictness {
    /// The whole token, separators removed, must be a checksum-valid ISBN-10.
    #[default]
    Strict,
    /// OCR confusions are corrected and ISBN-10/13 runs are searched for.
    OcrTolerant,
}

fn default_heading_lines() -> usize {
    5
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl PipelineSpec {
    /// The standard sequencing pipeline.
    pub fn standard() -> Self {
        Self {
            processors: vec![
                ProcessorSpec {
                    name: "1grams".into(),
                    kind: ProcessorKind::NGram {
                        n: 1,
                        stop_words: StopWordSet::None,
                    },
                    modules: vec![
                        ModuleSpec::new("term_freq", ModuleKind::TermFrequency { threshold: None }),
                        ModuleSpec::new("urls", ModuleKind::UrlExtractor),
                        ModuleSpec::new(
                            "isbns",
                            ModuleKind::IsbnExtractor {
                                strictness: IsbnStrictness::Strict,
                            },
                        ),
                    ],
                },
                ProcessorSpec {
                    name: "2grams".into(),
                    kind: ProcessorKind::NGram {
                        n: 2,
                        stop_words: StopWordSet::Standard,
                    },
                    modules: vec![ModuleSpec::new(
                        "term_freq",
                        ModuleKind::TermFrequency { threshold: Some(2) },
                    )],
                },
                ProcessorSpec {
                    name: "fulltext".into(),
                    kind: ProcessorKind::FullText,
                    modules: vec![ModuleSpec::new("readinglevel", ModuleKind::ReadingLevel)],
                },
                ProcessorSpec {
                    name: "pagetypes".into(),
                    kind: ProcessorKind::PageTypes,
                    modules: vec![
                        ModuleSpec::new("copyright_page", ModuleKind::CopyrightPage),
                        ModuleSpec::new("backpage_isbn", ModuleKind::BackpageIsbn),
                        ModuleSpec::new("toc_page", ModuleKind::TableOfContents),
                        ModuleSpec::new(
                            "chapters",
                            ModuleKind::Headings {
                                pattern: r"chap(ter)? [0-9ivxlc]+".into(),
                                lines: 2,
                                limit: None,
                            },
                        ),
                    ],
                },
            ],
        }
    }
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_order() {
        let spec = PipelineSpec::standard();
        let names: Vec<&str> = spec.processors.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["1grams", "2grams", "fulltext", "pagetypes"]);
    }

    #[test]
    fn pipeline_from_toml() {
        let toml_str = r#"
[[processors]]
name = "3grams"
kind = "ngram"
n = 3
stop_words = "standard"

[[processors.modules]]
name = "term_freq"
kind = "term_frequency"
threshold = 5

[[processors]]
name = "pages"
kind = "page_types"

[[processors.modules]]
name = "dedication"
kind = "keyword_page"
keywords = ["dedicated"]
limit = 1
"#;
        let spec: PipelineSpec = toml::from_str(toml_str).expect("parse pipeline");
        assert_eq!(spec.processors.len(), 2);
        assert_eq!(
            spec.processors[0].kind,
            ProcessorKind::NGram {
                n: 3,
                stop_words: StopWordSet::Standard
            }
        );
        assert_eq!(
            spec.processors[0].modules[0].kind,
            ModuleKind::TermFrequency { threshold: Some(5) }
        );
        assert_eq!(
            spec.processors[1].modules[0].kind,
            ModuleKind::KeywordPage {
                keywords: vec!["dedicated".into()],
                limit: Some(1),
                isbns: false,
            }
        );
    }

    #[test]
    fn standard_pipeline_survives_json() {
        let spec = PipelineSpec::standard();
        let json = serde_json::to_string(&spec).expect("serialize");
        let parsed: PipelineSpec = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, spec);
    }
}
