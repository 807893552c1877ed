//! Page classification: keyword/heading page detectors and the back-page ISBN scan.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use bookgenome_shared::{GenomeError, Result};

use super::{InputKind, Module, Unit, unsupported};
use crate::isbn;
use crate::pagexml::Page;

static COPYRIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(?:copyright|©.*)$")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static CONTENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(?:table of )?contents$")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

/// Where on a page the detector looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScope {
    /// Each word, lower-cased and trimmed of punctuation, must match the pattern.
    Words,
    /// The pattern is searched in the first `n` lines joined together.
    Heading(usize),
    /// One of the first `n` lines, trimmed of punctuation, must match the pattern.
    HeadingLine(usize),
}

/// One matched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMatch {
    pub page: String,
    /// Present only when the detector attaches ISBNs.
    pub isbns: Option<Vec<String>>,
}

impl PageMatch {
    fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("page".into(), Value::String(self.page.clone()));
        if let Some(isbns) = &self.isbns {
            map.insert(
                "isbns".into(),
                Value::Array(isbns.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}

/// Records pages matching a pattern, at most one record per page, until
/// the optional match limit is reached.
#[derive(Debug)]
pub struct PageKeywordDetector {
    pattern: Regex,
    scope: PageScope,
    attach_isbns: bool,
    limit: Option<usize>,
    matches: Vec<PageMatch>,
}

impl PageKeywordDetector {
    pub fn new(pattern: Regex, scope: PageScope, attach_isbns: bool, limit: Option<usize>) -> Self {
        Self {
            pattern,
            scope,
            attach_isbns,
            limit,
            matches: Vec::new(),
        }
    }

    /// First page carrying a copyright word or sign, with its ISBNs.
    pub fn copyright() -> Self {
        Self::new(COPYRIGHT_RE.clone(), PageScope::Words, true, Some(1))
    }

    /// First page with a `Contents` or `Table of Contents` heading line
    /// among its opening lines.
    pub fn table_of_contents() -> Self {
        Self::new(CONTENTS_RE.clone(), PageScope::HeadingLine(5), false, Some(1))
    }

    /// Pages whose first `lines` lines match `pattern` (case-insensitive).
    pub fn headings(pattern: &str, lines: usize, limit: Option<usize>) -> Result<Self> {
        Ok(Self::new(
            compile(pattern)?,
            PageScope::Heading(lines.max(1)),
            false,
            limit,
        ))
    }

    /// Pages containing any of `keywords` as a whole word.
    pub fn keywords(keywords: &[String], limit: Option<usize>, attach_isbns: bool) -> Result<Self> {
        if keywords.is_empty() {
            return Err(GenomeError::validation("keyword page detector needs keywords"));
        }
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| regex::escape(&k.trim().to_lowercase()))
            .collect();
        let pattern = format!("^(?:{})$", alternatives.join("|"));
        Ok(Self::new(compile(&pattern)?, PageScope::Words, attach_isbns, limit))
    }

    pub fn matches(&self) -> &[PageMatch] {
        &self.matches
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.matches.len() >= limit)
    }

    fn page_matches(&self, page: &Page) -> bool {
        match self.scope {
            PageScope::Words => page.words().any(|word| {
                let word = word
                    .trim_matches(|c: char| c.is_ascii_punctuation())
                    .to_lowercase();
                !word.is_empty() && self.pattern.is_match(&word)
            }),
            PageScope::Heading(lines) => self.pattern.is_match(&page.heading(lines)),
            PageScope::HeadingLine(lines) => page.lines.iter().take(lines).any(|line| {
                let text = line.text();
                let text =
                    text.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
                !text.is_empty() && self.pattern.is_match(text)
            }),
        }
    }
}

impl Module for PageKeywordDetector {
    fn input(&self) -> InputKind {
        InputKind::Pages
    }

    fn consume(&mut self, unit: &Unit<'_>) -> Result<()> {
        let Unit::Page { page, .. } = unit else {
            return Err(unsupported(InputKind::Pages, unit));
        };
        if self.exhausted() || !self.page_matches(page) {
            return Ok(());
        }
        let isbns = self.attach_isbns.then(|| page_isbns(page));
        self.matches.push(PageMatch {
            page: page.ordinal.clone(),
            isbns,
        });
        Ok(())
    }

    fn results(&self) -> Value {
        Value::Array(self.matches.iter().map(PageMatch::to_json).collect())
    }
}

/// ISBNs printed on the document's final page.
#[derive(Debug, Default)]
pub struct LastPageDetector {
    last_ordinal: Option<String>,
    isbns: Vec<String>,
}

impl LastPageDetector {
    pub fn isbns(&self) -> &[String] {
        &self.isbns
    }
}

impl Module for LastPageDetector {
    fn input(&self) -> InputKind {
        InputKind::Pages
    }

    fn consume(&mut self, unit: &Unit<'_>) -> Result<()> {
        let Unit::Page { page, tree } = unit else {
            return Err(unsupported(InputKind::Pages, unit));
        };
        if self.last_ordinal.is_none() {
            self.last_ordinal = tree.last().map(|p| p.ordinal.clone());
        }
        // Several pages sharing the final ordinal: the last one visited wins.
        if self.last_ordinal.as_deref() == Some(page.ordinal.as_str()) {
            self.isbns = page_isbns(page);
        }
        Ok(())
    }

    fn results(&self) -> Value {
        Value::Array(self.isbns.iter().cloned().map(Value::String).collect())
    }
}

/// OCR-tolerant scan over every line of the page: word by word first, then
/// with the words glued together for ISBNs split across words.
fn page_isbns(page: &Page) -> Vec<String> {
    isbn::scan_lines(page.lines.iter().flat_map(|line| [line.text(), line.compact()]))
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| GenomeError::validation(format!("invalid page pattern {pattern:?}: {e}")))
}
