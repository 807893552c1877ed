use serde_json::{Value, json};

use bookgenome_shared::{IsbnStrictness, Result};

use super::{InputKind, Module, Unit, unsupported};
use crate::isbn;

/// Pure term predicates used by [`PatternExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Terms beginning with `http`, case-insensitively.
    Url,
    Isbn(IsbnStrictness),
}

impl Extractor {
    /// Values extracted from one term. Empty when the term does not match.
    pub fn extract(&self, term: &str) -> Vec<String> {
        match self {
            Self::Url => {
                let is_url = term
                    .get(..4)
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"));
                if is_url { vec![term.to_string()] } else { Vec::new() }
            }
            Self::Isbn(IsbnStrictness::Strict) => isbn::strict_isbn10(term).into_iter().collect(),
            Self::Isbn(IsbnStrictness::OcrTolerant) => isbn::scan_line(&term.to_uppercase()),
        }
    }
}

/// Append-only list of `(value, term index)` matches in encounter order.
#[derive(Debug)]
pub struct PatternExtractor {
    extractor: Extractor,
    matches: Vec<(String, usize)>,
}

impl PatternExtractor {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            extractor,
            matches: Vec::new(),
        }
    }

    pub fn matches(&self) -> &[(String, usize)] {
        &self.matches
    }
}

impl Module for PatternExtractor {
    fn input(&self) -> InputKind {
        InputKind::Terms
    }

    fn consume(&mut self, unit: &Unit<'_>) -> Result<()> {
        let Unit::Term { term, index } = unit else {
            return Err(unsupported(InputKind::Terms, unit));
        };
        for value in self.extractor.extract(term) {
            self.matches.push((value, *index));
        }
        Ok(())
    }

    fn results(&self) -> Value {
        Value::Array(
            self.matches
                .iter()
                .map(|(value, index)| json!([value, index]))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(extractor: Extractor, terms: &[&str]) -> PatternExtractor {
        let mut module = PatternExtractor::new(extractor);
        for (index, term) in terms.iter().copied().enumerate() {
            module.consume(&Unit::Term { term, index }).expect("consume");
        }
        module
    }

    #[test]
    fn urls_match_http_prefix_case_insensitively() {
        let module = run(
            Extractor::Url,
            &["see", "https://example.org/a", "HTTP://X.ORG", "www.nope.com", "ht"],
        );
        assert_eq!(
            module.results(),
            json!([["https://example.org/a", 1], ["HTTP://X.ORG", 2]])
        );
    }

    #[test]
    fn strict_isbn_requires_whole_token() {
        let module = run(
            Extractor::Isbn(IsbnStrictness::Strict),
            &["isbn", "0-306-40615-2", "0306406153", "isbn:0306406152"],
        );
        assert_eq!(module.matches(), [("0306406152".to_string(), 1)]);
    }

    #[test]
    fn ocr_tolerant_isbn_scans_tokens() {
        let module = run(
            Extractor::Isbn(IsbnStrictness::OcrTolerant),
            &["isbn:978-o-262-51763-8"],
        );
        assert_eq!(module.matches(), [("9780262517638".to_string(), 0)]);
    }

    #[test]
    fn no_match_is_a_no_op() {
        let module = run(Extractor::Url, &["plain", "words"]);
        assert_eq!(module.results(), json!([]));
    }
}
