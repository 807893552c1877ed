//! URL collection for the `URLS_<n>` marker.

use serde_json::Value;
use url::Url;

use bookgenome_shared::{Genome, ModuleKind, PipelineSpec};

use crate::genome::module_paths;

/// Collects the URLs found by a pipeline's URL extractors, dropping those
/// that point back at the document store itself.
#[derive(Debug, Clone)]
pub struct UrlCollector {
    sources: Vec<(String, String)>,
    self_domain: String,
}

impl UrlCollector {
    pub fn new(spec: &PipelineSpec, self_domain: impl Into<String>) -> Self {
        Self {
            sources: module_paths(spec, |k| matches!(k, ModuleKind::UrlExtractor)),
            self_domain: self_domain.into().to_ascii_lowercase(),
        }
    }

    /// Distinct URLs in first-seen order.
    pub fn collect(&self, genome: &Genome) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for (processor, module) in &self.sources {
            let Some(Value::Array(matches)) = genome.module_results(processor, module) else {
                continue;
            };
            // Each match is `[url, term_index]`.
            let found = matches
                .iter()
                .filter_map(|m| m.get(0).and_then(Value::as_str));
            for url in found {
                if !self.is_self_link(url) && !urls.iter().any(|seen| seen == url) {
                    urls.push(url.to_string());
                }
            }
        }
        urls
    }

    fn is_self_link(&self, raw: &str) -> bool {
        if self.self_domain.is_empty() {
            return false;
        }
        match Url::parse(raw).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
            Some(host) => {
                host == self.self_domain
                    || host
                        .strip_suffix(&self.self_domain)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            // OCR'd URLs are often unparseable
            None => raw.to_ascii_lowercase().contains(&self.self_domain),
        }
    }
}

/// Marker payload: one URL per line.
pub fn urls_payload(urls: &[String]) -> String {
    urls.iter().map(|url| format!("{url}\n")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bookgenome_shared::{GenomeMetadata, ModuleOutput, ProcessorOutput};
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn genome_with_urls(results: Value) -> Genome {
        let mut modules = BTreeMap::new();
        modules.insert("urls".to_string(), ModuleOutput { results, time: 0.0 });
        let mut processors = BTreeMap::new();
        processors.insert(
            "1grams".to_string(),
            ProcessorOutput {
                modules,
                total_time: 0.0,
                error: None,
            },
        );
        Genome {
            processors,
            metadata: GenomeMetadata {
                identifier: "book".into(),
                timestamp: Utc::now(),
                version: "test".into(),
                total_time: 0.0,
                sources: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn self_domain_and_duplicates_are_dropped() {
        let genome = genome_with_urls(json!([
            ["http://mitpress.mit.edu", 7],
            ["https://archive.org/details/book", 9],
            ["http://mitpress.mit.edu", 40],
            ["https://web.archive.org/web/2001", 52],
            ["https://notarchive.org/x", 60],
        ]));
        let collector = UrlCollector::new(&PipelineSpec::standard(), "archive.org");
        assert_eq!(
            collector.collect(&genome),
            ["http://mitpress.mit.edu", "https://notarchive.org/x"]
        );
    }

    #[test]
    fn unparseable_urls_are_kept_unless_they_mention_the_domain() {
        let genome = genome_with_urls(json!([["http://", 1], ["http:archive.org", 2]]));
        let collector = UrlCollector::new(&PipelineSpec::standard(), "archive.org");
        assert_eq!(collector.collect(&genome), ["http://"]);
    }

    #[test]
    fn payload_is_one_url_per_line() {
        let urls = vec!["http://a.org".to_string(), "http://b.org".to_string()];
        assert_eq!(urls_payload(&urls), "http://a.org\nhttp://b.org\n");
        assert_eq!(urls_payload(&[]), "");
    }
}
