//! Canonical ISBN derivation from a genome.

use serde_json::Value;

use bookgenome_shared::{Genome, ModuleKind, PipelineSpec};

use crate::genome::module_paths;

/// Pick the ISBN to write back to the document's metadata.
///
/// An ISBN on both lists wins (earliest on the copyright page). Otherwise
/// the first copyright-page ISBN, otherwise the last back-matter ISBN.
pub fn canonical_isbn(copyright: &[String], backpage: &[String]) -> Option<String> {
    copyright
        .iter()
        .find(|isbn| backpage.contains(isbn))
        .or_else(|| copyright.first())
        .or_else(|| backpage.last())
        .cloned()
}

/// Where the copyright-page and back-matter ISBNs of a pipeline end up.
#[derive(Debug, Clone)]
pub struct IsbnSources {
    copyright: Vec<(String, String)>,
    backpage: Vec<(String, String)>,
}

impl IsbnSources {
    pub fn from_spec(spec: &PipelineSpec) -> Self {
        Self {
            copyright: module_paths(spec, |k| matches!(k, ModuleKind::CopyrightPage)),
            backpage: module_paths(spec, |k| matches!(k, ModuleKind::BackpageIsbn)),
        }
    }

    /// ISBNs attached to copyright-page matches, in page order, deduplicated.
    pub fn copyright_isbns(&self, genome: &Genome) -> Vec<String> {
        let mut isbns = Vec::new();
        for (processor, module) in &self.copyright {
            let Some(Value::Array(matches)) = genome.module_results(processor, module) else {
                continue;
            };
            let found = matches
                .iter()
                .filter_map(|m| m.get("isbns").and_then(Value::as_array))
                .flatten()
                .filter_map(Value::as_str);
            for isbn in found {
                if !isbns.iter().any(|seen| seen == isbn) {
                    isbns.push(isbn.to_string());
                }
            }
        }
        isbns
    }

    pub fn backpage_isbns(&self, genome: &Genome) -> Vec<String> {
        let mut isbns = Vec::new();
        for (processor, module) in &self.backpage {
            if let Some(Value::Array(found)) = genome.module_results(processor, module) {
                isbns.extend(found.iter().filter_map(Value::as_str).map(String::from));
            }
        }
        isbns
    }

    pub fn canonical(&self, genome: &Genome) -> Option<String> {
        canonical_isbn(&self.copyright_isbns(genome), &self.backpage_isbns(genome))
    }
}
