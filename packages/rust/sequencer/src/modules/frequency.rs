use std::collections::HashMap;

use serde_json::{Value, json};

use bookgenome_shared::Result;

use super::{InputKind, Module, Unit, unsupported};

/// Characters removed from a term before counting. Case is preserved.
const STRIPPED: &[char] = &[
    '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '+', ',', ';', '<', '=', '>', '?', '@',
    '[', '\\', ']', '^', '`', '{', '|', '}',
];

/// Term occurrence counter with an optional inclusive minimum count.
#[derive(Debug, Default)]
pub struct FrequencyCounter {
    counts: HashMap<String, usize>,
    threshold: Option<usize>,
}

impl FrequencyCounter {
    pub fn new(threshold: Option<usize>) -> Self {
        Self {
            counts: HashMap::new(),
            threshold,
        }
    }

    pub fn add(&mut self, term: &str) {
        let residual: String = term.chars().filter(|c| !STRIPPED.contains(c)).collect();
        let residual = residual.trim();
        if residual.is_empty() {
            return;
        }
        *self.counts.entry(residual.to_string()).or_default() += 1;
    }

    /// Counted terms at or above the threshold, most frequent first, ties
    /// in ascending term order.
    pub fn counts(&self) -> Vec<(&str, usize)> {
        let min = self.threshold.unwrap_or(0);
        let mut entries: Vec<(&str, usize)> = self
            .counts
            .iter()
            .filter(|(_, count)| **count >= min)
            .map(|(term, count)| (term.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl Module for FrequencyCounter {
    fn input(&self) -> InputKind {
        InputKind::Terms
    }

    fn consume(&mut self, unit: &Unit<'_>) -> Result<()> {
        let Unit::Term { term, .. } = unit else {
            return Err(unsupported(InputKind::Terms, unit));
        };
        self.add(term);
        Ok(())
    }

    fn results(&self) -> Value {
        Value::Array(
            self.counts()
                .into_iter()
                .map(|(term, count)| json!([term, count]))
                .collect(),
        )
    }
}
