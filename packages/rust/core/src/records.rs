//! Batch input: line-delimited JSON records with an `identifier` field.

use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use bookgenome_shared::{BatchRecord, GenomeError, Result};

/// Parse records, one JSON object per line. Blank lines are skipped and
/// repeated identifiers are kept once, at their first position.
pub fn parse_records(input: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut identifiers = Vec::new();
    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: BatchRecord = serde_json::from_str(line)
            .map_err(|e| GenomeError::malformed(format!("record on line {}: {e}", number + 1)))?;
        if seen.insert(record.identifier.clone()) {
            identifiers.push(record.identifier);
        } else {
            warn!(identifier = %record.identifier, line = number + 1, "duplicate record ignored");
        }
    }
    Ok(identifiers)
}

pub async fn read_records(path: &Path) -> Result<Vec<String>> {
    let input = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GenomeError::io(path, e))?;
    parse_records(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identifiers_and_ignores_extra_fields() {
        let input = r#"{"identifier": "schemer", "title": "The Little Schemer"}

{"identifier": "hpmor"}
{"identifier": "schemer"}
"#;
        assert_eq!(parse_records(input).expect("parse"), ["schemer", "hpmor"]);
    }

    #[test]
    fn bad_line_is_reported_with_its_number() {
        let err = parse_records("{\"identifier\": \"a\"}\n{\"title\": \"b\"}\n").unwrap_err();
        assert!(matches!(err, GenomeError::MalformedInput { .. }));
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
