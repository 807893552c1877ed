//! Metadata repair: write the canonical ISBN back to the document store.

use tracing::{debug, info, warn};

use bookgenome_archive::{DocumentStore, Metadata};
use bookgenome_shared::{Marker, MarkerKind, Result};
use bookgenome_storage::MarkerStore;

use crate::batch::record;

/// Metadata field holding ISBNs.
pub const ISBN_FIELD: &str = "isbn";

/// What a repair attempt recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// No canonical ISBN; nothing to write.
    NoIsbn,
    /// The metadata already listed the ISBN.
    AlreadyPresent(String),
    Updated(String),
    /// The metadata lists other ISBNs; left untouched.
    Conflict(Vec<String>),
    /// The store rejected the update with this status.
    Failed(u16),
}

/// Record the canonical ISBN and bring the remote metadata in line with it.
///
/// The update marker is always recorded with `replace`, so an earlier
/// `UPDATE_FAILED` never outlives a later outcome.
pub async fn repair_metadata<S, M>(
    store: &S,
    markers: &M,
    identifier: &str,
    canonical: Option<String>,
) -> Result<RepairOutcome>
where
    S: DocumentStore,
    M: MarkerStore,
{
    let Some(isbn) = canonical else {
        record(markers, Marker::new(identifier, MarkerKind::IsbnNone)).await?;
        debug!(identifier, "no canonical isbn");
        return Ok(RepairOutcome::NoIsbn);
    };
    record(
        markers,
        Marker::new(identifier, MarkerKind::IsbnExtracted(isbn.clone())),
    )
    .await?;

    let metadata = store.read_metadata(identifier).await?;
    let remote = metadata.get(ISBN_FIELD).cloned().unwrap_or_default();

    if remote.iter().any(|value| normalize(value) == isbn) {
        markers
            .replace(Marker::new(identifier, MarkerKind::UpdateSucceeded).with_payload("already present"))
            .await?;
        return Ok(RepairOutcome::AlreadyPresent(isbn));
    }
    if !remote.is_empty() {
        warn!(identifier, %isbn, remote = ?remote, "metadata lists a different isbn");
        markers
            .replace(Marker::new(identifier, MarkerKind::UpdateConflict).with_payload(remote.join("\n")))
            .await?;
        return Ok(RepairOutcome::Conflict(remote));
    }

    let mut fields = Metadata::new();
    fields.insert(ISBN_FIELD.to_string(), vec![isbn.clone()]);
    let status = match store.update_metadata(identifier, &fields).await {
        Ok(status) => status,
        Err(e) => {
            markers
                .replace(Marker::new(identifier, MarkerKind::UpdateFailed).with_payload(e.to_string()))
                .await?;
            return Err(e);
        }
    };

    if (200..300).contains(&status) {
        info!(identifier, %isbn, "metadata updated");
        markers
            .replace(Marker::new(identifier, MarkerKind::UpdateSucceeded).with_payload(format!("isbn {isbn}")))
            .await?;
        Ok(RepairOutcome::Updated(isbn))
    } else {
        warn!(identifier, status, "metadata update rejected");
        markers
            .replace(Marker::new(identifier, MarkerKind::UpdateFailed).with_payload(status.to_string()))
            .await?;
        Ok(RepairOutcome::Failed(status))
    }
}

fn normalize(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use bookgenome_shared::{GenomeError, MarkerCategory};
    use bookgenome_storage::MemoryMarkerStore;

    use super::*;
    use crate::testing::FakeStore;

    const ISBN: &str = "9780262517638";

    async fn tags(markers: &MemoryMarkerStore) -> Vec<String> {
        markers
            .list("book")
            .await
            .expect("list")
            .iter()
            .map(|m| m.kind.tag())
            .collect()
    }

    #[tokio::test]
    async fn writes_missing_isbn() {
        let store = FakeStore::new().with_metadata("book", "title", &["Schemer"]);
        let markers = MemoryMarkerStore::default();
        let outcome = repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .expect("repair");
        assert_eq!(outcome, RepairOutcome::Updated(ISBN.into()));
        assert_eq!(store.metadata_updates(), 1);
        assert_eq!(store.metadata("book")[ISBN_FIELD], [ISBN]);
        assert_eq!(tags(&markers).await, ["ISBN_9780262517638", "UPDATE_SUCCEED"]);
    }

    #[tokio::test]
    async fn existing_isbn_is_not_rewritten() {
        let store = FakeStore::new().with_metadata("book", ISBN_FIELD, &["978-0-262-51763-8"]);
        let markers = MemoryMarkerStore::default();
        let outcome = repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .expect("repair");
        assert_eq!(outcome, RepairOutcome::AlreadyPresent(ISBN.into()));
        assert_eq!(store.metadata_updates(), 0);
        let update = markers
            .get("book", &MarkerKind::UpdateSucceeded)
            .await
            .expect("get")
            .expect("marker");
        assert_eq!(update.payload.as_deref(), Some("already present"));
    }

    #[tokio::test]
    async fn different_remote_isbn_is_a_conflict() {
        let store = FakeStore::new().with_metadata("book", ISBN_FIELD, &["0306406152"]);
        let markers = MemoryMarkerStore::default();
        let outcome = repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .expect("repair");
        assert_eq!(outcome, RepairOutcome::Conflict(vec!["0306406152".into()]));
        assert_eq!(store.metadata_updates(), 0);
        assert_eq!(tags(&markers).await, ["ISBN_9780262517638", "UPDATE_CONFLICT"]);
    }

    #[tokio::test]
    async fn rejected_update_then_success_supersedes_failure() {
        let store = FakeStore::new().with_update_status(503);
        let markers = MemoryMarkerStore::default();
        let outcome = repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .expect("repair");
        assert_eq!(outcome, RepairOutcome::Failed(503));
        assert!(markers.exists("book", &MarkerKind::UpdateFailed).await.expect("exists"));

        store.set_update_status(200);
        let outcome = repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .expect("retry");
        assert_eq!(outcome, RepairOutcome::Updated(ISBN.into()));
        let update = markers
            .in_category("book", MarkerCategory::Update)
            .await
            .expect("category");
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].kind, MarkerKind::UpdateSucceeded);
    }

    #[tokio::test]
    async fn transport_error_records_failure_and_propagates() {
        let store = FakeStore::new().with_update_error();
        let markers = MemoryMarkerStore::default();
        let err = repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenomeError::TransientFetch { .. }), "{err}");
        assert!(markers.exists("book", &MarkerKind::UpdateFailed).await.expect("exists"));
    }

    #[tokio::test]
    async fn no_isbn_records_none_only() {
        let store = FakeStore::new();
        let markers = MemoryMarkerStore::default();
        let outcome = repair_metadata(&store, &markers, "book", None)
            .await
            .expect("repair");
        assert_eq!(outcome, RepairOutcome::NoIsbn);
        assert_eq!(tags(&markers).await, ["ISBN_NONE"]);
        assert_eq!(store.metadata_reads(), 0);
    }

    #[tokio::test]
    async fn changed_canonical_isbn_is_a_state_conflict() {
        let store = FakeStore::new();
        let markers = MemoryMarkerStore::default();
        repair_metadata(&store, &markers, "book", Some(ISBN.into()))
            .await
            .expect("first");
        let err = repair_metadata(&store, &markers, "book", Some("0306406152".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenomeError::StateConflict { .. }), "{err}");
        assert!(
            markers
                .exists("book", &MarkerKind::StateConflict(MarkerCategory::Isbn))
                .await
                .expect("exists")
        );
    }
}
