//! Append-once marker store.
//!
//! A marker is a durable fact that one step has been performed for one
//! document. Step completion is tested by marker existence only, so a run
//! killed mid-document is resumed correctly by the next one.
//!
//! Backends:
//! - [`FsMarkerStore`]: one file per marker under the document's result directory
//! - [`LibsqlMarkerStore`]: a local libSQL database
//! - [`MemoryMarkerStore`]: in-process, counts writes

mod fs;
mod memory;
mod migrations;
mod sql;

use std::future::Future;
use std::path::Path;

use bookgenome_shared::{
    GenomeError, Marker, MarkerBackend, MarkerCategory, MarkerKind, MarkersConfig, PutOutcome,
    Result,
};

pub use fs::FsMarkerStore;
pub use memory::MemoryMarkerStore;
pub use sql::LibsqlMarkerStore;

/// Storage for marker records, partitioned by document identifier.
///
/// Backends implement the raw operations; the append-once contract lives in
/// the provided [`put`](MarkerStore::put) and [`replace`](MarkerStore::replace).
pub trait MarkerStore: Send + Sync {
    /// All markers recorded for a document, ordered by tag.
    fn list(&self, document_id: &str) -> impl Future<Output = Result<Vec<Marker>>> + Send;

    /// Write a marker unconditionally, replacing one with the same tag.
    fn insert(&self, marker: &Marker) -> impl Future<Output = Result<()>> + Send;

    /// Remove a marker. Returns whether it existed.
    fn delete(
        &self,
        document_id: &str,
        kind: &MarkerKind,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn get(
        &self,
        document_id: &str,
        kind: &MarkerKind,
    ) -> impl Future<Output = Result<Option<Marker>>> + Send {
        async move {
            Ok(self
                .list(document_id)
                .await?
                .into_iter()
                .find(|m| &m.kind == kind))
        }
    }

    fn exists(
        &self,
        document_id: &str,
        kind: &MarkerKind,
    ) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(document_id, kind).await?.is_some()) }
    }

    /// Markers of one category for a document.
    fn in_category(
        &self,
        document_id: &str,
        category: MarkerCategory,
    ) -> impl Future<Output = Result<Vec<Marker>>> + Send {
        async move {
            Ok(self
                .list(document_id)
                .await?
                .into_iter()
                .filter(|m| m.kind.category() == category)
                .collect())
        }
    }

    /// Append-once write.
    ///
    /// An identical marker is a no-op. The same tag with a different payload,
    /// or another marker in an exclusive category, is a `StateConflict`.
    fn put(&self, marker: Marker) -> impl Future<Output = Result<PutOutcome>> + Send {
        async move {
            let existing = self.list(&marker.document_id).await?;
            if let Some(outcome) = check_put(&existing, &marker)? {
                return Ok(outcome);
            }
            self.insert(&marker).await?;
            Ok(PutOutcome::Recorded)
        }
    }

    /// Record `marker` as the latest state of its category: other markers of
    /// the same exclusive category (or of the same tag) are deleted first.
    fn replace(&self, marker: Marker) -> impl Future<Output = Result<PutOutcome>> + Send {
        async move {
            let category = marker.kind.category();
            for old in self.list(&marker.document_id).await? {
                if old.kind == marker.kind && old.payload == marker.payload {
                    return Ok(PutOutcome::AlreadyRecorded);
                }
                if old.kind == marker.kind || (category.is_exclusive() && old.kind.category() == category)
                {
                    tracing::debug!(superseded = %old.key(), by = %marker.kind, "replacing marker");
                    self.delete(&old.document_id, &old.kind).await?;
                }
            }
            self.insert(&marker).await?;
            Ok(PutOutcome::Recorded)
        }
    }
}

/// Append-once decision for `marker` against a document's existing markers.
/// `Ok(None)` means the marker should be written.
fn check_put(existing: &[Marker], marker: &Marker) -> Result<Option<PutOutcome>> {
    if let Some(same) = existing.iter().find(|m| m.kind == marker.kind) {
        if same.payload == marker.payload {
            return Ok(Some(PutOutcome::AlreadyRecorded));
        }
        return Err(GenomeError::conflict(
            marker.key(),
            "already recorded with a different payload",
        ));
    }
    let category = marker.kind.category();
    if category.is_exclusive() {
        if let Some(other) = existing.iter().find(|m| m.kind.category() == category) {
            return Err(GenomeError::conflict(
                marker.key(),
                format!("{} already recorded in category {}", other.kind, category.as_str()),
            ));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Runtime backend selection
// ---------------------------------------------------------------------------

/// The configured backend.
#[derive(Debug)]
pub enum Markers {
    Fs(FsMarkerStore),
    Libsql(LibsqlMarkerStore),
}

impl Markers {
    /// Open the backend named in `config`. File markers and the database
    /// both live under `results_dir`.
    pub async fn open(results_dir: &Path, config: &MarkersConfig) -> Result<Self> {
        match config.backend {
            MarkerBackend::Fs => Ok(Self::Fs(FsMarkerStore::new(results_dir))),
            MarkerBackend::Libsql => {
                let path = results_dir.join(&config.database);
                Ok(Self::Libsql(LibsqlMarkerStore::open(&path).await?))
            }
        }
    }
}

impl MarkerStore for Markers {
    async fn list(&self, document_id: &str) -> Result<Vec<Marker>> {
        match self {
            Self::Fs(store) => store.list(document_id).await,
            Self::Libsql(store) => store.list(document_id).await,
        }
    }

    async fn insert(&self, marker: &Marker) -> Result<()> {
        match self {
            Self::Fs(store) => store.insert(marker).await,
            Self::Libsql(store) => store.insert(marker).await,
        }
    }

    async fn delete(&self, document_id: &str, kind: &MarkerKind) -> Result<bool> {
        match self {
            Self::Fs(store) => store.delete(document_id, kind).await,
            Self::Libsql(store) => store.delete(document_id, kind).await,
        }
    }
}
