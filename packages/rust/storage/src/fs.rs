use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bookgenome_shared::{GenomeError, Marker, MarkerKind, Result};
use tracing::debug;

use crate::MarkerStore;

/// Markers as files: `<root>/<identifier>/<TAG>_<identifier>`, the payload
/// being the file body.
#[derive(Debug, Clone)]
pub struct FsMarkerStore {
    root: PathBuf,
}

impl FsMarkerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The result directory of one document.
    pub fn document_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }

    pub fn marker_path(&self, document_id: &str, kind: &MarkerKind) -> PathBuf {
        self.document_dir(document_id)
            .join(marker_file_name(document_id, kind))
    }
}

fn marker_file_name(document_id: &str, kind: &MarkerKind) -> String {
    format!("{}_{document_id}", kind.tag())
}

impl MarkerStore for FsMarkerStore {
    async fn list(&self, document_id: &str) -> Result<Vec<Marker>> {
        let dir = self.document_dir(document_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GenomeError::io(&dir, e)),
        };

        let suffix = format!("_{document_id}");
        let mut markers = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GenomeError::io(&dir, e))?
        {
            let file_name = entry.file_name();
            let Some(tag) = file_name.to_str().and_then(|n| n.strip_suffix(&suffix)) else {
                continue;
            };
            let Some(kind) = MarkerKind::parse_tag(tag) else {
                debug!(file = ?entry.path(), "ignoring unrecognised marker file");
                continue;
            };
            let path = entry.path();
            let payload = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| GenomeError::io(&path, e))?;
            markers.push(Marker::new(document_id, kind).with_payload(payload));
        }
        markers.sort_by_key(|m| m.kind.tag());
        Ok(markers)
    }

    async fn insert(&self, marker: &Marker) -> Result<()> {
        let dir = self.document_dir(&marker.document_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| GenomeError::io(&dir, e))?;

        let name = marker_file_name(&marker.document_id, &marker.kind);
        let path = dir.join(&name);
        let tmp = dir.join(format!(".{name}.tmp"));
        let body = marker.payload.as_deref().unwrap_or_default();
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| GenomeError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| GenomeError::io(&path, e))?;
        debug!(marker = %marker.key(), "marker written");
        Ok(())
    }

    async fn delete(&self, document_id: &str, kind: &MarkerKind) -> Result<bool> {
        let path = self.marker_path(document_id, kind);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(GenomeError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use bookgenome_shared::PutOutcome;
    use uuid::Uuid;

    use super::*;

    fn temp_store() -> FsMarkerStore {
        FsMarkerStore::new(std::env::temp_dir().join(format!("bg_markers_{}", Uuid::now_v7())))
    }

    #[tokio::test]
    async fn markers_are_files_named_by_tag() {
        let store = temp_store();
        let marker = Marker::new("my_book", MarkerKind::UrlsFound(2))
            .with_payload("http://a.org\nhttp://b.org");
        store.put(marker.clone()).await.expect("put");

        let path = store.marker_path("my_book", &MarkerKind::UrlsFound(2));
        assert!(path.ends_with("my_book/URLS_2_my_book"));
        let body = std::fs::read_to_string(&path).expect("read marker");
        assert_eq!(body, "http://a.org\nhttp://b.org");

        assert_eq!(store.list("my_book").await.expect("list"), [marker]);
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn foreign_files_are_ignored() {
        let store = temp_store();
        store
            .put(Marker::new("book", MarkerKind::GenomeUploaded))
            .await
            .expect("put");
        let dir = store.document_dir("book");
        std::fs::write(dir.join("book_genome.json"), "{}").expect("write genome");
        std::fs::write(dir.join("NOTES_book"), "x").expect("write junk");

        let markers = store.list("book").await.expect("list");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, MarkerKind::GenomeUploaded);
        assert_eq!(markers[0].payload, None);
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = temp_store();
        let kind = MarkerKind::SequenceFailure;
        assert!(!store.delete("book", &kind).await.expect("delete missing"));
        let outcome = store
            .put(Marker::new("book", kind.clone()).with_payload("timed out"))
            .await
            .expect("put");
        assert_eq!(outcome, PutOutcome::Recorded);
        assert!(store.delete("book", &kind).await.expect("delete"));
        assert!(!store.exists("book", &kind).await.expect("exists"));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let store = temp_store();
        store
            .put(Marker::new("book", MarkerKind::IsbnExtracted("9780262517638".into())))
            .await
            .expect("put");
        let reopened = FsMarkerStore::new(store.root());
        assert!(
            reopened
                .exists("book", &MarkerKind::IsbnExtracted("9780262517638".into()))
                .await
                .expect("exists")
        );
        let _ = std::fs::remove_dir_all(store.root());
    }
}
