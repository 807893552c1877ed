//! A document under sequencing, with lazily fetched and memoized sources.

use std::collections::BTreeMap;
use std::time::Instant;

use bookgenome_archive::DocumentStore;
use bookgenome_shared::{GenomeError, Result, SourceStats, round_secs};

/// Source-statistics key for the plain text.
pub const FULL_TEXT: &str = "full_text";
/// Source-statistics key for the page-layout XML.
pub const PAGE_XML: &str = "page_xml";

/// One document. Each source is fetched at most once; the value belongs to
/// the run that created it and is never shared between documents.
#[derive(Debug, Clone)]
pub struct Document {
    identifier: String,
    full_text: Option<String>,
    page_xml: Option<String>,
    sources: BTreeMap<String, SourceStats>,
}

impl Document {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            full_text: None,
            page_xml: None,
            sources: BTreeMap::new(),
        }
    }

    /// Seed the full text, e.g. from a local file, so it is never fetched.
    pub fn with_full_text(mut self, text: impl Into<String>) -> Self {
        self.full_text = Some(text.into());
        self
    }

    /// Seed the page-layout XML so it is never fetched.
    pub fn with_page_xml(mut self, xml: impl Into<String>) -> Self {
        self.page_xml = Some(xml.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Fetch statistics for the sources fetched so far.
    pub fn sources(&self) -> &BTreeMap<String, SourceStats> {
        &self.sources
    }

    /// The plain text. Blank text is `NotFound`.
    pub async fn full_text<S: DocumentStore>(&mut self, store: &S) -> Result<&str> {
        let text = match self.full_text.take() {
            Some(text) => text,
            None => {
                let started = Instant::now();
                let text = store.fetch_full_text(&self.identifier).await?;
                self.record(FULL_TEXT, started, text.len());
                text
            }
        };
        if text.trim().is_empty() {
            return Err(GenomeError::not_found(
                &self.identifier,
                "document has no extractable full text",
            ));
        }
        Ok(self.full_text.insert(text).as_str())
    }

    /// The raw page-layout XML. An empty body is `NotFound`.
    pub async fn page_xml<S: DocumentStore>(&mut self, store: &S) -> Result<&str> {
        let xml = match self.page_xml.take() {
            Some(xml) => xml,
            None => {
                let started = Instant::now();
                let xml = store.fetch_page_layout(&self.identifier).await?;
                self.record(PAGE_XML, started, xml.len());
                xml
            }
        };
        if xml.trim().is_empty() {
            return Err(GenomeError::not_found(
                &self.identifier,
                "document has no page layout",
            ));
        }
        Ok(self.page_xml.insert(xml).as_str())
    }

    fn record(&mut self, source: &str, started: Instant, bytes: usize) {
        let kb = (bytes as f64 / 1024.0 * 100.0).round() / 100.0;
        self.sources.insert(
            source.to_string(),
            SourceStats {
                time: round_secs(started.elapsed()),
                kb,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bookgenome_archive::Metadata;

    use super::*;

    #[derive(Default)]
    struct CountingStore {
        text: String,
        fetches: AtomicUsize,
    }

    impl DocumentStore for CountingStore {
        async fn fetch_full_text(&self, _identifier: &str) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }

        async fn fetch_page_layout(&self, identifier: &str) -> Result<String> {
            Err(GenomeError::forbidden(identifier, "restricted"))
        }

        async fn read_metadata(&self, _identifier: &str) -> Result<Metadata> {
            Ok(Metadata::new())
        }

        async fn update_metadata(&self, _identifier: &str, _fields: &Metadata) -> Result<u16> {
            Ok(200)
        }

        async fn upload_artifact(&self, _: &str, _: &str, _: Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_text_is_fetched_once() {
        let store = CountingStore {
            text: "Some words".into(),
            ..CountingStore::default()
        };
        let mut doc = Document::new("book");
        assert_eq!(doc.full_text(&store).await.expect("text"), "Some words");
        assert_eq!(doc.full_text(&store).await.expect("text"), "Some words");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert!(doc.sources().contains_key(FULL_TEXT));
        assert!(!doc.sources().contains_key(PAGE_XML));
    }

    #[tokio::test]
    async fn blank_text_is_not_found() {
        let store = CountingStore {
            text: "  \n ".into(),
            ..CountingStore::default()
        };
        let err = Document::new("blank").full_text(&store).await.unwrap_err();
        assert!(matches!(err, GenomeError::NotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn fetch_errors_pass_through() {
        let store = CountingStore::default();
        let err = Document::new("locked").page_xml(&store).await.unwrap_err();
        assert!(matches!(err, GenomeError::Forbidden { .. }), "{err}");
    }

    #[tokio::test]
    async fn seeded_sources_skip_the_store() {
        let store = CountingStore::default();
        let mut doc = Document::new("local").with_full_text("seeded text");
        assert_eq!(doc.full_text(&store).await.expect("text"), "seeded text");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
        assert!(doc.sources().is_empty());
    }
}
