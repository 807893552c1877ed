//! In-memory document store double for driver tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

use bookgenome_archive::{DocumentStore, Metadata};
use bookgenome_shared::{GenomeError, Result};

pub(crate) struct FakeStore {
    texts: HashMap<String, String>,
    layouts: HashMap<String, String>,
    forbidden: HashSet<String>,
    metadata: Mutex<HashMap<String, Metadata>>,
    update_status: AtomicU16,
    update_error: bool,
    fetches: AtomicUsize,
    metadata_reads: AtomicUsize,
    metadata_updates: AtomicUsize,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self {
            texts: HashMap::new(),
            layouts: HashMap::new(),
            forbidden: HashSet::new(),
            metadata: Mutex::new(HashMap::new()),
            update_status: AtomicU16::new(200),
            update_error: false,
            fetches: AtomicUsize::new(0),
            metadata_reads: AtomicUsize::new(0),
            metadata_updates: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_document(mut self, identifier: &str, text: &str, layout: &str) -> Self {
        self.texts.insert(identifier.into(), text.into());
        self.layouts.insert(identifier.into(), layout.into());
        self
    }

    pub(crate) fn with_forbidden(mut self, identifier: &str) -> Self {
        self.forbidden.insert(identifier.into());
        self
    }

    pub(crate) fn with_metadata(self, identifier: &str, field: &str, values: &[&str]) -> Self {
        self.metadata
            .lock()
            .expect("lock")
            .entry(identifier.into())
            .or_default()
            .insert(field.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub(crate) fn with_update_status(self, status: u16) -> Self {
        self.set_update_status(status);
        self
    }

    pub(crate) fn with_update_error(mut self) -> Self {
        self.update_error = true;
        self
    }

    pub(crate) fn set_update_status(&self, status: u16) {
        self.update_status.store(status, Ordering::SeqCst);
    }

    pub(crate) fn metadata(&self, identifier: &str) -> Metadata {
        self.metadata
            .lock()
            .expect("lock")
            .get(identifier)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn metadata_updates(&self) -> usize {
        self.metadata_updates.load(Ordering::SeqCst)
    }

    pub(crate) fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().expect("lock").clone()
    }

    /// Metadata updates plus artifact uploads.
    pub(crate) fn remote_writes(&self) -> usize {
        self.metadata_updates() + self.uploads().len()
    }

    fn source(&self, sources: &HashMap<String, String>, identifier: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.forbidden.contains(identifier) {
            return Err(GenomeError::forbidden(identifier, "HTTP 403"));
        }
        sources
            .get(identifier)
            .cloned()
            .ok_or_else(|| GenomeError::not_found(identifier, "HTTP 404"))
    }
}

impl DocumentStore for FakeStore {
    async fn fetch_full_text(&self, identifier: &str) -> Result<String> {
        self.source(&self.texts, identifier)
    }

    async fn fetch_page_layout(&self, identifier: &str) -> Result<String> {
        self.source(&self.layouts, identifier)
    }

    async fn read_metadata(&self, identifier: &str) -> Result<Metadata> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata(identifier))
    }

    async fn update_metadata(&self, identifier: &str, fields: &Metadata) -> Result<u16> {
        if self.update_error {
            return Err(GenomeError::transient(identifier, "connection reset"));
        }
        self.metadata_updates.fetch_add(1, Ordering::SeqCst);
        let status = self.update_status.load(Ordering::SeqCst);
        if (200..300).contains(&status) {
            let mut metadata = self.metadata.lock().expect("lock");
            let entry = metadata.entry(identifier.into()).or_default();
            for (field, values) in fields {
                entry.insert(field.clone(), values.clone());
            }
        }
        Ok(status)
    }

    async fn upload_artifact(&self, identifier: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.uploads
            .lock()
            .expect("lock")
            .push((identifier.into(), name.into(), bytes));
        Ok(())
    }
}
