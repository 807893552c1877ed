//! Remote document store collaborators.
//!
//! The sequencer only talks to a [`DocumentStore`]: fetch the plain text and
//! page-layout XML of a book, read and patch its metadata, and upload
//! artifacts. [`ArchiveClient`] implements it over HTTP against an
//! Internet-Archive-style item store.

mod client;

use std::collections::BTreeMap;
use std::future::Future;

use bookgenome_shared::Result;

pub use client::ArchiveClient;

/// Item metadata: every field maps to one or more string values.
pub type Metadata = BTreeMap<String, Vec<String>>;

/// Access to the remote store holding source documents.
///
/// Fetch errors must be distinguishable: `NotFound`, `Forbidden`, or
/// `TransientFetch` (timeouts, connection failures, 5xx).
pub trait DocumentStore: Send + Sync {
    /// Fetch the OCR plain text of a document.
    fn fetch_full_text(&self, identifier: &str) -> impl Future<Output = Result<String>> + Send;

    /// Fetch the raw page-layout XML of a document.
    fn fetch_page_layout(&self, identifier: &str) -> impl Future<Output = Result<String>> + Send;

    fn read_metadata(&self, identifier: &str) -> impl Future<Output = Result<Metadata>> + Send;

    /// Apply `fields` to the document's metadata. Returns the HTTP status code;
    /// non-success statuses are reported, not raised.
    fn update_metadata(
        &self,
        identifier: &str,
        fields: &Metadata,
    ) -> impl Future<Output = Result<u16>> + Send;

    fn upload_artifact(
        &self,
        identifier: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send;
}
