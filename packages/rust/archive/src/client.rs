//! HTTP implementation of [`DocumentStore`] for an Internet-Archive-style store.
//!
//! - text:     `GET  {download_url}/{id}/{id}_djvu.txt`
//! - layout:   `GET  {download_url}/{id}/{id}_djvu.xml`
//! - metadata: `GET  {metadata_url}/{id}`, `POST {metadata_url}/{id}` (JSON patch form)
//! - upload:   `PUT  {upload_url}/{id}/{name}` with `authorization: LOW access:secret`

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use bookgenome_shared::{ArchiveConfig, Credentials, GenomeError, Result};

use crate::{DocumentStore, Metadata};

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("bookgenome/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the remote item store.
pub struct ArchiveClient {
    client: Client,
    config: ArchiveConfig,
    credentials: Option<Credentials>,
}

impl ArchiveClient {
    /// Create a client. Credentials are only needed for metadata updates and uploads.
    pub fn new(config: ArchiveConfig, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenomeError::Remote(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    fn credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            GenomeError::config("archive credentials are required for remote writes")
        })
    }

    async fn get_text(&self, identifier: &str, url: Url, what: &str) -> Result<String> {
        let start = Instant::now();
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| send_error(identifier, what, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(identifier, status, what));
        }

        let body = response
            .text()
            .await
            .map_err(|e| send_error(identifier, what, e))?;

        debug!(
            identifier,
            what,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "fetched"
        );
        Ok(body)
    }
}

impl DocumentStore for ArchiveClient {
    #[instrument(skip(self))]
    async fn fetch_full_text(&self, identifier: &str) -> Result<String> {
        let url = join_url(
            &self.config.download_url,
            &[identifier, &format!("{identifier}_djvu.txt")],
        )?;
        self.get_text(identifier, url, "full text").await
    }

    #[instrument(skip(self))]
    async fn fetch_page_layout(&self, identifier: &str) -> Result<String> {
        let url = join_url(
            &self.config.download_url,
            &[identifier, &format!("{identifier}_djvu.xml")],
        )?;
        self.get_text(identifier, url, "page layout").await
    }

    #[instrument(skip(self))]
    async fn read_metadata(&self, identifier: &str) -> Result<Metadata> {
        let url = join_url(&self.config.metadata_url, &[identifier])?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| send_error(identifier, "metadata", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(identifier, status, "metadata"));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenomeError::Remote(format!("{identifier}: invalid metadata: {e}")))?;

        parse_metadata(identifier, &body)
    }

    #[instrument(skip(self, fields))]
    async fn update_metadata(&self, identifier: &str, fields: &Metadata) -> Result<u16> {
        let credentials = self.credentials()?;
        let url = join_url(&self.config.metadata_url, &[identifier])?;
        let patch = metadata_patch(fields).to_string();

        let form = [
            ("-target", "metadata"),
            ("-patch", patch.as_str()),
            ("access", credentials.access.as_str()),
            ("secret", credentials.secret.as_str()),
        ];

        let response = self
            .client
            .post(url.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| send_error(identifier, "metadata update", e))?;

        let status = response.status().as_u16();
        debug!(identifier, status, "metadata update sent");
        Ok(status)
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn upload_artifact(&self, identifier: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        let credentials = self.credentials()?;
        let url = join_url(&self.config.upload_url, &[identifier, name])?;

        let response = self
            .client
            .put(url.as_str())
            .header(
                "authorization",
                format!("LOW {}:{}", credentials.access, credentials.secret),
            )
            .body(bytes)
            .send()
            .await
            .map_err(|e| send_error(identifier, "upload", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(identifier, status, "upload"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Append percent-encoded path segments to a base URL.
fn join_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| GenomeError::config(format!("invalid store URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| GenomeError::config(format!("store URL '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map a non-success status onto the fetch error taxonomy.
fn classify_status(identifier: &str, status: StatusCode, what: &str) -> GenomeError {
    let message = format!("{what}: HTTP {status}");
    match status.as_u16() {
        404 | 410 => GenomeError::not_found(identifier, message),
        401 | 403 => GenomeError::forbidden(identifier, message),
        408 | 429 | 500..=599 => GenomeError::transient(identifier, message),
        _ => GenomeError::Remote(format!("{identifier}: {message}")),
    }
}

fn send_error(identifier: &str, what: &str, e: reqwest::Error) -> GenomeError {
    if e.is_timeout() || e.is_connect() {
        GenomeError::transient(identifier, format!("{what}: {e}"))
    } else {
        GenomeError::Remote(format!("{identifier}: {what}: {e}"))
    }
}

/// Parse a metadata API response. The API answers `{}` for unknown items.
fn parse_metadata(identifier: &str, body: &serde_json::Value) -> Result<Metadata> {
    let Some(fields) = body.get("metadata").and_then(|m| m.as_object()) else {
        return Err(GenomeError::not_found(identifier, "item has no metadata"));
    };

    let metadata = fields
        .iter()
        .map(|(key, value)| {
            let values = match value {
                serde_json::Value::Array(items) => items.iter().map(value_to_string).collect(),
                other => vec![value_to_string(other)],
            };
            (key.clone(), values)
        })
        .collect();

    Ok(metadata)
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a JSON patch adding each field (single values as strings, lists as arrays).
fn metadata_patch(fields: &Metadata) -> serde_json::Value {
    let ops: Vec<serde_json::Value> = fields
        .iter()
        .map(|(key, values)| {
            let value = match values.as_slice() {
                [single] => serde_json::Value::String(single.clone()),
                many => serde_json::json!(many),
            };
            serde_json::json!({ "op": "add", "path": format!("/{key}"), "value": value })
        })
        .collect();
    serde_json::Value::Array(ops)
}
