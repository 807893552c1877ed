//! Application configuration for the book genome sequencer.
//!
//! User config lives at `~/.bookgenome/bookgenome.toml`.
//! CLI flags override config file values, which override defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GenomeError, Result};
use crate::pipeline::PipelineSpec;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bookgenome.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bookgenome";

// ---------------------------------------------------------------------------
// Config structs (matching bookgenome.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Remote document store settings.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Marker store settings.
    #[serde(default)]
    pub markers: MarkersConfig,

    /// Custom pipeline; the standard pipeline is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineSpec>,
}

impl AppConfig {
    /// The configured pipeline, or the standard one.
    pub fn pipeline_spec(&self) -> PipelineSpec {
        self.pipeline.clone().unwrap_or_default()
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding one result directory per document.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Number of documents processed concurrently.
    #[serde(default = "default_processes")]
    pub processes: usize,

    /// Re-attempt documents previously recorded as not found / forbidden.
    #[serde(default)]
    pub retry_missing: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            processes: default_processes(),
            retry_missing: false,
        }
    }
}

fn default_results_dir() -> String {
    "results/bgp_results".into()
}
fn default_processes() -> usize {
    1
}

/// `[archive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL for downloading item files.
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// Base URL of the metadata read/write API.
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// Base URL of the S3-like upload endpoint.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// Name of the env var holding the access key (never store the key itself).
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    /// Name of the env var holding the secret key.
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// URLs pointing at this domain are excluded from URL extraction.
    #[serde(default = "default_self_domain")]
    pub self_domain: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            download_url: default_download_url(),
            metadata_url: default_metadata_url(),
            upload_url: default_upload_url(),
            access_key_env: default_access_key_env(),
            secret_key_env: default_secret_key_env(),
            timeout_secs: default_timeout_secs(),
            self_domain: default_self_domain(),
        }
    }
}

fn default_download_url() -> String {
    "https://archive.org/download".into()
}
fn default_metadata_url() -> String {
    "https://archive.org/metadata".into()
}
fn default_upload_url() -> String {
    "https://s3.us.archive.org".into()
}
fn default_access_key_env() -> String {
    "IA_ACCESS_KEY".into()
}
fn default_secret_key_env() -> String {
    "IA_SECRET_KEY".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_self_domain() -> String {
    "archive.org".into()
}

/// Which marker store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerBackend {
    /// One file per marker under the results directory.
    #[default]
    Fs,
    /// A local libSQL database.
    Libsql,
}

/// `[markers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkersConfig {
    #[serde(default)]
    pub backend: MarkerBackend,

    /// Database path for the libsql backend, relative to the results directory.
    #[serde(default = "default_marker_database")]
    pub database: String,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            backend: MarkerBackend::default(),
            database: default_marker_database(),
        }
    }
}

fn default_marker_database() -> String {
    "markers.db".into()
}

// ---------------------------------------------------------------------------
// Batch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime batch configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Root of the per-document result directories.
    pub results_dir: PathBuf,
    /// Worker pool size.
    pub processes: usize,
    /// Delete `SOURCE_*` markers and try those documents again.
    pub retry_missing: bool,
    /// Domain excluded from URL extraction.
    pub self_domain: String,
}

impl From<&AppConfig> for BatchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            results_dir: PathBuf::from(&config.defaults.results_dir),
            processes: config.defaults.processes.max(1),
            retry_missing: config.defaults.retry_missing,
            self_domain: config.archive.self_domain.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Process-wide, read-only remote store credentials.
#[derive(Clone)]
pub struct Credentials {
    pub access: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access", &self.access)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Read the access/secret key pair from the env vars named in the config.
pub fn credentials_from_env(config: &ArchiveConfig) -> Result<Credentials> {
    let read = |var_name: &str| match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(GenomeError::config(format!(
            "archive credentials not found. Set the {var_name} environment variable."
        ))),
    };
    Ok(Credentials {
        access: read(&config.access_key_env)?,
        secret: read(&config.secret_key_env)?,
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bookgenome/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| GenomeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bookgenome/bookgenome.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GenomeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GenomeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GenomeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GenomeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GenomeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ProcessorKind;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("results_dir"));
        assert!(toml_str.contains("IA_ACCESS_KEY"));
        assert!(!toml_str.contains("[pipeline]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.processes, 1);
        assert_eq!(parsed.archive.self_domain, "archive.org");
        assert_eq!(parsed.markers.backend, MarkerBackend::Fs);
    }

    #[test]
    fn config_with_custom_pipeline() {
        let toml_str = r#"
[defaults]
results_dir = "/tmp/genomes"
processes = 8

[markers]
backend = "libsql"

[[pipeline.processors]]
name = "fulltext"
kind = "full_text"

[[pipeline.processors.modules]]
name = "readinglevel"
kind = "reading_level"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.processes, 8);
        assert_eq!(config.markers.backend, MarkerBackend::Libsql);
        let spec = config.pipeline_spec();
        assert_eq!(spec.processors.len(), 1);
        assert_eq!(spec.processors[0].kind, ProcessorKind::FullText);
    }

    #[test]
    fn batch_config_from_app_config() {
        let mut app = AppConfig::default();
        app.defaults.processes = 0;
        let batch = BatchConfig::from(&app);
        assert_eq!(batch.processes, 1);
        assert_eq!(batch.results_dir, PathBuf::from("results/bgp_results"));
        assert!(!batch.retry_missing);
    }

    #[test]
    fn missing_credentials() {
        let config = ArchiveConfig {
            // Use unique env var names to avoid interfering with other tests
            access_key_env: "BG_TEST_NONEXISTENT_ACCESS_12345".into(),
            secret_key_env: "BG_TEST_NONEXISTENT_SECRET_12345".into(),
            ..ArchiveConfig::default()
        };
        let result = credentials_from_env(&config);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("BG_TEST_NONEXISTENT_ACCESS_12345")
        );
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials {
            access: "abc".into(),
            secret: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("abc"));
        assert!(!shown.contains("hunter2"));
    }
}
