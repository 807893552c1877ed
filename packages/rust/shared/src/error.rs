//! Error types for the book genome sequencer.
//!
//! Library crates use [`GenomeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sequencing and batch operations.
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Timeout or connection failure talking to the document store.
    /// Retried on the next batch run, never within the same attempt.
    #[error("transient fetch error for {identifier}: {message}")]
    TransientFetch { identifier: String, message: String },

    /// The document has no usable source material.
    #[error("{identifier} not found: {message}")]
    NotFound { identifier: String, message: String },

    /// Access to the document's source material was denied.
    #[error("{identifier} is forbidden: {message}")]
    Forbidden { identifier: String, message: String },

    /// Unparseable page layout or other malformed source input.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A marker already exists with a contradictory outcome.
    #[error("state conflict on {key}: {message}")]
    StateConflict { key: String, message: String },

    /// A module failed while consuming its input.
    #[error("module {module} failed: {message}")]
    Module { module: String, message: String },

    /// Any other remote store failure (unexpected status, bad response body).
    #[error("remote error: {0}")]
    Remote(String),

    /// Marker store or database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifier, invalid pipeline, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GenomeError>;

impl GenomeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-input error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: msg.into(),
        }
    }

    pub fn transient(identifier: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::TransientFetch {
            identifier: identifier.into(),
            message: msg.into(),
        }
    }

    pub fn not_found(identifier: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            message: msg.into(),
        }
    }

    pub fn forbidden(identifier: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Forbidden {
            identifier: identifier.into(),
            message: msg.into(),
        }
    }

    pub fn conflict(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StateConflict {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn module(module: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying on a later run can never help without upstream changes.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Forbidden { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = GenomeError::config("missing access key");
        assert_eq!(err.to_string(), "config error: missing access key");

        let err = GenomeError::not_found("hpmor", "no DjVu text");
        assert_eq!(err.to_string(), "hpmor not found: no DjVu text");

        let err = GenomeError::conflict("hpmor/ISBN_111", "ISBN_222 already recorded");
        assert!(err.to_string().contains("ISBN_222"));
    }

    #[test]
    fn permanence_classification() {
        assert!(GenomeError::not_found("a", "x").is_permanent());
        assert!(GenomeError::forbidden("a", "x").is_permanent());
        assert!(!GenomeError::transient("a", "timeout").is_permanent());
        assert!(GenomeError::transient("a", "timeout").is_transient());
        assert!(!GenomeError::malformed("bad xml").is_transient());
    }
}
