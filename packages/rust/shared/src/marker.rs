//! Marker records: durable facts that a step has been performed for a document.
//!
//! Each marker is identified by `(document_id, tag)`. Tags are the file-name
//! prefixes used by the filesystem backend (`ISBN_9780262517638`, `URLS_4`, ...).
//! Kinds are grouped into categories; within an exclusive category a document
//! holds at most one marker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Grouping of marker kinds used for conflict checks and step-completion tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerCategory {
    Upload,
    Isbn,
    Update,
    Urls,
    Sequence,
    Source,
    Layout,
    Conflict,
}

impl MarkerCategory {
    /// Whether at most one marker of this category may exist per document.
    pub fn is_exclusive(self) -> bool {
        matches!(
            self,
            Self::Upload | Self::Isbn | Self::Update | Self::Urls | Self::Source
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::Isbn => "ISBN",
            Self::Update => "UPDATE",
            Self::Urls => "URLS",
            Self::Sequence => "SEQUENCE",
            Self::Source => "SOURCE",
            Self::Layout => "LAYOUT",
            Self::Conflict => "CONFLICT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "UPLOAD" => Self::Upload,
            "ISBN" => Self::Isbn,
            "UPDATE" => Self::Update,
            "URLS" => Self::Urls,
            "SEQUENCE" => Self::Sequence,
            "SOURCE" => Self::Source,
            "LAYOUT" => Self::Layout,
            "CONFLICT" => Self::Conflict,
            _ => return None,
        })
    }
}

/// What a marker records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    /// The persisted genome has been uploaded to the remote store.
    GenomeUploaded,
    /// A canonical ISBN was derived from the genome.
    IsbnExtracted(String),
    /// No canonical ISBN could be derived.
    IsbnNone,
    UpdateSucceeded,
    UpdateFailed,
    UpdateConflict,
    /// URLs were collected; carries the count, payload lists them one per line.
    UrlsFound(usize),
    /// The last attempt failed with a retryable error; payload is the message.
    SequenceFailure,
    SourceNotFound,
    SourceForbidden,
    /// Page layout could not be parsed; page classification was skipped.
    LayoutMalformed,
    /// A contradictory outcome was detected while recording in the given category.
    StateConflict(MarkerCategory),
}

impl MarkerKind {
    /// The tag under which this marker is stored.
    pub fn tag(&self) -> String {
        match self {
            Self::GenomeUploaded => "GENOME_UPLOADED".into(),
            Self::IsbnExtracted(isbn) => format!("ISBN_{isbn}"),
            Self::IsbnNone => "ISBN_NONE".into(),
            Self::UpdateSucceeded => "UPDATE_SUCCEED".into(),
            Self::UpdateFailed => "UPDATE_FAILED".into(),
            Self::UpdateConflict => "UPDATE_CONFLICT".into(),
            Self::UrlsFound(count) => format!("URLS_{count}"),
            Self::SequenceFailure => "SEQUENCE_FAILURE".into(),
            Self::SourceNotFound => "SOURCE_NOT_FOUND".into(),
            Self::SourceForbidden => "SOURCE_FORBIDDEN".into(),
            Self::LayoutMalformed => "LAYOUT_MALFORMED".into(),
            Self::StateConflict(category) => format!("CONFLICT_{}", category.as_str()),
        }
    }

    /// Parse a stored tag back into a kind. Unknown tags yield `None`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "GENOME_UPLOADED" => Self::GenomeUploaded,
            "ISBN_NONE" => Self::IsbnNone,
            "UPDATE_SUCCEED" => Self::UpdateSucceeded,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "UPDATE_CONFLICT" => Self::UpdateConflict,
            "SEQUENCE_FAILURE" => Self::SequenceFailure,
            "SOURCE_NOT_FOUND" => Self::SourceNotFound,
            "SOURCE_FORBIDDEN" => Self::SourceForbidden,
            "LAYOUT_MALFORMED" => Self::LayoutMalformed,
            _ => {
                if let Some(isbn) = tag.strip_prefix("ISBN_") {
                    if isbn.is_empty() || !isbn.chars().all(|c| c.is_ascii_digit() || c == 'X') {
                        return None;
                    }
                    Self::IsbnExtracted(isbn.to_string())
                } else if let Some(count) = tag.strip_prefix("URLS_") {
                    Self::UrlsFound(count.parse().ok()?)
                } else if let Some(category) = tag.strip_prefix("CONFLICT_") {
                    Self::StateConflict(MarkerCategory::parse(category)?)
                } else {
                    return None;
                }
            }
        };
        Some(kind)
    }

    pub fn category(&self) -> MarkerCategory {
        match self {
            Self::GenomeUploaded => MarkerCategory::Upload,
            Self::IsbnExtracted(_) | Self::IsbnNone => MarkerCategory::Isbn,
            Self::UpdateSucceeded | Self::UpdateFailed | Self::UpdateConflict => {
                MarkerCategory::Update
            }
            Self::UrlsFound(_) => MarkerCategory::Urls,
            Self::SequenceFailure => MarkerCategory::Sequence,
            Self::SourceNotFound | Self::SourceForbidden => MarkerCategory::Source,
            Self::LayoutMalformed => MarkerCategory::Layout,
            Self::StateConflict(_) => MarkerCategory::Conflict,
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// A recorded marker with its optional payload body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub document_id: String,
    pub kind: MarkerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Marker {
    pub fn new(document_id: impl Into<String>, kind: MarkerKind) -> Self {
        Self {
            document_id: document_id.into(),
            kind,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        self.payload = (!payload.is_empty()).then_some(payload);
        self
    }

    /// `document_id/TAG`, used in logs and conflict messages.
    pub fn key(&self) -> String {
        format!("{}/{}", self.document_id, self.kind.tag())
    }
}

/// Result of an append-once `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The marker was newly written.
    Recorded,
    /// An identical marker already existed; nothing was written.
    AlreadyRecorded,
}
