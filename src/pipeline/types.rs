//! Errors and value types shared across pipeline components.

use crate::auth::AuthError;
use crate::completion::CompletionError;
use crate::index::{IndexError, ScoredChunk};
use crate::model::Document;
use crate::ocr::OcrError;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::path::Path;
use thiserror::Error;

/// Input formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Multi-page PDF, rendered page by page.
    Pdf,
    /// Single-page JPEG or PNG image.
    Image,
}

impl SourceKind {
    /// Classify a file by its extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Uploaded file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Original filename, used for classification and display.
    pub filename: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Wrap a named buffer.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Detected input format, if supported.
    pub fn kind(&self) -> Option<SourceKind> {
        SourceKind::from_filename(&self.filename)
    }
}

/// Result of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedDocument {
    /// Persisted document.
    pub document: Document,
    /// Number of pages processed.
    pub page_count: usize,
}

/// A retrieved paragraph as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Paragraph text.
    pub text: String,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// Source document identifier.
    pub document_id: String,
    /// Source filename.
    pub filename: String,
    /// 1-based page number.
    pub page: u32,
    /// 1-based paragraph number.
    pub paragraph: u32,
}

impl From<ScoredChunk> for RetrievedChunk {
    fn from(hit: ScoredChunk) -> Self {
        Self {
            text: hit.payload.text,
            score: hit.score,
            document_id: hit.payload.document_id,
            filename: hit.payload.filename,
            page: hit.payload.page,
            paragraph: hit.payload.paragraph,
        }
    }
}

/// Answer produced by the query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// Chunks the answer was grounded on, best first.
    pub documents: Vec<RetrievedChunk>,
    /// Model answer.
    pub response: String,
}

/// Errors raised while ingesting a single file.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File extension is not one of the supported kinds.
    #[error("unsupported input kind: {0}")]
    UnsupportedInputKind(String),
    /// Rendering or recognition failed.
    #[error(transparent)]
    Ocr(#[from] OcrError),
    /// Normalization call failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// Document could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by the theme pipeline.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// None of the requested documents belong to the caller.
    #[error("no matching documents")]
    NotFound,
    /// A stage call failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// A stage returned output that does not match its record shape.
    #[error("{stage} output is malformed: {reason}")]
    MalformedStageOutput {
        /// Stage template id.
        stage: &'static str,
        /// Parse failure.
        reason: String,
    },
    /// Stage input could not be encoded.
    #[error("failed to encode stage input: {0}")]
    Encode(#[from] serde_json::Error),
    /// Documents could not be loaded.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Caller-facing error of every service operation.
///
/// Only [`ServiceError::Upstream`] carries internal detail, and its `Display` shows just the
/// operation context.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request named an input the service cannot process.
    #[error("{0}")]
    UnsupportedInput(String),
    /// Credentials or bearer token were rejected.
    #[error("{0}")]
    AuthenticationFailure(String),
    /// Nothing the caller owns matched the request.
    #[error("{0}")]
    NotFound(String),
    /// A collaborator failed.
    #[error("{context}")]
    Upstream {
        /// Generic, operation-specific message.
        context: &'static str,
        /// Internal cause, logged but never returned to callers.
        #[source]
        source: BoxError,
    },
}

impl ServiceError {
    /// Wrap a collaborator failure under an operation-specific message.
    pub fn upstream(context: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Upstream {
            context,
            source: source.into(),
        }
    }

    /// Map an auth failure: rejected credentials or tokens become `AuthenticationFailure`,
    /// anything else is an upstream failure under `context`.
    pub fn from_auth(context: &'static str, error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => {
                Self::AuthenticationFailure("Incorrect username or password".into())
            }
            AuthError::InvalidToken(_) => {
                Self::AuthenticationFailure("Could not validate credentials".into())
            }
            other => Self::upstream(context, other),
        }
    }

    /// Map a theme failure.
    pub fn from_themes(error: ThemeError) -> Self {
        match error {
            ThemeError::NotFound => Self::NotFound("No matching documents found".into()),
            other => Self::upstream("Theme extraction failed", other),
        }
    }

    /// Map an index failure under `context`.
    pub fn from_index(context: &'static str, error: IndexError) -> Self {
        Self::upstream(context, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_is_case_insensitive() {
        assert_eq!(SourceKind::from_filename("Scan.PDF"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_filename("photo.JpEg"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_filename("photo.png"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_filename("notes.txt"), None);
        assert_eq!(SourceKind::from_filename("pdf"), None);
    }

    #[test]
    fn upstream_display_hides_the_cause() {
        let error = ServiceError::upstream("Query failed", "connection refused to 10.0.0.3");
        assert_eq!(error.to_string(), "Query failed");
    }

    #[test]
    fn theme_not_found_maps_to_not_found() {
        assert!(matches!(
            ServiceError::from_themes(ThemeError::NotFound),
            ServiceError::NotFound(_)
        ));
    }
}
