//! Stored document records and the tenant key that partitions them.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Owning account of a document; every storage and index operation is scoped by one.
///
/// The key is guaranteed non-empty, so an unscoped query cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantKey(String);

/// Error returned when a tenant key is blank.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tenant key must not be empty")]
pub struct EmptyTenantKey;

impl TenantKey {
    /// Build a tenant key from a username, trimming surrounding whitespace.
    pub fn new(value: impl AsRef<str>) -> Result<Self, EmptyTenantKey> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            Err(EmptyTenantKey)
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantKey {
    type Error = EmptyTenantKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantKey> for String {
    fn from(value: TenantKey) -> Self {
        value.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One paragraph of a page's refined text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 1-based position within the page.
    #[serde(rename = "paragraph")]
    pub paragraph_number: u32,
    /// Cleaned paragraph text.
    pub refined_text: String,
}

/// One source page (or the single page of an image upload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based position within the document.
    #[serde(rename = "page")]
    pub page_number: u32,
    /// Raw OCR output.
    pub original_text: String,
    /// OCR output after normalization.
    pub refined_text: String,
    /// Paragraphs split from `refined_text`, in source order.
    pub paragraphs: Vec<Paragraph>,
}

/// An ingested upload, owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque unique identifier assigned at ingestion.
    pub document_id: String,
    /// Original upload filename.
    pub filename: String,
    /// Owning tenant.
    #[serde(rename = "username")]
    pub owner: TenantKey,
    /// RFC3339 ingestion timestamp.
    pub uploaded_at: String,
    /// Pages in source order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Total paragraph count across all pages.
    pub fn paragraph_count(&self) -> usize {
        self.pages.iter().map(|page| page.paragraphs.len()).sum()
    }
}

/// Deterministic identifier of a paragraph chunk.
pub fn chunk_id(document_id: &str, page_number: u32, paragraph_number: u32) -> String {
    format!("{document_id}-{page_number}-{paragraph_number}")
}

/// Current UTC time formatted as RFC3339.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
