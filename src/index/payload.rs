//! Payload stored alongside each paragraph vector, plus identity helpers.

use crate::model::TenantKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Metadata persisted with every indexed paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Owning tenant; the partition key of the index.
    pub tenant: TenantKey,
    /// Source document identifier.
    pub document_id: String,
    /// 1-based page number.
    pub page: u32,
    /// 1-based paragraph number within the page.
    pub paragraph: u32,
    /// Original upload filename.
    pub filename: String,
    /// `"{document_id}-{page}-{paragraph}"`.
    pub chunk_id: String,
    /// Paragraph text.
    pub text: String,
    /// SHA-256 of `text`.
    pub chunk_hash: String,
    /// RFC3339 time the chunk was written.
    pub ingested_at: String,
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Point identifier derived from the owning tenant and a chunk id.
///
/// Identical coordinates within a tenant map to the same point; other tenants never collide.
pub fn point_id(tenant: &TenantKey, chunk_id: &str) -> String {
    let name = format!("{tenant}/{chunk_id}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}
