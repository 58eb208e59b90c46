//! Tenant-partitioned similarity index over paragraph chunks.
//!
//! [`VectorIndex`] is the storage seam (Qdrant or in-process); [`PartitionedIndex`] owns
//! embedding, batching, and the tenant rules layered on top of it.

mod memory;
mod partitioned;
pub mod payload;

pub use memory::MemoryIndex;
pub use partitioned::{IndexChunk, PartitionedIndex};
pub use payload::{ChunkPayload, compute_chunk_hash, point_id};

use crate::embedding::EmbeddingClientError;
use crate::model::TenantKey;
use crate::qdrant::QdrantError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant request failed.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// An insert batch carried chunks from more than one tenant.
    #[error("index batch spans multiple tenants ({first} and {other})")]
    MixedTenants {
        /// Tenant of the first chunk.
        first: TenantKey,
        /// First differing tenant.
        other: TenantKey,
    },
    /// A scoped delete was requested without a document id.
    #[error("document id must not be blank")]
    BlankDocumentId,
    /// Provider returned a different number of vectors than texts.
    #[error("expected {expected} embeddings, received {actual}")]
    EmbeddingCount {
        /// Texts submitted.
        expected: usize,
        /// Vectors received.
        actual: usize,
    },
    /// A vector did not match the index dimension.
    #[error("vector has {actual} dimensions, index expects {expected}")]
    Dimension {
        /// Configured dimension.
        expected: usize,
        /// Received dimension.
        actual: usize,
    },
}

/// Vector plus payload ready to be written.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// Deterministic point identifier, see [`point_id`].
    pub point_id: String,
    /// Embedding of the payload text.
    pub vector: Vec<f32>,
    /// Stored metadata.
    pub payload: ChunkPayload,
}

/// Search hit with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Stored metadata of the hit.
    pub payload: ChunkPayload,
    /// Similarity score; higher is closer.
    pub score: f32,
}

/// Restriction applied to every search: one tenant, optionally a subset of its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchScope {
    tenant: TenantKey,
    document_ids: Vec<String>,
}

impl SearchScope {
    /// Scope covering the tenant's whole corpus.
    pub fn tenant(tenant: TenantKey) -> Self {
        Self {
            tenant,
            document_ids: Vec::new(),
        }
    }

    /// Scope limited to `document_ids`; blank ids are dropped and an empty list means the whole
    /// corpus.
    pub fn documents<I, S>(tenant: TenantKey, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = Vec::new();
        for id in document_ids {
            let id = id.as_ref().trim();
            if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
        Self {
            tenant,
            document_ids: ids,
        }
    }

    /// Tenant the scope is bound to.
    pub fn tenant_key(&self) -> &TenantKey {
        &self.tenant
    }

    /// Document restriction; empty when unrestricted.
    pub fn document_ids(&self) -> &[String] {
        &self.document_ids
    }

    /// Whether a stored payload falls inside the scope.
    pub fn contains(&self, payload: &ChunkPayload) -> bool {
        payload.tenant == self.tenant
            && (self.document_ids.is_empty()
                || self.document_ids.iter().any(|id| *id == payload.document_id))
    }
}

/// Storage backend for paragraph vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotently prepare the backend for vectors of `dimension` components.
    async fn ensure_ready(&self, dimension: usize) -> Result<(), IndexError>;

    /// Insert or replace records keyed by their point id.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError>;

    /// Nearest neighbours of `vector` inside `scope`, best first.
    async fn search(
        &self,
        vector: Vec<f32>,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Remove every chunk of one document owned by `tenant`.
    async fn delete_document(&self, tenant: &TenantKey, document_id: &str)
    -> Result<(), IndexError>;

    /// Remove every chunk owned by `tenant`.
    async fn delete_tenant(&self, tenant: &TenantKey) -> Result<(), IndexError>;
}
