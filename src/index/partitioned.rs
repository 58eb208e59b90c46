use super::{
    ChunkPayload, IndexError, IndexRecord, ScoredChunk, SearchScope, VectorIndex,
    compute_chunk_hash, point_id,
};
use crate::embedding::EmbeddingClient;
use crate::model::{Document, TenantKey, chunk_id, current_timestamp_rfc3339};
use std::sync::Arc;

/// One paragraph awaiting indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChunk {
    /// Owning tenant.
    pub tenant: TenantKey,
    /// Source document identifier.
    pub document_id: String,
    /// Original upload filename.
    pub filename: String,
    /// 1-based page number.
    pub page: u32,
    /// 1-based paragraph number.
    pub paragraph: u32,
    /// Paragraph text.
    pub text: String,
}

impl IndexChunk {
    /// One chunk per paragraph of `document`, in page then paragraph order.
    pub fn from_document(document: &Document) -> Vec<Self> {
        document
            .pages
            .iter()
            .flat_map(|page| {
                page.paragraphs.iter().map(move |paragraph| Self {
                    tenant: document.owner.clone(),
                    document_id: document.document_id.clone(),
                    filename: document.filename.clone(),
                    page: page.page_number,
                    paragraph: paragraph.paragraph_number,
                    text: paragraph.refined_text.clone(),
                })
            })
            .collect()
    }

    fn chunk_id(&self) -> String {
        chunk_id(&self.document_id, self.page, self.paragraph)
    }
}

/// Multi-tenant paragraph index: embeds text and delegates storage to a [`VectorIndex`].
pub struct PartitionedIndex {
    backend: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingClient>,
    dimension: usize,
    batch_size: usize,
}

impl PartitionedIndex {
    /// Combine a storage backend with an embedding client producing `dimension`-sized vectors.
    pub fn new(
        backend: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingClient>,
        dimension: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            backend,
            embedder,
            dimension,
            batch_size: batch_size.max(1),
        }
    }

    /// Idempotently prepare the backend.
    pub async fn ensure_ready(&self) -> Result<(), IndexError> {
        self.backend.ensure_ready(self.dimension).await
    }

    /// Embed and upsert `chunks`; every chunk must belong to the same tenant.
    pub async fn insert(&self, chunks: Vec<IndexChunk>) -> Result<usize, IndexError> {
        let Some(first) = chunks.first() else {
            return Ok(0);
        };
        if let Some(other) = chunks.iter().find(|chunk| chunk.tenant != first.tenant) {
            return Err(IndexError::MixedTenants {
                first: first.tenant.clone(),
                other: other.tenant.clone(),
            });
        }

        let tenant = first.tenant.clone();
        let ingested_at = current_timestamp_rfc3339();
        let mut written = 0;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embed(texts).await?;

            let records: Vec<IndexRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| {
                    let chunk_id = chunk.chunk_id();
                    IndexRecord {
                        point_id: point_id(&chunk.tenant, &chunk_id),
                        vector,
                        payload: ChunkPayload {
                            tenant: chunk.tenant.clone(),
                            document_id: chunk.document_id.clone(),
                            page: chunk.page,
                            paragraph: chunk.paragraph,
                            filename: chunk.filename.clone(),
                            chunk_id,
                            text: chunk.text.clone(),
                            chunk_hash: compute_chunk_hash(&chunk.text),
                            ingested_at: ingested_at.clone(),
                        },
                    }
                })
                .collect();

            written += self.backend.upsert(records).await?;
        }

        tracing::info!(tenant = %tenant, chunks = written, "Indexed paragraph chunks");
        Ok(written)
    }

    /// Index every paragraph of `documents`.
    pub async fn insert_documents(&self, documents: &[Document]) -> Result<usize, IndexError> {
        let chunks: Vec<IndexChunk> = documents.iter().flat_map(IndexChunk::from_document).collect();
        self.insert(chunks).await
    }

    /// Remove one document's chunks; a blank id is rejected rather than widened to the tenant.
    pub async fn delete_by_document(
        &self,
        tenant: &TenantKey,
        document_id: &str,
    ) -> Result<(), IndexError> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(IndexError::BlankDocumentId);
        }
        self.backend.delete_document(tenant, document_id).await?;
        tracing::info!(tenant = %tenant, document_id, "Removed document chunks");
        Ok(())
    }

    /// Remove every chunk owned by `tenant`.
    pub async fn delete_by_tenant(&self, tenant: &TenantKey) -> Result<(), IndexError> {
        self.backend.delete_tenant(tenant).await?;
        tracing::info!(tenant = %tenant, "Removed tenant chunks");
        Ok(())
    }

    /// Up to `limit` chunks in `scope` closest to `query`, best first.
    pub async fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(IndexError::EmbeddingCount {
                expected: 1,
                actual: 0,
            })?;

        let hits = self.backend.search(vector, scope, limit).await?;
        tracing::debug!(
            tenant = %scope.tenant_key(),
            documents = scope.document_ids().len(),
            hits = hits.len(),
            "Scoped search complete"
        );
        Ok(hits)
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, IndexError> {
        let expected = texts.len();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        if vectors.len() != expected {
            return Err(IndexError::EmbeddingCount {
                expected,
                actual: vectors.len(),
            });
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != self.dimension) {
            return Err(IndexError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vectors)
    }
}
