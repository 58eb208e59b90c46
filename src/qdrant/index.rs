use super::client::QdrantService;
use super::filters::{build_document_filter, build_scope_filter, build_tenant_filter};
use super::types::PointStruct;
use crate::index::{ChunkPayload, IndexError, IndexRecord, ScoredChunk, SearchScope, VectorIndex};
use crate::model::TenantKey;
use async_trait::async_trait;
use serde_json::Value;

/// [`VectorIndex`] backed by a single Qdrant collection shared by all tenants.
pub struct QdrantIndex {
    service: QdrantService,
    collection: String,
}

impl QdrantIndex {
    /// Bind `service` to `collection`.
    pub fn new(service: QdrantService, collection: impl Into<String>) -> Self {
        Self {
            service,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_ready(&self, dimension: usize) -> Result<(), IndexError> {
        self.service
            .ensure_collection(&self.collection, dimension as u64)
            .await?;
        self.service.ensure_payload_indexes(&self.collection).await?;
        Ok(())
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError> {
        let points = records
            .into_iter()
            .map(|record| {
                Ok(PointStruct {
                    id: record.point_id,
                    vector: record.vector,
                    payload: serde_json::to_value(&record.payload)?,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .map_err(super::QdrantError::from)?;

        Ok(self.service.upsert_points(&self.collection, points).await?)
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let points = self
            .service
            .query_points(&self.collection, vector, build_scope_filter(scope), limit)
            .await?;

        let mut hits = Vec::with_capacity(points.len());
        for point in points {
            let Some(payload) = point.payload else {
                tracing::warn!(point_id = %point.id, "Search hit without payload skipped");
                continue;
            };
            match serde_json::from_value::<ChunkPayload>(Value::Object(payload)) {
                // Hits outside the scope are never returned, whatever the server-side filter did.
                Ok(payload) if scope.contains(&payload) => hits.push(ScoredChunk {
                    payload,
                    score: point.score,
                }),
                Ok(_) => {
                    tracing::error!(point_id = %point.id, "Search hit outside requested scope dropped");
                }
                Err(error) => {
                    tracing::warn!(point_id = %point.id, error = %error, "Search hit with malformed payload skipped");
                }
            }
        }
        Ok(hits)
    }

    async fn delete_document(
        &self,
        tenant: &TenantKey,
        document_id: &str,
    ) -> Result<(), IndexError> {
        self.service
            .delete_points(&self.collection, build_document_filter(tenant, document_id))
            .await?;
        Ok(())
    }

    async fn delete_tenant(&self, tenant: &TenantKey) -> Result<(), IndexError> {
        self.service
            .delete_points(&self.collection, build_tenant_filter(tenant))
            .await?;
        Ok(())
    }
}
