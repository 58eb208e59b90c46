use super::{ChunkPayload, IndexError, IndexRecord, ScoredChunk, SearchScope, VectorIndex};
use crate::model::TenantKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

struct StoredPoint {
    vector: Vec<f32>,
    payload: ChunkPayload,
}

/// Process-local brute-force cosine index.
#[derive(Default)]
pub struct MemoryIndex {
    points: RwLock<HashMap<String, StoredPoint>>,
    dimension: AtomicUsize,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points across all tenants.
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    /// Whether the index holds no points.
    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }

    fn check_dimension(&self, actual: usize) -> Result<(), IndexError> {
        match self.dimension.load(Ordering::Relaxed) {
            0 => Ok(()),
            expected if expected == actual => Ok(()),
            expected => Err(IndexError::Dimension { expected, actual }),
        }
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|v| v * v).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_ready(&self, dimension: usize) -> Result<(), IndexError> {
        let _ = self
            .dimension
            .compare_exchange(0, dimension, Ordering::Relaxed, Ordering::Relaxed);
        self.check_dimension(dimension)
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError> {
        for record in &records {
            self.check_dimension(record.vector.len())?;
        }

        let count = records.len();
        let mut points = self.points.write().await;
        for record in records {
            points.insert(
                record.point_id,
                StoredPoint {
                    vector: record.vector,
                    payload: record.payload,
                },
            );
        }
        Ok(count)
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        self.check_dimension(vector.len())?;

        let points = self.points.read().await;
        let mut hits: Vec<ScoredChunk> = points
            .values()
            .filter(|point| scope.contains(&point.payload))
            .map(|point| ScoredChunk {
                payload: point.payload.clone(),
                score: cosine_similarity(&vector, &point.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.payload.chunk_id.cmp(&b.payload.chunk_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_document(
        &self,
        tenant: &TenantKey,
        document_id: &str,
    ) -> Result<(), IndexError> {
        self.points.write().await.retain(|_, point| {
            !(point.payload.tenant == *tenant && point.payload.document_id == document_id)
        });
        Ok(())
    }

    async fn delete_tenant(&self, tenant: &TenantKey) -> Result<(), IndexError> {
        self.points
            .write()
            .await
            .retain(|_, point| point.payload.tenant != *tenant);
        Ok(())
    }
}
