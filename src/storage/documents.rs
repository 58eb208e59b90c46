use super::{DocumentStore, Snapshot, StorageError};
use crate::model::{Document, TenantKey};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// In-memory document store with an optional JSON snapshot.
pub struct LocalDocumentStore {
    documents: RwLock<Vec<Document>>,
    snapshot: Snapshot,
}

impl LocalDocumentStore {
    /// Store that lives only for the process lifetime.
    pub fn in_memory() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            snapshot: Snapshot::default(),
        }
    }

    /// Open (or start) the snapshot at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let snapshot = Snapshot::new(Some(path.into()));
        let documents: Vec<Document> = snapshot.load()?;
        tracing::debug!(
            path = ?snapshot.path(),
            documents = documents.len(),
            "Opened document store"
        );
        Ok(Self {
            documents: RwLock::new(documents),
            snapshot,
        })
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn insert(&self, document: Document) -> Result<(), StorageError> {
        let mut documents = self.documents.write().await;
        if documents
            .iter()
            .any(|existing| existing.document_id == document.document_id)
        {
            return Err(StorageError::Duplicate(document.document_id));
        }
        documents.push(document);
        if let Err(error) = self.snapshot.write(&*documents).await {
            documents.pop();
            return Err(error);
        }
        Ok(())
    }

    async fn find(
        &self,
        tenant: &TenantKey,
        document_ids: &[String],
    ) -> Result<Vec<Document>, StorageError> {
        let documents = self.documents.read().await;
        let mut found: Vec<Document> = Vec::new();
        for id in document_ids {
            if found.iter().any(|document| document.document_id == *id) {
                continue;
            }
            if let Some(document) = documents
                .iter()
                .find(|document| document.document_id == *id && document.owner == *tenant)
            {
                found.push(document.clone());
            }
        }
        Ok(found)
    }

    async fn list(&self, tenant: &TenantKey) -> Result<Vec<Document>, StorageError> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|document| document.owner == *tenant)
            .cloned()
            .collect())
    }

    async fn delete(&self, tenant: &TenantKey, document_id: &str) -> Result<bool, StorageError> {
        let mut documents = self.documents.write().await;
        let Some(position) = documents
            .iter()
            .position(|document| document.document_id == document_id && document.owner == *tenant)
        else {
            return Ok(false);
        };
        let removed = documents.remove(position);
        if let Err(error) = self.snapshot.write(&*documents).await {
            documents.insert(position, removed);
            return Err(error);
        }
        Ok(true)
    }

    async fn delete_tenant(&self, tenant: &TenantKey) -> Result<usize, StorageError> {
        let mut documents = self.documents.write().await;
        let kept: Vec<Document> = documents
            .iter()
            .filter(|document| document.owner != *tenant)
            .cloned()
            .collect();
        let removed = documents.len() - kept.len();
        if removed > 0 {
            self.snapshot.write(&kept).await?;
            *documents = kept;
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let documents = self.documents.read().await;
        self.snapshot.write(&*documents).await
    }
}
