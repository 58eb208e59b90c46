//! Document and user persistence.
//!
//! The local stores keep records in memory behind a [`tokio::sync::RwLock`] and, when given a
//! path, rewrite a JSON snapshot after every mutation (write to a sibling temp file, then
//! rename).

mod documents;
mod users;

pub use documents::LocalDocumentStore;
pub use users::{LocalUserStore, UserRecord};

use crate::model::{Document, TenantKey};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Snapshot file could not be read or written.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot contents could not be encoded or decoded.
    #[error("storage snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A record with the same key already exists.
    #[error("record already exists: {0}")]
    Duplicate(String),
}

/// Persistence for ingested documents; every read and delete is scoped to a tenant.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document.
    async fn insert(&self, document: Document) -> Result<(), StorageError>;

    /// Documents owned by `tenant` among `document_ids`, in request order. Unknown or foreign
    /// ids are skipped and repeated ids are returned once.
    async fn find(
        &self,
        tenant: &TenantKey,
        document_ids: &[String],
    ) -> Result<Vec<Document>, StorageError>;

    /// Every document owned by `tenant`, oldest first.
    async fn list(&self, tenant: &TenantKey) -> Result<Vec<Document>, StorageError>;

    /// Remove one document; returns whether it existed.
    async fn delete(&self, tenant: &TenantKey, document_id: &str) -> Result<bool, StorageError>;

    /// Remove every document owned by `tenant`; returns how many were removed.
    async fn delete_tenant(&self, tenant: &TenantKey) -> Result<usize, StorageError>;

    /// Write any pending state to durable storage.
    async fn flush(&self) -> Result<(), StorageError>;
}

/// Persistence for user credentials.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by name.
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Store a new user; fails with [`StorageError::Duplicate`] when the name is taken.
    async fn insert(&self, user: UserRecord) -> Result<(), StorageError>;

    /// Write any pending state to durable storage.
    async fn flush(&self) -> Result<(), StorageError>;
}

/// Optional JSON file mirroring a store's contents.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    path: Option<PathBuf>,
}

impl Snapshot {
    pub(crate) fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the snapshot, or `T::default()` when there is no path or no file yet.
    pub(crate) fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StorageError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(T::default());
        };
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(error) => Err(error.into()),
        }
    }

    pub(crate) async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StorageError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(value)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}
