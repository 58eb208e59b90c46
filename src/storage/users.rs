use super::{Snapshot, StorageError, UserStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Stored credentials of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique login name; also the tenant key of the account's documents.
    pub username: String,
    /// bcrypt hash of the password.
    pub hashed_password: String,
}

/// In-memory user store with an optional JSON snapshot.
pub struct LocalUserStore {
    users: RwLock<BTreeMap<String, UserRecord>>,
    snapshot: Snapshot,
}

impl LocalUserStore {
    /// Store that lives only for the process lifetime.
    pub fn in_memory() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            snapshot: Snapshot::default(),
        }
    }

    /// Open (or start) the snapshot at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let snapshot = Snapshot::new(Some(path.into()));
        let records: Vec<UserRecord> = snapshot.load()?;
        let users = records
            .into_iter()
            .map(|record| (record.username.clone(), record))
            .collect();
        Ok(Self {
            users: RwLock::new(users),
            snapshot,
        })
    }

    async fn persist(&self, users: &BTreeMap<String, UserRecord>) -> Result<(), StorageError> {
        let records: Vec<&UserRecord> = users.values().collect();
        self.snapshot.write(&records).await
    }
}

#[async_trait]
impl UserStore for LocalUserStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StorageError::Duplicate(user.username));
        }
        let username = user.username.clone();
        users.insert(username.clone(), user);
        if let Err(error) = self.persist(&users).await {
            users.remove(&username);
            return Err(error);
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let users = self.users.read().await;
        self.persist(&users).await
    }
}
