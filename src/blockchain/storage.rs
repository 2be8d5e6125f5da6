use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use sled::Db;
use thiserror::Error;

/// Key under which the ordered block list is stored
pub const BLOCKS_KEY: &str = "blocks";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Opaque key-value store the ledger persists into
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`. Returns only once the write is durable.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
}

/// sled-backed storage
pub struct SledStorage {
    db: Db,
}

impl std::fmt::Debug for SledStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStorage").finish()
    }
}

impl SledStorage {
    /// Opens (or creates) the database directory at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let len = value.len();
        self.db.insert(key, value)?;
        self.db.flush_async().await?;
        debug!("Flushed {} bytes under '{}'", len, key);
        Ok(())
    }
}

/// Volatile storage, used in tests and when no database can be opened
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.get(BLOCKS_KEY).await.unwrap().is_none());

        storage.set(BLOCKS_KEY, vec![1, 2, 3]).await.unwrap();
        assert_eq!(storage.get(BLOCKS_KEY).await.unwrap(), Some(vec![1, 2, 3]));

        storage.set(BLOCKS_KEY, vec![4]).await.unwrap();
        assert_eq!(storage.get(BLOCKS_KEY).await.unwrap(), Some(vec![4]));
    }

    #[tokio::test]
    async fn test_sled_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let storage = SledStorage::open(dir.path()).unwrap();
            storage.set(BLOCKS_KEY, b"chain".to_vec()).await.unwrap();
        }

        let storage = SledStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get(BLOCKS_KEY).await.unwrap(), Some(b"chain".to_vec()));
        assert!(storage.get("missing").await.unwrap().is_none());
    }
}
