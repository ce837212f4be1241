// persistence/storage.rs - Storage Backends
//
//! Key-value storage backends
//!
//! Provides:
//! - Storage trait (the collaborator contract: get / set / delete)
//! - File-based storage
//! - In-memory storage (for testing)
//! - Timeout-bounded wrapper

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::observability::record_storage_call;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage {op} on `{key}` timed out after {after:?}")]
    Timeout {
        op: &'static str,
        key: String,
        after: Duration,
    },
}

/// Storage backend trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// File-based storage backend, one file per key
pub struct FileStorage {
    /// Base path for storage
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", sanitize_filename(key)))
    }

    /// Ensure a directory exists
    async fn ensure_dir(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.key_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.ensure_dir(&self.base_path).await?;

        // Write-then-rename so a crash never leaves a half-written record
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key, path = ?path, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage backend (for testing)
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a new memory storage
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Wraps a backend so no call can hang longer than a fixed timeout
pub struct BoundedStorage {
    inner: Arc<dyn Storage>,
    timeout: Duration,
}

impl BoundedStorage {
    pub fn new(inner: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn timed_out(&self, op: &'static str, key: &str) -> StorageError {
        StorageError::Timeout {
            op,
            key: key.to_string(),
            after: self.timeout,
        }
    }
}

#[async_trait]
impl Storage for BoundedStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.inner.get(key))
            .await
            .map_err(|_| self.timed_out("get", key))
            .and_then(|r| r);
        record_storage_call("get", start.elapsed(), result.is_ok());
        result
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.inner.set(key, value))
            .await
            .map_err(|_| self.timed_out("set", key))
            .and_then(|r| r);
        record_storage_call("set", start.elapsed(), result.is_ok());
        result
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.inner.delete(key))
            .await
            .map_err(|_| self.timed_out("delete", key))
            .and_then(|r| r);
        record_storage_call("delete", start.elapsed(), result.is_ok());
        result
    }
}

/// Sanitize a key for use as a filename
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend that never answers
    struct StalledStorage;

    #[async_trait]
    impl Storage for StalledStorage {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_memory_storage_basic() {
        let storage = MemoryStorage::new();
        assert!(storage.get("k").await.unwrap().is_none());

        storage.set("k", b"v1").await.unwrap();
        storage.set("k", b"v2").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(storage.len(), 1);

        storage.delete("k").await.unwrap();
        storage.delete("k").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_basic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("nested"));

        assert!(storage.get("peer_trust.identity").await.unwrap().is_none());

        storage.set("peer_trust.identity", b"{}").await.unwrap();
        assert_eq!(
            storage.get("peer_trust.identity").await.unwrap(),
            Some(b"{}".to_vec())
        );
        assert!(temp_dir.path().join("nested/peer_trust.identity.json").exists());
        assert!(!temp_dir.path().join("nested/peer_trust.identity.json.tmp").exists());

        storage.delete("peer_trust.identity").await.unwrap();
        assert!(storage.get("peer_trust.identity").await.unwrap().is_none());
        storage.delete("peer_trust.identity").await.unwrap();
    }

    #[tokio::test]
    async fn test_bounded_storage_times_out() {
        let storage = BoundedStorage::new(Arc::new(StalledStorage), Duration::from_millis(20));

        let err = storage.get("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Timeout { op: "get", .. }));

        let err = storage.set("k", b"v").await.unwrap_err();
        assert!(matches!(err, StorageError::Timeout { op: "set", .. }));
    }

    #[tokio::test]
    async fn test_bounded_storage_passes_through() {
        let storage = BoundedStorage::new(Arc::new(MemoryStorage::new()), Duration::from_secs(1));
        storage.set("k", b"v").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("peer_trust.peers"), "peer_trust.peers");
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
    }
}
