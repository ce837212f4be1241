// persistence/sled_store.rs - Storage backed by Sled

use async_trait::async_trait;
use sled::{Db, Tree};
use std::path::Path;

use super::storage::{Storage, StorageError};

/// Tree holding all peer-trust keys
const TREE_PEER_TRUST: &str = "peer_trust";

/// Persistent storage backed by an embedded sled database.
///
/// sled calls block, so each one runs on the blocking pool where a caller's
/// timeout can abandon it.
pub struct SledStorage {
    tree: Tree,
}

impl SledStorage {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::with_db(&db)
    }

    /// Create a temporary database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(&db)
    }

    fn with_db(db: &Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(TREE_PEER_TRUST)?,
        })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(Tree) -> Result<T, sled::Error> + Send + 'static,
    {
        let tree = self.tree.clone();
        tokio::task::spawn_blocking(move || op(tree))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(format!("sled task failed: {e}"))))?
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key = key.to_string();
        self.blocking(move |tree| Ok(tree.get(key.as_bytes())?.map(|v| v.to_vec())))
            .await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let (key, value) = (key.to_string(), value.to_vec());
        self.blocking(move |tree| {
            tree.insert(key.as_bytes(), value)?;
            tree.flush()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.blocking(move |tree| {
            tree.remove(key.as_bytes())?;
            tree.flush()?;
            Ok(())
        })
        .await
    }
}
