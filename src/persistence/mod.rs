// persistence/mod.rs - Trust State Persistence
//
//! Storage collaborator for the trust engine
//!
//! The engine only needs a small key-value contract ([`Storage`]): two logical
//! keys, one for the local identity and one for the trust record collection.
//! This module provides that contract plus reference backends:
//!
//! - **MemoryStorage**: process-local map, for tests and ephemeral sessions
//! - **FileStorage**: one JSON file per key in a directory
//! - **SledStorage**: embedded sled database
//!
//! Every backend handed to the engine is wrapped in [`BoundedStorage`] so a
//! stuck backend surfaces as [`StorageError::Timeout`] instead of hanging.
//!
//! # Example
//!
//! ```ignore
//! use peer_trust::persistence::{open_storage, StorageConfig};
//!
//! let storage = open_storage(&StorageConfig::default())?;
//! storage.set("peer_trust.identity", b"{}").await?;
//! ```

pub mod sled_store;
pub mod storage;

pub use sled_store::SledStorage;
pub use storage::{BoundedStorage, FileStorage, MemoryStorage, Storage, StorageError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Storage key of the local identity
pub const IDENTITY_KEY: &str = "peer_trust.identity";

/// Storage key of the trust record collection
pub const PEERS_KEY: &str = "peer_trust.peers";

/// Storage backend types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// File-based storage
    #[default]
    File,
    /// Embedded sled database
    Sled,
    /// In-memory storage (for testing)
    Memory,
}

/// Persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Directory (file backend) or database path (sled backend)
    pub path: PathBuf,

    /// Upper bound for a single storage call, in milliseconds
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("./data/peer-trust"),
            timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// In-memory configuration for tests
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Default::default()
        }
    }
}

/// Open the configured backend
pub fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::File => Arc::new(FileStorage::new(config.path.clone())),
        StorageBackend::Sled => Arc::new(SledStorage::open(&config.path)?),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    info!(backend = ?config.backend, path = ?config.path, "Storage opened");
    Ok(storage)
}
