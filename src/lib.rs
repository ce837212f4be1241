// lib.rs - Peer Identity and Web of Trust
//
// Ed25519 identities, per-peer trust records and introduction chains for
// peer-to-peer sessions.

#![doc = include_str!("../README.md")]

pub mod observability;
pub mod persistence;
pub mod settings;
pub mod trust;

// Re-export commonly used types
pub use trust::{
    ChainPolicy, ChainVerdict, Endorsement, Identity, IdentityManager, Introduction,
    ManagerConfig, PeerAnnouncement, PersistStatus, Profile, ProfilePatch, PublicIdentity,
    SharedIdentityManager, TrustError, TrustLevel, TrustRecord, UpdateOutcome,
    VerificationMethod,
};

pub use persistence::{
    open_storage, FileStorage, MemoryStorage, SledStorage, Storage, StorageBackend,
    StorageConfig, StorageError,
};

pub use observability::{
    init_metrics, init_tracing, MetricsConfig, TracingConfig, TracingError, TracingFormat,
};

pub use settings::{Settings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::persistence::{open_storage, Storage, StorageConfig};
    pub use crate::trust::{
        AddPeerOutcome, ChainPolicy, ChainVerdict, Endorsement, Identity, IdentityManager,
        InitOutcome, Introduction, IntroductionOutcome, ManagerConfig, PeerAnnouncement,
        PersistStatus, Profile, ProfilePatch, PublicIdentity, SharedIdentityManager, TrustError,
        TrustLevel, TrustRecord, UpdateOutcome, VerificationMethod,
    };
}
