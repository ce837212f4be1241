// trust/mod.rs - Identity and Web of Trust Module

//! Identity and web-of-trust engine for P2P participants.
//!
//! This module provides a PGP-like web of trust adapted to ephemeral peer
//! sessions:
//!
//! - **Keys / Fingerprints**: Ed25519 keypairs and the ids derived from them
//! - **Identity**: keypair plus profile, sign/verify, backup bundles
//! - **Records**: per-peer trust state (level, verification, endorsements)
//! - **Web**: introduction chains and the bounded trust they grant
//! - **Manager**: the single owner of the local identity and all records
//!
//! # Example
//!
//! ```ignore
//! use peer_trust::trust::*;
//! use peer_trust::persistence::MemoryStorage;
//!
//! let mut manager = IdentityManager::new(Arc::new(MemoryStorage::new()), ManagerConfig::default());
//! manager.initialize(Profile::named("alice")).await?;
//!
//! // A peer says hello
//! manager.add_peer(&bob_announcement, None).await?;
//!
//! // Fingerprints compared over a video call
//! manager.set_trust(&bob_announcement.id, TrustLevel::Full, Some(VerificationMethod::Video)).await?;
//!
//! // Bob introduces Carol
//! manager.receive_introduction(&bob_announcement.id, &introduction).await?;
//! ```

mod bundle;
mod canonical;
mod error;
mod fingerprint;
mod identity;
mod keys;
mod manager;
mod record;
mod signature;
mod web;

pub use bundle::{
    EXPORT_VERSION, IDENTITY_EXPORT_MARKER, IDENTITY_FIELD, PEERS_EXPORT_MARKER, PEERS_FIELD,
};

pub use canonical::{canonical_bytes, SIGNATURE_FIELD};

pub use error::TrustError;

pub use fingerprint::{fingerprint, key_id, peer_id, DerivedIds, PEER_ID_PREFIX};

pub use identity::{
    fingerprint_of, verify_payload, Identity, PeerAnnouncement, Profile, ProfilePatch,
    PublicIdentity, IDENTITY_FORMAT_VERSION, PROTOCOL_VERSION,
};

pub use keys::{export_public, import_public, public_key_bytes, KeyPair};

pub use manager::{
    AddPeerOutcome, ChainApplication, IdentityManager, ImportReport, InitOutcome,
    IntroductionOutcome, ManagerConfig, PeerChange, PersistStatus, SharedIdentityManager,
    TrustStats, UpdateOutcome,
};

pub use record::TrustRecord;

pub use signature::{Endorsement, Introduction, TrustLevel, VerificationMethod};

pub use web::{ChainPolicy, ChainRejection, ChainVerdict, TrustChain, TrustChainVerifier};

/// Current time as epoch milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
