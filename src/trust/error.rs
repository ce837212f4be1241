// trust/error.rs - Trust Engine Errors

use thiserror::Error;

use crate::persistence::StorageError;

/// Errors raised by the identity and trust engine
#[derive(Debug, Error)]
pub enum TrustError {
    /// Malformed key or signature encoding
    #[error("Malformed key material: {0}")]
    KeyFormat(String),

    /// The platform RNG failed while generating a keypair
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing was attempted with an identity that has no private key
    #[error("Identity {0} has no private key")]
    NoPrivateKey(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported version: {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Two distinct public keys derive the same truncated peer id
    #[error("Peer id collision on {peer_id}: known fingerprint {known}, announced {announced}")]
    PeerIdCollision {
        peer_id: String,
        known: String,
        announced: String,
    },

    /// Announced identifiers do not match the ones derived from the key
    #[error("Identity mismatch: {field} claimed {claimed}, derived {derived}")]
    IdentityMismatch {
        field: &'static str,
        claimed: String,
        derived: String,
    },

    #[error("Invalid endorsement: {0}")]
    InvalidEndorsement(String),

    #[error("Identity manager not initialized")]
    NotInitialized,
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        TrustError::InvalidFormat(err.to_string())
    }
}
