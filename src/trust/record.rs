// trust/record.rs - Per-Peer Trust Records

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::error::TrustError;
use super::fingerprint::DerivedIds;
use super::identity::{check_derived, Profile, PublicIdentity, IDENTITY_FORMAT_VERSION, PROTOCOL_VERSION};
use super::keys;
use super::signature::{Endorsement, TrustLevel, VerificationMethod};

/// Everything the local participant knows about one remote peer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRecord {
    pub peer_id: String,

    /// Cached base64 SPKI public key
    pub public_key: String,
    pub fingerprint: String,
    pub key_id: String,

    #[serde(default)]
    pub trust_level: TrustLevel,

    /// Local identity id that assigned the current level
    pub trusted_by: String,

    /// Last trust change (epoch ms)
    pub trusted_at: i64,

    #[serde(default)]
    pub verified: bool,

    #[serde(default)]
    pub verified_method: VerificationMethod,

    #[serde(default)]
    pub verified_at: Option<i64>,

    /// Advisory display metadata from the peer's last announcement
    #[serde(default)]
    pub profile: Profile,

    #[serde(default)]
    pub capabilities: BTreeSet<String>,

    /// Introducer's peer id, `None` for peers met directly
    #[serde(default)]
    pub introduced_by: Option<String>,

    /// Endorsements of this peer's key, in arrival order
    #[serde(default)]
    pub signatures: Vec<Endorsement>,

    #[serde(default)]
    pub notes: String,

    pub first_seen: i64,

    /// Last time any field of the record changed
    pub last_updated: i64,
}

impl TrustRecord {
    /// New record at `unknown` for a validated announcement
    pub(crate) fn new(
        announcement: &PublicIdentity,
        ids: DerivedIds,
        trusted_by: &str,
        introduced_by: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            peer_id: ids.peer_id,
            public_key: announcement.public_key.clone(),
            fingerprint: ids.fingerprint,
            key_id: ids.key_id,
            trust_level: TrustLevel::Unknown,
            trusted_by: trusted_by.to_string(),
            trusted_at: now,
            verified: false,
            verified_method: VerificationMethod::None,
            verified_at: None,
            profile: announcement.profile.clone(),
            capabilities: announcement.capabilities.clone(),
            introduced_by,
            signatures: Vec::new(),
            notes: String::new(),
            first_seen: now,
            last_updated: now,
        }
    }

    /// Refresh cached announcement fields.
    ///
    /// Trust level, verification state, provenance and endorsements are left
    /// alone. Returns whether anything changed.
    pub(crate) fn refresh(&mut self, announcement: &PublicIdentity, now: i64) -> bool {
        let mut changed = false;
        if self.public_key != announcement.public_key {
            self.public_key = announcement.public_key.clone();
            changed = true;
        }
        if self.profile != announcement.profile {
            self.profile = announcement.profile.clone();
            changed = true;
        }
        if self.capabilities != announcement.capabilities {
            self.capabilities = announcement.capabilities.clone();
            changed = true;
        }
        if changed {
            self.last_updated = now;
        }
        changed
    }

    /// Append an endorsement unless the same one is already present
    pub(crate) fn add_endorsement(&mut self, endorsement: Endorsement, now: i64) -> bool {
        if self.signatures.contains(&endorsement) {
            return false;
        }
        self.signatures.push(endorsement);
        self.last_updated = now;
        true
    }

    /// Endorsements made by a given peer
    pub fn endorsements_by<'a>(&'a self, peer_id: &'a str) -> impl Iterator<Item = &'a Endorsement> + 'a {
        self.signatures.iter().filter(move |e| e.signed_by == peer_id)
    }

    /// Verified by code, video or in person (not merely via a chain)
    pub fn is_directly_verified(&self) -> bool {
        self.verified && self.verified_method.is_direct()
    }

    /// Re-derive identifiers from the cached key and check them, then check
    /// that every endorsement carries a well-formed signature
    pub fn validate(&self) -> Result<(), TrustError> {
        let der = keys::public_key_bytes(&self.public_key)?;
        let derived = DerivedIds::from_public_key(&der);
        check_derived(&derived, &self.peer_id, &self.fingerprint, &self.key_id)?;

        for endorsement in &self.signatures {
            keys::parse_signature(&endorsement.signature)?;
        }
        Ok(())
    }

    /// The peer's identity as last announced, suitable for introductions
    pub fn public_view(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.peer_id.clone(),
            public_key: self.public_key.clone(),
            fingerprint: self.fingerprint.clone(),
            key_id: self.key_id.clone(),
            created: self.first_seen,
            profile: self.profile.clone(),
            capabilities: self.capabilities.clone(),
            version: IDENTITY_FORMAT_VERSION.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}
