// trust/identity.rs - Participant Identity with Ed25519 Keys

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use super::bundle::{self, IDENTITY_EXPORT_MARKER, IDENTITY_FIELD};
use super::canonical::canonical_bytes;
use super::error::TrustError;
use super::fingerprint::{self, DerivedIds, SHORT_FINGERPRINT_GROUPS};
use super::keys::{self, KeyPair};
use super::now_millis;

/// Serialized identity format version
pub const IDENTITY_FORMAT_VERSION: &str = "1.0";

/// Wire-compatibility marker announced to peers
pub const PROTOCOL_VERSION: &str = "1";

/// Capabilities declared by a freshly generated identity
pub const DEFAULT_CAPABILITIES: &[&str] = &["signing", "introductions"];

/// Display name used when the profile seed leaves the name empty
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Display metadata attached to an identity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Avatar reference (URL or data URI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl Profile {
    /// Profile with only a display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Typed profile update; only these fields are mutable.
///
/// `None` leaves a field untouched. For optional fields `Some(None)` clears
/// the value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub bio: Option<Option<String>>,
}

impl ProfilePatch {
    /// Apply to a profile, returning whether anything changed
    pub fn apply(&self, profile: &mut Profile) -> bool {
        let before = profile.clone();
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(bio) = &self.bio {
            profile.bio = bio.clone();
        }
        *profile != before
    }
}

/// Public identity that can cross the network boundary.
///
/// This is both what the local participant announces and what remote peers
/// announce to us.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    pub id: String,
    pub public_key: String,
    pub fingerprint: String,
    pub key_id: String,

    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub profile: Profile,

    #[serde(default)]
    pub capabilities: BTreeSet<String>,

    #[serde(default = "default_format_version")]
    pub version: String,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

/// Public identity info as delivered by the transport layer
pub type PeerAnnouncement = PublicIdentity;

fn default_format_version() -> String {
    IDENTITY_FORMAT_VERSION.to_string()
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl PublicIdentity {
    /// Decode the key and check every announced identifier against it
    pub fn validate(&self) -> Result<(VerifyingKey, DerivedIds), TrustError> {
        let verifying_key = keys::import_public(&self.public_key)?;
        let der = keys::public_key_bytes(&self.public_key)?;
        let derived = DerivedIds::from_public_key(&der);
        check_derived(&derived, &self.id, &self.fingerprint, &self.key_id)?;
        Ok((verifying_key, derived))
    }

    /// Verify a payload signature made by this identity
    pub fn verify<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        signature: &str,
    ) -> Result<bool, TrustError> {
        verify_payload(&self.public_key, payload, signature)
    }
}

/// Verify a payload signature against an exported public key
pub fn verify_payload<T: Serialize + ?Sized>(
    public_key: &str,
    payload: &T,
    signature: &str,
) -> Result<bool, TrustError> {
    let key = keys::import_public(public_key)?;
    verify_with_key(&key, payload, signature)
}

pub(crate) fn check_derived(
    derived: &DerivedIds,
    id: &str,
    fingerprint: &str,
    key_id: &str,
) -> Result<(), TrustError> {
    let checks = [
        ("id", id, &derived.peer_id),
        ("fingerprint", fingerprint, &derived.fingerprint),
        ("keyId", key_id, &derived.key_id),
    ];
    for (field, claimed, derived) in checks {
        if claimed != derived.as_str() {
            return Err(TrustError::IdentityMismatch {
                field,
                claimed: claimed.to_string(),
                derived: derived.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn verify_with_key<T: Serialize + ?Sized>(
    key: &VerifyingKey,
    payload: &T,
    signature: &str,
) -> Result<bool, TrustError> {
    let sig = keys::parse_signature(signature)?;
    let data = canonical_bytes(payload)?;
    keys::verify(key, &data, &sig)
}

/// A participant identity: keypair plus profile and capabilities.
///
/// An identity holding a private key is "own" and can sign. Identities built
/// from a peer's public view never carry private key material. The id,
/// fingerprint and key id are derived from the public key and are re-checked
/// whenever an identity is deserialized.
#[derive(Clone, Deserialize)]
#[serde(try_from = "IdentityRecord")]
pub struct Identity {
    keys: Option<KeyPair>,
    verifying_key: VerifyingKey,
    public_key: String,
    ids: DerivedIds,
    created: i64,
    profile: Profile,
    capabilities: BTreeSet<String>,
    version: String,
    protocol_version: String,
}

impl Identity {
    /// Generate a new signing-capable identity
    pub fn generate(mut profile: Profile) -> Result<Self, TrustError> {
        if profile.name.trim().is_empty() {
            profile.name = DEFAULT_DISPLAY_NAME.to_string();
        }

        let keys = KeyPair::generate()?;
        let capabilities = DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect();
        Self::from_keypair(keys, profile, capabilities, now_millis())
    }

    fn from_keypair(
        keys: KeyPair,
        profile: Profile,
        capabilities: BTreeSet<String>,
        created: i64,
    ) -> Result<Self, TrustError> {
        let public_key = keys.export_public()?;
        let der = keys::public_key_bytes(&public_key)?;

        Ok(Self {
            verifying_key: keys.verifying_key(),
            keys: Some(keys),
            public_key,
            ids: DerivedIds::from_public_key(&der),
            created,
            profile,
            capabilities,
            version: IDENTITY_FORMAT_VERSION.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        })
    }

    /// Build a verify-only identity from a peer's public view
    pub fn from_public(view: &PublicIdentity) -> Result<Self, TrustError> {
        let (verifying_key, ids) = view.validate()?;
        Ok(Self {
            keys: None,
            verifying_key,
            public_key: view.public_key.clone(),
            ids,
            created: view.created,
            profile: view.profile.clone(),
            capabilities: view.capabilities.clone(),
            version: view.version.clone(),
            protocol_version: view.protocol_version.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.ids.peer_id
    }

    /// Base64 SPKI public key
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn fingerprint(&self) -> &str {
        &self.ids.fingerprint
    }

    /// First eight fingerprint groups
    pub fn short_fingerprint(&self) -> String {
        self.ids
            .fingerprint
            .split(':')
            .take(SHORT_FINGERPRINT_GROUPS)
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn key_id(&self) -> &str {
        &self.ids.key_id
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Whether this identity holds a private key
    pub fn is_own(&self) -> bool {
        self.keys.is_some()
    }

    fn signing_keys(&self) -> Result<&KeyPair, TrustError> {
        self.keys
            .as_ref()
            .ok_or_else(|| TrustError::NoPrivateKey(self.id().to_string()))
    }

    /// Sign the canonical encoding of a payload, returning base64 text
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, TrustError> {
        let keys = self.signing_keys()?;
        let data = canonical_bytes(payload)?;
        Ok(keys::encode_signature(&keys.sign(&data)))
    }

    /// Verify a payload signature against this identity's public key
    pub fn verify<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        signature: &str,
    ) -> Result<bool, TrustError> {
        verify_with_key(&self.verifying_key, payload, signature)
    }

    /// Apply a profile patch; only valid on an owned identity
    pub fn update_profile(&mut self, patch: &ProfilePatch) -> Result<bool, TrustError> {
        self.signing_keys()?;
        Ok(patch.apply(&mut self.profile))
    }

    /// Replace the declared capability set; only valid on an owned identity
    pub fn set_capabilities<I, S>(&mut self, capabilities: I) -> Result<(), TrustError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signing_keys()?;
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// Copy with private material stripped
    pub fn public_view(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.ids.peer_id.clone(),
            public_key: self.public_key.clone(),
            fingerprint: self.ids.fingerprint.clone(),
            key_id: self.ids.key_id.clone(),
            created: self.created,
            profile: self.profile.clone(),
            capabilities: self.capabilities.clone(),
            version: self.version.clone(),
            protocol_version: self.protocol_version.clone(),
        }
    }

    /// Full identity, private key included, in the versioned backup envelope
    pub fn export_bundle(&self) -> Result<String, TrustError> {
        bundle::wrap(IDENTITY_EXPORT_MARKER, IDENTITY_FIELD, &IdentityRecord::from_identity(self)?)
    }

    /// Restore an identity from a backup envelope
    pub fn import_bundle(text: &str) -> Result<Self, TrustError> {
        let record: IdentityRecord = bundle::unwrap(text, IDENTITY_EXPORT_MARKER, IDENTITY_FIELD)?;
        Self::try_from(record)
    }

    /// Decode a serialized identity, keeping the typed validation error
    pub fn from_json(bytes: &[u8]) -> Result<Self, TrustError> {
        let record: IdentityRecord = serde_json::from_slice(bytes)?;
        Self::try_from(record)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.ids.peer_id)
            .field("fingerprint", &self.short_fingerprint())
            .field("name", &self.profile.name)
            .field("own", &self.is_own())
            .finish()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
            && self.is_own() == other.is_own()
            && self.created == other.created
            && self.profile == other.profile
            && self.capabilities == other.capabilities
            && self.version == other.version
            && self.protocol_version == other.protocol_version
    }
}

/// Serialized identity layout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRecord {
    id: String,
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    fingerprint: String,
    key_id: String,
    created: i64,
    #[serde(default)]
    profile: Profile,
    #[serde(default)]
    capabilities: BTreeSet<String>,
    version: String,
    protocol_version: String,
}

impl IdentityRecord {
    /// Serialized form; the PKCS#8 text is produced from the keypair on demand
    fn from_identity(identity: &Identity) -> Result<Self, TrustError> {
        Ok(Self {
            id: identity.ids.peer_id.clone(),
            public_key: identity.public_key.clone(),
            private_key: identity.keys.as_ref().map(KeyPair::export_private).transpose()?,
            fingerprint: identity.ids.fingerprint.clone(),
            key_id: identity.ids.key_id.clone(),
            created: identity.created,
            profile: identity.profile.clone(),
            capabilities: identity.capabilities.clone(),
            version: identity.version.clone(),
            protocol_version: identity.protocol_version.clone(),
        })
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        IdentityRecord::from_identity(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl TryFrom<IdentityRecord> for Identity {
    type Error = TrustError;

    fn try_from(record: IdentityRecord) -> Result<Self, Self::Error> {
        if record.version != IDENTITY_FORMAT_VERSION {
            return Err(TrustError::UnsupportedVersion {
                found: record.version,
                expected: IDENTITY_FORMAT_VERSION.to_string(),
            });
        }

        let verifying_key = keys::import_public(&record.public_key)?;
        let der = keys::public_key_bytes(&record.public_key)?;
        let ids = DerivedIds::from_public_key(&der);
        check_derived(&ids, &record.id, &record.fingerprint, &record.key_id)
            .map_err(|e| TrustError::InvalidFormat(e.to_string()))?;

        let keys = match &record.private_key {
            Some(encoded) => {
                let pair = KeyPair::import_private(encoded)?;
                if pair.verifying_key() != verifying_key {
                    return Err(TrustError::KeyFormat(
                        "private key does not match public key".into(),
                    ));
                }
                Some(pair)
            }
            None => None,
        };

        Ok(Self {
            keys,
            verifying_key,
            public_key: record.public_key,
            ids,
            created: record.created,
            profile: record.profile,
            capabilities: record.capabilities,
            version: record.version,
            protocol_version: record.protocol_version,
        })
    }
}

/// Fingerprint of an exported public key, without building an identity
pub fn fingerprint_of(public_key: &str, short: bool) -> Result<String, TrustError> {
    let der = keys::public_key_bytes(public_key)?;
    Ok(fingerprint::fingerprint(&der, short))
}
