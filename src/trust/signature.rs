// trust/signature.rs - Trust Levels, Endorsements and Introductions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::TrustError;
use super::identity::{verify_with_key, Identity, PublicIdentity};
use super::keys;
use super::now_millis;

/// Local, subjective trust classification of a peer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// No trust relationship yet
    #[default]
    Unknown = 0,

    /// Explicitly marked as untrustworthy
    Untrusted = 1,

    /// Limited trust (e.g., introduced by a trusted peer)
    Marginal = 2,

    /// Fully trusted, only reachable by local verification
    Full = 3,
}

impl TrustLevel {
    /// Check if endorsements by a peer at this level can start a chain
    pub fn can_introduce(&self) -> bool {
        matches!(self, TrustLevel::Full)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Unknown => "unknown",
            TrustLevel::Untrusted => "untrusted",
            TrustLevel::Marginal => "marginal",
            TrustLevel::Full => "full",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(TrustLevel::Unknown),
            "untrusted" => Ok(TrustLevel::Untrusted),
            "marginal" => Ok(TrustLevel::Marginal),
            "full" => Ok(TrustLevel::Full),
            other => Err(TrustError::InvalidFormat(format!("unknown trust level `{other}`"))),
        }
    }
}

/// How a peer's key was verified
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMethod {
    #[default]
    None,

    /// Compared a short code / fingerprint out of band
    Code,

    Video,

    InPerson,

    /// Accepted through a verified introduction chain
    Chain,
}

impl VerificationMethod {
    /// Methods that count as a direct, local verification
    pub fn is_direct(&self) -> bool {
        matches!(
            self,
            VerificationMethod::Code | VerificationMethod::Video | VerificationMethod::InPerson
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::None => "none",
            VerificationMethod::Code => "code",
            VerificationMethod::Video => "video",
            VerificationMethod::InPerson => "in-person",
            VerificationMethod::Chain => "chain",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethod {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(VerificationMethod::None),
            "code" => Ok(VerificationMethod::Code),
            "video" => Ok(VerificationMethod::Video),
            "in-person" | "in_person" | "inperson" => Ok(VerificationMethod::InPerson),
            "chain" => Ok(VerificationMethod::Chain),
            other => Err(TrustError::InvalidFormat(format!(
                "unknown verification method `{other}`"
            ))),
        }
    }
}

/// The statement an endorser signs: "this key belongs to this peer"
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndorsementStatement<'a> {
    kind: &'static str,
    subject: &'a str,
    public_key: &'a str,
    signed_by: &'a str,
    timestamp: i64,
}

const ENDORSEMENT_KIND: &str = "key-endorsement";

/// A signed attestation by one peer over another peer's public key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endorsement {
    /// Peer id of the endorser
    pub signed_by: String,

    /// Base64 Ed25519 signature over the endorsement statement
    pub signature: String,

    pub timestamp: i64,
}

impl Endorsement {
    /// Endorse a subject's key with an owned identity
    pub fn create(endorser: &Identity, subject: &PublicIdentity) -> Result<Self, TrustError> {
        let timestamp = now_millis();
        let statement = EndorsementStatement {
            kind: ENDORSEMENT_KIND,
            subject: &subject.id,
            public_key: &subject.public_key,
            signed_by: endorser.id(),
            timestamp,
        };

        Ok(Self {
            signed_by: endorser.id().to_string(),
            signature: endorser.sign(&statement)?,
            timestamp,
        })
    }

    /// Verify against the endorser's exported public key and the subject's key.
    ///
    /// A mismatched signature is `Ok(false)`; malformed key or signature
    /// encodings are errors.
    pub fn verify(
        &self,
        endorser_public_key: &str,
        subject_id: &str,
        subject_public_key: &str,
    ) -> Result<bool, TrustError> {
        let key = keys::import_public(endorser_public_key)?;
        let statement = EndorsementStatement {
            kind: ENDORSEMENT_KIND,
            subject: subject_id,
            public_key: subject_public_key,
            signed_by: &self.signed_by,
            timestamp: self.timestamp,
        };
        verify_with_key(&key, &statement, &self.signature)
    }
}

/// A trusted peer vouching for a third party
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Introduction {
    pub introducee: PublicIdentity,
    pub endorsement: Endorsement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::identity::Profile;

    fn identity(name: &str) -> Identity {
        Identity::generate(Profile::named(name)).unwrap()
    }

    #[test]
    fn test_endorsement_verifies() {
        let alice = identity("alice");
        let bob = identity("bob");

        let sig = Endorsement::create(&alice, &bob.public_view()).unwrap();
        assert_eq!(sig.signed_by, alice.id());
        assert!(sig.verify(alice.public_key(), bob.id(), bob.public_key()).unwrap());
    }

    #[test]
    fn test_endorsement_bound_to_subject_and_signer() {
        let alice = identity("alice");
        let bob = identity("bob");
        let carol = identity("carol");

        let sig = Endorsement::create(&alice, &bob.public_view()).unwrap();

        // Wrong subject key
        assert!(!sig.verify(alice.public_key(), bob.id(), carol.public_key()).unwrap());
        // Wrong endorser key
        assert!(!sig.verify(carol.public_key(), bob.id(), bob.public_key()).unwrap());

        // Forged signer attribution
        let mut forged = sig.clone();
        forged.signed_by = carol.id().to_string();
        assert!(!forged.verify(alice.public_key(), bob.id(), bob.public_key()).unwrap());
    }

    #[test]
    fn test_remote_identity_cannot_endorse() {
        let alice = Identity::from_public(&identity("alice").public_view()).unwrap();
        let bob = identity("bob");
        assert!(matches!(
            Endorsement::create(&alice, &bob.public_view()),
            Err(TrustError::NoPrivateKey(_))
        ));
    }

    #[test]
    fn test_trust_level_wire_names() {
        assert_eq!(serde_json::to_string(&TrustLevel::Marginal).unwrap(), "\"marginal\"");
        assert_eq!("FULL".parse::<TrustLevel>().unwrap(), TrustLevel::Full);
        assert!("ultimate".parse::<TrustLevel>().is_err());
        assert_eq!(TrustLevel::default(), TrustLevel::Unknown);
        assert!(TrustLevel::Full.can_introduce());
        assert!(!TrustLevel::Marginal.can_introduce());
    }

    #[test]
    fn test_verification_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&VerificationMethod::InPerson).unwrap(),
            "\"in-person\""
        );
        assert_eq!(
            "in-person".parse::<VerificationMethod>().unwrap(),
            VerificationMethod::InPerson
        );
        assert!(VerificationMethod::Video.is_direct());
        assert!(!VerificationMethod::Chain.is_direct());
    }
}
