// trust/fingerprint.rs - Fingerprint and Id Derivation

//! Pure derivations from exported public key bytes.
//!
//! All three forms hash the same bytes with SHA-256:
//!
//! - fingerprint: `ab:cd:...` (32 groups, or 8 in short form)
//! - key id: last 8 hex characters, uppercased (`9F3A0C1E`)
//! - peer id: `peer-` plus the first 8 hex characters (`peer-ab12cd34`)
//!
//! The key id and peer id are 32-bit labels for humans. They are not unique;
//! the full fingerprint is the authoritative identifier.

use sha2::{Digest, Sha256};

/// Number of byte groups in the short fingerprint form
pub const SHORT_FINGERPRINT_GROUPS: usize = 8;

/// Prefix of every derived peer id
pub const PEER_ID_PREFIX: &str = "peer-";

fn digest_hex(public_key: &[u8]) -> String {
    hex::encode(Sha256::digest(public_key))
}

/// Colon-separated lowercase hex of the SHA-256 of the public key
pub fn fingerprint(public_key: &[u8], short: bool) -> String {
    let hash = Sha256::digest(public_key);
    let groups = if short {
        &hash[..SHORT_FINGERPRINT_GROUPS]
    } else {
        &hash[..]
    };

    groups
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Last 8 hex characters of the hash, uppercased
pub fn key_id(public_key: &[u8]) -> String {
    let hex = digest_hex(public_key);
    hex[hex.len() - 8..].to_uppercase()
}

/// `peer-` followed by the first 8 lowercase hex characters of the hash
pub fn peer_id(public_key: &[u8]) -> String {
    let hex = digest_hex(public_key);
    format!("{PEER_ID_PREFIX}{}", &hex[..8])
}

/// The full derived id set for a public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedIds {
    pub peer_id: String,
    pub fingerprint: String,
    pub key_id: String,
}

impl DerivedIds {
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self {
            peer_id: peer_id(public_key),
            fingerprint: fingerprint(public_key, false),
            key_id: key_id(public_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vector() {
        // SHA-256("abc") = ba7816bf 8f01cfea 414140de 5dae2223 b00361a3 96177a9c b410ff61 f20015ad
        assert_eq!(
            fingerprint(b"abc", true),
            "ba:78:16:bf:8f:01:cf:ea"
        );
        assert_eq!(key_id(b"abc"), "F20015AD");
        assert_eq!(peer_id(b"abc"), "peer-ba7816bf");
    }

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint(b"some key", false);
        assert_eq!(fp.split(':').count(), 32);
        assert_eq!(fp.len(), 32 * 2 + 31);
        assert_eq!(fp, fp.to_lowercase());

        let short = fingerprint(b"some key", true);
        assert_eq!(short.split(':').count(), 8);
        assert!(fp.starts_with(&short));
    }

    #[test]
    fn test_key_id_differs_from_fingerprint_prefix() {
        let ids = DerivedIds::from_public_key(b"some key");
        let prefix: String = ids.fingerprint.replace(':', "")[..8].to_uppercase();
        assert_ne!(ids.key_id, prefix);
        assert!(ids.peer_id.starts_with(PEER_ID_PREFIX));
        assert_eq!(ids.peer_id.len(), PEER_ID_PREFIX.len() + 8);
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 1..128)) {
            prop_assert_eq!(DerivedIds::from_public_key(&bytes), DerivedIds::from_public_key(&bytes));
        }

        #[test]
        fn prop_distinct_inputs_distinct_fingerprints(
            a in proptest::collection::vec(any::<u8>(), 1..64),
            b in proptest::collection::vec(any::<u8>(), 1..64),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(fingerprint(&a, false), fingerprint(&b, false));
        }
    }
}
