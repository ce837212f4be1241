// trust/keys.rs - Ed25519 Key Material

//! Keypair generation, import/export, and raw signing.
//!
//! Public keys travel as base64 of their SPKI DER encoding and private keys
//! as base64 of PKCS#8 DER. Fingerprints and ids are derived from the
//! decoded SPKI bytes (see [`super::fingerprint`]).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{
    Signature, Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::fmt;

use super::error::TrustError;

/// An owned Ed25519 signing keypair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new keypair from the operating system RNG
    pub fn generate() -> Result<Self, TrustError> {
        let mut secret_bytes = [0u8; SECRET_KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut secret_bytes)
            .map_err(|e| TrustError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret_bytes),
        })
    }

    /// Reconstruct a keypair from base64 PKCS#8 text
    pub fn import_private(encoded: &str) -> Result<Self, TrustError> {
        let der = decode_base64(encoded, "private key")?;
        let signing_key = SigningKey::from_pkcs8_der(&der)
            .map_err(|e| TrustError::KeyFormat(format!("private key: {e}")))?;
        Ok(Self { signing_key })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Base64 PKCS#8 encoding of the private key
    pub fn export_private(&self) -> Result<String, TrustError> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| TrustError::KeyFormat(format!("private key: {e}")))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    /// Base64 SPKI encoding of the public key
    pub fn export_public(&self) -> Result<String, TrustError> {
        export_public(&self.verifying_key())
    }

    /// Sign raw bytes
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(data).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Base64 SPKI encoding of a public key
pub fn export_public(key: &VerifyingKey) -> Result<String, TrustError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| TrustError::KeyFormat(format!("public key: {e}")))?;
    Ok(BASE64.encode(der.as_bytes()))
}

/// Reconstruct a public key from base64 SPKI text
pub fn import_public(encoded: &str) -> Result<VerifyingKey, TrustError> {
    let der = decode_base64(encoded, "public key")?;
    VerifyingKey::from_public_key_der(&der)
        .map_err(|e| TrustError::KeyFormat(format!("public key: {e}")))
}

/// Decode exported public key text into the DER bytes that ids are hashed over
pub fn public_key_bytes(encoded: &str) -> Result<Vec<u8>, TrustError> {
    let der = decode_base64(encoded, "public key")?;
    // Parse once so garbage never reaches the fingerprint functions
    VerifyingKey::from_public_key_der(&der)
        .map_err(|e| TrustError::KeyFormat(format!("public key: {e}")))?;
    Ok(der)
}

/// Verify a raw signature.
///
/// Returns `Ok(false)` when the signature does not match and `KeyFormat` when
/// the signature bytes are not a well-formed Ed25519 signature.
pub fn verify(key: &VerifyingKey, data: &[u8], signature: &[u8]) -> Result<bool, TrustError> {
    let sig = Signature::from_bytes(&signature_array(signature)?);
    Ok(key.verify_strict(data, &sig).is_ok())
}

/// Base64 text form of a signature
pub fn encode_signature(signature: &[u8]) -> String {
    BASE64.encode(signature)
}

/// Decode base64 signature text
pub fn decode_signature(encoded: &str) -> Result<Vec<u8>, TrustError> {
    decode_base64(encoded, "signature")
}

/// Decode base64 signature text and check it is exactly one Ed25519 signature
pub fn parse_signature(encoded: &str) -> Result<[u8; SIGNATURE_LENGTH], TrustError> {
    let bytes = decode_signature(encoded)?;
    signature_array(&bytes)
}

fn signature_array(bytes: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], TrustError> {
    bytes.try_into().map_err(|_| {
        TrustError::KeyFormat(format!(
            "signature: expected {SIGNATURE_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })
}

fn decode_base64(encoded: &str, what: &str) -> Result<Vec<u8>, TrustError> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| TrustError::KeyFormat(format!("{what}: invalid base64: {e}")))
}
