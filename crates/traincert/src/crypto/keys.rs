//! The certificate issuer key.
//!
//! A single Ed25519 key pair is held by the server. The public half is
//! published so certificates can also be checked offline.

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{Result, TrainError};

/// Server-held Ed25519 key used to sign certificate payloads.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct IssuerKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl IssuerKey {
    /// Generate a new random issuer key.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct from raw signing key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Parse a base64 public key, as stored in the key file or published
    /// alongside certificates.
    pub fn verifying_key_from_base64(b64: &str) -> Result<VerifyingKey> {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, b64)
            .map_err(|e| TrainError::InvalidKey(format!("invalid base64 public key: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TrainError::InvalidKey("public key must be 32 bytes".into()))?;
        VerifyingKey::from_bytes(&array)
            .map_err(|e| TrainError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the signing key bytes. Caller must zeroize after use.
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Public key, base64 encoded.
    pub fn public_key_base64(&self) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            self.verifying_key.to_bytes(),
        )
    }

    /// Short stable identifier for the key: `ikey_` + base58 of the first
    /// 8 bytes of SHA-256(public key).
    pub fn key_id(&self) -> String {
        let hash = Sha256::digest(self.verifying_key.as_bytes());
        format!("ikey_{}", bs58::encode(&hash[..8]).into_string())
    }
}

impl Drop for IssuerKey {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

impl std::fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKey")
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_keys() {
        let a = IssuerKey::generate();
        let b = IssuerKey::generate();
        assert_ne!(a.public_key_base64(), b.public_key_base64());
        assert_ne!(a.key_id(), b.key_id());
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let key = IssuerKey::generate();
        let restored = IssuerKey::from_signing_key_bytes(&key.signing_key_bytes());
        assert_eq!(key.public_key_base64(), restored.public_key_base64());
        assert!(key.key_id().starts_with("ikey_"));
    }

    #[test]
    fn test_public_key_parse() {
        let key = IssuerKey::generate();
        let vk = IssuerKey::verifying_key_from_base64(&key.public_key_base64()).unwrap();
        assert_eq!(&vk, key.verifying_key());
        assert!(IssuerKey::verifying_key_from_base64("AAAA").is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = IssuerKey::generate();
        let dbg = format!("{key:?}");
        assert!(dbg.contains("ikey_"));
        assert!(!dbg.contains("signing_key"));
    }
}
