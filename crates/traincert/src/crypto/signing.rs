//! Ed25519 signing and verification.
//!
//! Ed25519 signatures are deterministic, so a holder of the signing key can
//! re-sign a stored payload and compare the result with the stored signature.
//! That comparison is done in constant time.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use subtle::ConstantTimeEq;

use crate::error::{Result, TrainError};

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

/// Verify an Ed25519 signature against a public key and message.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| TrainError::SignatureInvalid)
}

/// Sign a message and return the signature as a base64-encoded string.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> String {
    let sig = sign(signing_key, message);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sig.to_bytes())
}

/// Decode a base64 signature into its 64 raw bytes.
pub fn decode_signature(signature_b64: &str) -> Result<[u8; 64]> {
    let sig_bytes =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_b64)
            .map_err(|e| TrainError::InvalidKey(format!("invalid base64 signature: {e}")))?;

    sig_bytes
        .try_into()
        .map_err(|_| TrainError::InvalidKey("signature must be 64 bytes".into()))
}

/// Verify a base64-encoded signature with the public key only.
pub fn verify_from_base64(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature_b64: &str,
) -> Result<()> {
    let sig_array = decode_signature(signature_b64)?;
    let signature = Signature::from_bytes(&sig_array);
    verify(verifying_key, message, &signature)
}

/// Re-sign `message` and compare against the stored base64 signature in
/// constant time. Malformed stored signatures compare unequal.
pub fn resign_matches(signing_key: &SigningKey, message: &[u8], stored_b64: &str) -> bool {
    let Ok(stored) = decode_signature(stored_b64) else {
        return false;
    };
    let recomputed = sign(signing_key, message).to_bytes();
    bool::from(recomputed.ct_eq(&stored))
}
