//! Key derivation using HKDF-SHA256.
//!
//! The passphrase master key is never used directly; purpose-specific keys
//! are expanded from it with a context string.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Result, TrainError};

/// Context for the key that seals the issuer signing key at rest.
/// Must remain stable across versions.
pub const ISSUER_KEY_SEALING_CONTEXT: &str = "traincert/issuer-key/sealing";

/// Derive a 32-byte child key from a root key and context string.
///
/// Uses HKDF-SHA256 (RFC 5869) with the root key as IKM and
/// the context as info.
pub fn derive_key(root_key_bytes: &[u8; 32], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, root_key_bytes);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| TrainError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}
