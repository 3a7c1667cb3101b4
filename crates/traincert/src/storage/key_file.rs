//! `issuer.key` file format: encrypted storage of the certificate issuer key.
//!
//! The signing key is encrypted with ChaCha20-Poly1305 under a key derived
//! from an operator passphrase via Argon2id then HKDF-SHA256. The public key
//! and key id are stored in plaintext so verifiers can read them without the
//! passphrase.
//!
//! File format (JSON):
//! ```json
//! {
//!     "version": 1,
//!     "format": "traincert-issuer-v1",
//!     "key_id": "ikey_...",
//!     "public_key": "<base64-32-bytes>",
//!     "created_at": "2026-01-01T00:00:00Z",
//!     "salt": "<base64-16-bytes>",
//!     "nonce": "<base64-12-bytes>",
//!     "sealed_key": "<base64-ciphertext>"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::derivation::{self, ISSUER_KEY_SEALING_CONTEXT};
use crate::crypto::keys::IssuerKey;
use crate::crypto::{encryption, random};
use crate::error::{Result, TrainError};

/// Default key file name inside the data directory.
pub const KEY_FILE: &str = "issuer.key";

const KEY_FILE_VERSION: u32 = 1;
const KEY_FILE_FORMAT: &str = "traincert-issuer-v1";

/// Structure written to disk as `issuer.key`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssuerKeyFile {
    pub version: u32,
    pub format: String,
    pub key_id: String,
    pub public_key: String,
    pub created_at: String,
    pub salt: String,
    pub nonce: String,
    pub sealed_key: String,
}

fn b64(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

fn unb64(field: &str, s: &str) -> Result<Vec<u8>> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, s)
        .map_err(|e| TrainError::InvalidFileFormat(format!("invalid {field} base64: {e}")))
}

/// Derive the sealing key for a passphrase and salt.
fn sealing_key(passphrase: &str, salt: &[u8; 16]) -> Result<[u8; 32]> {
    let mut master = encryption::derive_passphrase_key(passphrase.as_bytes(), salt)?;
    let key = derivation::derive_key(&master, ISSUER_KEY_SEALING_CONTEXT);
    master.zeroize();
    key
}

/// Save the issuer key, encrypting the signing key with `passphrase`.
///
/// Written via temp-file-then-rename so readers never see a partial file.
pub fn save_issuer_key(
    key: &IssuerKey,
    path: &Path,
    passphrase: &str,
    created_at: &str,
) -> Result<()> {
    if passphrase.is_empty() {
        return Err(TrainError::InvalidInput("passphrase must not be empty".into()));
    }

    let salt = random::random_salt_16();
    let mut seal = sealing_key(passphrase, &salt)?;
    let mut secret = key.signing_key_bytes();
    let sealed = encryption::encrypt(&seal, &secret);
    secret.zeroize();
    seal.zeroize();
    let (nonce, ciphertext) = sealed?;

    let file = IssuerKeyFile {
        version: KEY_FILE_VERSION,
        format: KEY_FILE_FORMAT.to_string(),
        key_id: key.key_id(),
        public_key: key.public_key_base64(),
        created_at: created_at.to_string(),
        salt: b64(&salt),
        nonce: b64(&nonce),
        sealed_key: b64(&ciphertext),
    };

    let json = serde_json::to_string_pretty(&file)?;
    write_atomic(path, json.as_bytes())?;
    log::info!("saved issuer key {} to {}", file.key_id, path.display());
    Ok(())
}

/// Load and decrypt the issuer key.
///
/// Returns `InvalidPassphrase` when the passphrase is wrong, and
/// `InvalidFileFormat` when the decrypted key does not match the stored
/// public key.
pub fn load_issuer_key(path: &Path, passphrase: &str) -> Result<IssuerKey> {
    let file = read_key_file(path)?;

    let salt: [u8; 16] = unb64("salt", &file.salt)?
        .try_into()
        .map_err(|_| TrainError::InvalidFileFormat("salt must be 16 bytes".into()))?;
    let nonce = unb64("nonce", &file.nonce)?;
    let ciphertext = unb64("sealed_key", &file.sealed_key)?;

    let mut seal = sealing_key(passphrase, &salt)?;
    let plaintext = encryption::decrypt(&seal, &nonce, &ciphertext);
    seal.zeroize();
    let mut plaintext = plaintext?;

    let bytes: std::result::Result<[u8; 32], _> = plaintext.as_slice().try_into();
    let key = match bytes {
        Ok(mut secret) => {
            let key = IssuerKey::from_signing_key_bytes(&secret);
            secret.zeroize();
            key
        }
        Err(_) => {
            plaintext.zeroize();
            return Err(TrainError::InvalidKey("issuer key must be 32 bytes".into()));
        }
    };
    plaintext.zeroize();

    if key.public_key_base64() != file.public_key {
        return Err(TrainError::InvalidFileFormat(
            "issuer key does not match stored public key".into(),
        ));
    }
    Ok(key)
}

/// Read only the public key and key id; no passphrase needed.
pub fn read_public_key(path: &Path) -> Result<(String, String)> {
    let file = read_key_file(path)?;
    Ok((file.key_id, file.public_key))
}

fn read_key_file(path: &Path) -> Result<IssuerKeyFile> {
    if !path.exists() {
        return Err(TrainError::NotFound(format!(
            "issuer key file not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    let file: IssuerKeyFile = serde_json::from_slice(&bytes)
        .map_err(|e| TrainError::InvalidFileFormat(format!("failed to parse key file: {e}")))?;
    if file.version != KEY_FILE_VERSION || file.format != KEY_FILE_FORMAT {
        return Err(TrainError::InvalidFileFormat(format!(
            "unsupported key file version={} format={}",
            file.version, file.format
        )));
    }
    Ok(file)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
