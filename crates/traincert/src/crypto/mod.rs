//! Cryptographic primitives for traincert.
//!
//! This module provides:
//! - The Ed25519 issuer key used to sign certificates
//! - Signing, verification and constant-time signature comparison
//! - HKDF-SHA256 key derivation
//! - Argon2id passphrase-based key derivation and ChaCha20-Poly1305 sealing
//! - Random identifiers and verification codes

pub mod derivation;
pub mod encryption;
pub mod keys;
pub mod random;
pub mod signing;
