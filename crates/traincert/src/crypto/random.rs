//! Secure random values: salts, nonces, row identifiers, verification codes.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::{Rng, RngCore};

/// Alphabet for public verification codes (36 symbols).
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shortest verification code accepted by configuration.
pub const MIN_CODE_LEN: usize = 12;

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    fill_random(&mut buf);
    buf
}

/// Generate a random 12-byte nonce (for ChaCha20-Poly1305).
pub fn random_nonce_12() -> [u8; 12] {
    random_bytes()
}

/// Generate a random 16-byte salt.
pub fn random_salt_16() -> [u8; 16] {
    random_bytes()
}

/// New opaque row identifier: `{prefix}_` + base58 of 16 random bytes.
pub fn new_id(prefix: &str) -> String {
    let bytes: [u8; 16] = random_bytes();
    format!("{prefix}_{}", bs58::encode(bytes).into_string())
}

/// New verification code of `len` symbols drawn uniformly from
/// [`CODE_ALPHABET`]. `gen_range` rejects biased samples, so every symbol
/// is equally likely.
pub fn verification_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
