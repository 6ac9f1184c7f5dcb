//! PIN key derivation and hashing
//!
//! Both the payload key and the stored verification hash come from a single
//! SHA-256 over the 6 ASCII digits of the PIN, truncated to 16 bytes. There
//! is no salt: the PIN is the only secret, so the same PIN always yields the
//! same key and the same stored hash. That determinism is what lets the
//! terminal and the card encrypt independently and agree bit-for-bit; it is
//! an accepted limitation of the protocol, not something to strengthen here.

use sha2::{Digest, Sha256};

use crate::record::PIN_HASH_SIZE;

/// AES-128 key length
pub const KEY_SIZE: usize = 16;

/// Derive the AES-128 payload key from a PIN (6 ASCII digits)
pub fn derive_key(pin: &[u8]) -> [u8; KEY_SIZE] {
    truncated_sha256(pin)
}

/// Hash a PIN for on-card storage (SHA-256 truncated to 16 bytes)
pub fn hash_pin(pin: &[u8]) -> [u8; PIN_HASH_SIZE] {
    truncated_sha256(pin)
}

fn truncated_sha256(input: &[u8]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
