//! Partitioned scratch arena for in-place re-encryption
//!
//! The change-PIN path needs two working regions at once: one for freshly
//! derived key material and one for the payload decrypted under the old key.
//! If the two ever aliased, deriving the new key would stomp the plaintext
//! before it is re-encrypted. The arena keeps the regions as separate fields
//! and hands both out through one split borrow, so an overlap cannot be
//! expressed at all.

use crate::record::PAYLOAD_SIZE;

/// Digest/key region size (one SHA-256 output)
pub const DIGEST_LEN: usize = 32;

/// Transient working memory for the applet
pub struct Scratch {
    digest: [u8; DIGEST_LEN],
    payload: [u8; PAYLOAD_SIZE],
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            digest: [0u8; DIGEST_LEN],
            payload: [0u8; PAYLOAD_SIZE],
        }
    }

    /// Borrow both regions at once: (digest/key area, payload area)
    pub fn parts(&mut self) -> (&mut [u8; DIGEST_LEN], &mut [u8; PAYLOAD_SIZE]) {
        (&mut self.digest, &mut self.payload)
    }

    /// Zero everything; called after any command that left plaintext or key
    /// material behind
    pub fn wipe(&mut self) {
        self.digest = [0u8; DIGEST_LEN];
        self.payload = [0u8; PAYLOAD_SIZE];
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}
