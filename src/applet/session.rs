//! Transient session security state
//!
//! Holds the Verified flag and the PIN-derived AES key for the current
//! session. Never persisted; cleared on deselect, on any failed PIN attempt,
//! and after every WRITE.

use crate::crypto::kdf::KEY_SIZE;

/// Per-session security state
pub struct Session {
    verified: bool,
    key: Option<[u8; KEY_SIZE]>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            verified: false,
            key: None,
        }
    }

    /// Mark the session verified and remember the active payload key
    pub fn verify_with(&mut self, key: [u8; KEY_SIZE]) {
        self.verified = true;
        self.key = Some(key);
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// The active payload key, present only while verified
    pub fn active_key(&self) -> Option<&[u8; KEY_SIZE]> {
        self.key.as_ref()
    }

    /// Drop the Verified flag and the key material
    pub fn clear(&mut self) {
        self.verified = false;
        self.key = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
