//! Member enrollment and challenge-response authentication
//!
//! The front desk enrolls a card by fetching its public key once and filing
//! it under the member's UserID. Later check-ins authenticate the physical
//! card: the terminal draws a random challenge, the card signs it, and the
//! signature is verified against the key on file. A cloned record on a
//! different card fails because the private key never left the original.
//!
//! The directory persists as JSON with hex-encoded key material.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CardTransport, Terminal, TerminalError};
use crate::crypto::rsa::{self, RsaError, CHALLENGE_LEN, MODULUS_LEN};

/// Enrollment and authentication failures
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("user {0} has no key on file")]
    NotEnrolled(u16),

    #[error(transparent)]
    Transport(#[from] TerminalError),

    #[error("stored key material is not valid hex")]
    InvalidKeyMaterial(#[from] hex::FromHexError),

    #[error(transparent)]
    Crypto(#[from] RsaError),
}

/// One enrolled card's public key, hex-encoded for the JSON file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyEntry {
    pub modulus: String,
    pub exponent: String,
}

/// Persistent UserID -> public key directory
pub struct KeyDirectory {
    directory_file: PathBuf,
    entries: HashMap<u16, KeyEntry>,
}

impl KeyDirectory {
    const DEFAULT_FILE: &'static str = "key_directory.json";

    fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("GYMCARD_KEY_DIR") {
            return PathBuf::from(path).join(Self::DEFAULT_FILE);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".gymcard").join(Self::DEFAULT_FILE);
        }
        PathBuf::from("/var/lib/gymcard").join(Self::DEFAULT_FILE)
    }

    /// Open a directory backed by the given file, or the default location
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            directory_file: path.unwrap_or_else(Self::default_path),
            entries: HashMap::new(),
        }
    }

    /// Load the directory from disk
    ///
    /// Returns true if an existing file was loaded. A missing or unreadable
    /// file yields an empty directory rather than an error.
    pub fn load(&mut self) -> bool {
        if !self.directory_file.exists() {
            info!("No key directory at {:?}, starting empty", self.directory_file);
            return false;
        }
        match fs::read_to_string(&self.directory_file) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => {
                    self.entries = entries;
                    info!("Loaded {} enrolled keys", self.entries.len());
                    true
                }
                Err(e) => {
                    warn!("Failed to parse key directory: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Failed to read key directory: {}", e);
                false
            }
        }
    }

    /// Persist the directory to disk
    pub fn save(&self) -> bool {
        if let Some(parent) = self.directory_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create key directory path: {}", e);
                return false;
            }
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => match fs::write(&self.directory_file, json) {
                Ok(()) => {
                    debug!("Saved key directory to {:?}", self.directory_file);
                    true
                }
                Err(e) => {
                    warn!("Failed to write key directory: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Failed to serialize key directory: {}", e);
                false
            }
        }
    }

    pub fn get(&self, user_id: u16) -> Option<&KeyEntry> {
        self.entries.get(&user_id)
    }

    pub fn remove(&mut self, user_id: u16) -> Option<KeyEntry> {
        self.entries.remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch the card's public key and file it under the user
    pub fn enroll<T: CardTransport>(
        &mut self,
        user_id: u16,
        terminal: &mut Terminal<T>,
    ) -> Result<(), EnrollmentError> {
        let key = terminal.get_public_key()?;
        let entry = KeyEntry {
            modulus: hex::encode(&key[..MODULUS_LEN]),
            exponent: hex::encode(&key[MODULUS_LEN..]),
        };
        info!("Enrolled user {}", user_id);
        self.entries.insert(user_id, entry);
        self.save();
        Ok(())
    }

    /// Challenge-response authentication against the key on file
    ///
    /// Ok(false) means the card answered but the signature did not verify:
    /// a different card, or tampered key material in the directory.
    pub fn authenticate<T: CardTransport>(
        &self,
        user_id: u16,
        terminal: &mut Terminal<T>,
    ) -> Result<bool, EnrollmentError> {
        let entry = self
            .entries
            .get(&user_id)
            .ok_or(EnrollmentError::NotEnrolled(user_id))?;
        let modulus = hex::decode(&entry.modulus)?;
        let exponent = hex::decode(&entry.exponent)?;

        let mut challenge = [0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut challenge);

        let signature = terminal.sign_challenge(&challenge)?;
        let verified = rsa::verify_challenge(&modulus, &exponent, &challenge, &signature)?;
        if verified {
            info!("User {} authenticated", user_id);
        } else {
            warn!("Signature check failed for user {}", user_id);
        }
        Ok(verified)
    }
}
