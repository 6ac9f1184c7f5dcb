//! RSA Operations
//!
//! Per-card RSA-1024 identity keypair, challenge signing, and terminal-side
//! signature verification using the rsa crate.
//!
//! Signatures are PKCS#1 v1.5 over a SHA-1 DigestInfo of the 32-byte
//! challenge, matching the card protocol. The private key never leaves
//! [`CardIdentity`]; only the 131-byte modulus+exponent export is public.

use log::debug;
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use sha1::{Digest, Sha1};
use thiserror::Error;

/// RSA-1024 modulus length in bytes
pub const MODULUS_LEN: usize = 128;
/// Public exponent length in the wire format (65537 as 3 bytes)
pub const EXPONENT_LEN: usize = 3;
/// GET_PUBLIC_KEY response length: modulus followed by exponent
pub const PUBLIC_KEY_LEN: usize = MODULUS_LEN + EXPONENT_LEN;
/// Signature length (same as the modulus)
pub const SIGNATURE_LEN: usize = 128;
/// Fixed authentication challenge length
pub const CHALLENGE_LEN: usize = 32;

/// DigestInfo prefix for SHA-1 (PKCS#1 v1.5)
const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1A, 0x05, 0x00, 0x04, 0x14,
];

/// RSA operation errors
#[derive(Debug, Error)]
pub enum RsaError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("digest block does not fit the key size")]
    SigningFailed,

    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

/// The card-resident RSA identity
///
/// Regenerated whenever the card transitions from blank-or-reset to
/// provisioned, so every issued card carries a unique keypair.
pub struct CardIdentity {
    key: RsaPrivateKey,
}

impl CardIdentity {
    /// Generate a fresh RSA-1024 identity
    pub fn generate() -> Result<Self, RsaError> {
        debug!("Generating RSA-{} card identity", MODULUS_LEN * 8);
        let key = RsaPrivateKey::new(&mut OsRng, MODULUS_LEN * 8)
            .map_err(|e| RsaError::KeyGenerationFailed(e.to_string()))?;
        Ok(Self { key })
    }

    /// Replace the keypair with a freshly generated one
    pub fn regenerate(&mut self) -> Result<(), RsaError> {
        *self = Self::generate()?;
        Ok(())
    }

    /// Export the public key as modulus (128 bytes) followed by exponent
    /// (3 bytes), both left-padded with zeros
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        let n = self.key.n().to_bytes_be();
        let e = self.key.e().to_bytes_be();
        out[MODULUS_LEN - n.len()..MODULUS_LEN].copy_from_slice(&n);
        out[PUBLIC_KEY_LEN - e.len()..].copy_from_slice(&e);
        out
    }

    /// Sign a 32-byte challenge: SHA-1 digest, PKCS#1 v1.5 padding, m^d mod n
    pub fn sign_challenge(
        &self,
        challenge: &[u8; CHALLENGE_LEN],
    ) -> Result<[u8; SIGNATURE_LEN], RsaError> {
        let padded = encode_digest_block(challenge, self.key.size())?;

        let m = BigUint::from_bytes_be(&padded);
        let signature = m.modpow(self.key.d(), self.key.n());

        let mut out = [0u8; SIGNATURE_LEN];
        let bytes = signature.to_bytes_be();
        out[SIGNATURE_LEN - bytes.len()..].copy_from_slice(&bytes);
        Ok(out)
    }
}

/// Verify a challenge signature against raw modulus/exponent bytes
///
/// This is the terminal half of the authentication protocol: the public key
/// comes from the enrollment directory, not from the card, so a substituted
/// card or a tampered stored key fails deterministically.
pub fn verify_challenge(
    modulus: &[u8],
    exponent: &[u8],
    challenge: &[u8; CHALLENGE_LEN],
    signature: &[u8],
) -> Result<bool, RsaError> {
    if modulus.is_empty() || exponent.is_empty() {
        return Err(RsaError::InvalidKey("empty key material".to_string()));
    }
    if signature.len() != SIGNATURE_LEN {
        return Ok(false);
    }

    let n = BigUint::from_bytes_be(modulus);
    let e = BigUint::from_bytes_be(exponent);
    let s = BigUint::from_bytes_be(signature);
    if s >= n {
        return Ok(false);
    }

    let expected = encode_digest_block(challenge, MODULUS_LEN)?;

    // s^e mod n must reproduce the padded digest block exactly
    let recovered = s.modpow(&e, &n);
    let bytes = recovered.to_bytes_be();
    if bytes.len() > MODULUS_LEN {
        return Ok(false);
    }
    let mut em = [0u8; MODULUS_LEN];
    em[MODULUS_LEN - bytes.len()..].copy_from_slice(&bytes);

    Ok(em[..] == expected[..])
}

/// Build the PKCS#1 v1.5 block: 00 01 FF..FF 00 DigestInfo SHA1(challenge)
fn encode_digest_block(
    challenge: &[u8; CHALLENGE_LEN],
    key_size: usize,
) -> Result<Vec<u8>, RsaError> {
    let mut hasher = Sha1::new();
    hasher.update(challenge);
    let digest = hasher.finalize();

    let digest_info_len = SHA1_DIGEST_INFO.len() + digest.len();
    if digest_info_len + 11 > key_size {
        return Err(RsaError::SigningFailed);
    }

    let mut block = Vec::with_capacity(key_size);
    block.push(0x00);
    block.push(0x01);
    block.resize(key_size - digest_info_len - 1, 0xFF);
    block.push(0x00);
    block.extend_from_slice(&SHA1_DIGEST_INFO);
    block.extend_from_slice(&digest);
    Ok(block)
}
