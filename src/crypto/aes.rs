//! AES Operations
//!
//! AES-128 ECB encryption/decryption of the fixed 48-byte member payload.
//!
//! ECB with no padding is mandated by the card protocol: the payload is
//! always exactly 3 blocks and both halves (card and terminal) must produce
//! identical ciphertext from identical plaintext. Identical plaintext blocks
//! therefore produce identical ciphertext blocks; the protocol accepts this
//! for its fixed small payload and it must not be changed without breaking
//! on-wire compatibility.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use log::debug;

use super::kdf::KEY_SIZE;
use crate::record::PAYLOAD_SIZE;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Encrypt the 48-byte payload with AES-128-ECB (no padding)
pub fn encrypt_payload(key: &[u8; KEY_SIZE], plain: &[u8; PAYLOAD_SIZE]) -> [u8; PAYLOAD_SIZE] {
    debug!("AES-ECB encrypting {} bytes", plain.len());

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = *plain;
    for chunk in out.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    out
}

/// Decrypt the 48-byte payload with AES-128-ECB (no padding)
pub fn decrypt_payload(key: &[u8; KEY_SIZE], ciphertext: &[u8; PAYLOAD_SIZE]) -> [u8; PAYLOAD_SIZE] {
    debug!("AES-ECB decrypting {} bytes", ciphertext.len());

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = *ciphertext;
    for chunk in out.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::derive_key;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = derive_key(b"123456");
        let plain = [0x42u8; PAYLOAD_SIZE];

        let ciphertext = encrypt_payload(&key, &plain);
        assert_ne!(ciphertext, plain);
        assert_eq!(decrypt_payload(&key, &ciphertext), plain);
    }

    #[test]
    fn test_wrong_key_yields_garbage() {
        let plain = [0x42u8; PAYLOAD_SIZE];
        let ciphertext = encrypt_payload(&derive_key(b"123456"), &plain);
        assert_ne!(decrypt_payload(&derive_key(b"654321"), &ciphertext), plain);
    }

    #[test]
    fn test_ecb_identical_blocks_identical_ciphertext() {
        // Documented ECB property: repeated plaintext blocks repeat in the
        // ciphertext. The protocol accepts this.
        let key = derive_key(b"123456");
        let plain = [0x00u8; PAYLOAD_SIZE];
        let ciphertext = encrypt_payload(&key, &plain);
        assert_eq!(ciphertext[0..16], ciphertext[16..32]);
        assert_eq!(ciphertext[16..32], ciphertext[32..48]);
    }
}
