//! Cryptographic Operations
//!
//! The three primitive families the card protocol uses: PIN-derived key
//! material, AES-128-ECB payload confidentiality, and the RSA card identity.

pub mod aes;
pub mod kdf;
pub mod rsa;

pub use self::rsa::CardIdentity;
