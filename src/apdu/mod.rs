//! APDU (Application Protocol Data Unit) handling
//!
//! Structs and functions for the ISO 7816-4 short-format APDUs exchanged
//! between the gym terminal and the membership card. The card protocol only
//! ever uses short APDUs (Lc/Le up to 255), so parsing covers the four short
//! cases and nothing else.
//!
//! # Example
//! ```
//! use gymcard::apdu::{parse_apdu, ins};
//!
//! // VERIFY PIN "123456"
//! let raw = &[0x00, 0x20, 0x00, 0x00, 0x06, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36];
//! let apdu = parse_apdu(raw).unwrap();
//! assert_eq!(apdu.ins, ins::VERIFY_PIN);
//! assert_eq!(apdu.data, b"123456");
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur during APDU parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum APDUError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("Invalid APDU length")]
    InvalidLength,
}

/// A parsed APDU command
///
/// # Fields
/// - `cla`: Class byte (always 0x00 for the gym card)
/// - `ins`: Instruction byte (the command to execute)
/// - `p1`, `p2`: Parameter bytes (unused by the gym command set)
/// - `data`: Command data (may be empty)
/// - `le`: Expected response length (None if not specified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u16>,
}

impl APDU {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Set the expected response length (Le)
    pub fn expecting(mut self, le: u16) -> Self {
        self.le = Some(le);
        self
    }

    /// Serialize to raw short-format bytes for transmission
    ///
    /// Emits the correct ISO 7816-4 case (1 through 4) depending on whether
    /// data and Le are present. Le=256 is encoded as 0x00.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.cla, self.ins, self.p1, self.p2];
        if !self.data.is_empty() {
            out.push(self.data.len() as u8);
            out.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            out.push(if le == 256 { 0 } else { le as u8 });
        }
        out
    }
}

/// Parse raw bytes into an APDU
///
/// Supports the four short-format cases:
/// - Case 1: CLA INS P1 P2
/// - Case 2: CLA INS P1 P2 Le
/// - Case 3: CLA INS P1 P2 Lc Data
/// - Case 4: CLA INS P1 P2 Lc Data Le
pub fn parse_apdu(data: &[u8]) -> Result<APDU, APDUError> {
    if data.len() < 4 {
        return Err(APDUError::TooShort(data.len()));
    }

    let cla = data[0];
    let ins = data[1];
    let p1 = data[2];
    let p2 = data[3];

    let remaining = &data[4..];

    // Case 1: no data, no Le
    if remaining.is_empty() {
        return Ok(APDU::new(cla, ins, p1, p2));
    }

    let first_byte = remaining[0];

    // Case 2: only Le - Le=0 means 256
    if remaining.len() == 1 {
        let le = if first_byte == 0 { 256 } else { first_byte as u16 };
        return Ok(APDU {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: Some(le),
        });
    }

    // first_byte is Lc
    let lc = first_byte as usize;

    // Case 3: Lc + Data (no Le)
    if remaining.len() == 1 + lc {
        return Ok(APDU {
            cla,
            ins,
            p1,
            p2,
            data: remaining[1..1 + lc].to_vec(),
            le: None,
        });
    }

    // Case 4: Lc + Data + Le
    if remaining.len() == 1 + lc + 1 {
        let le_byte = remaining[1 + lc];
        let le = if le_byte == 0 { 256 } else { le_byte as u16 };
        return Ok(APDU {
            cla,
            ins,
            p1,
            p2,
            data: remaining[1..1 + lc].to_vec(),
            le: Some(le),
        });
    }

    Err(APDUError::InvalidLength)
}

/// Gym card instruction bytes
pub mod ins {
    /// Read the raw 80-byte record (payload stays encrypted)
    pub const READ: u8 = 0xB0;
    /// Write a full 80-byte record
    pub const WRITE: u8 = 0xD0;
    /// Verify the 6-digit PIN; success returns the decrypted record
    pub const VERIFY_PIN: u8 = 0x20;
    /// Change PIN (old + new, 12 bytes); requires a verified session
    pub const CHANGE_PIN: u8 = 0x24;
    /// Export the RSA public key (modulus + exponent, 131 bytes)
    pub const GET_PUBLIC_KEY: u8 = 0x82;
    /// Sign a 32-byte challenge with the card's private key
    pub const SIGN_CHALLENGE: u8 = 0x88;
    /// Reset the PIN retry counter without authentication
    pub const ADMIN_UNLOCK: u8 = 0xAA;
    /// Overwrite the PIN hash without the old PIN
    pub const ADMIN_RESET_PIN: u8 = 0xAB;
}
