//! Terminal-side protocol mirror
//!
//! Everything the reader-side software needs to talk to the card: command
//! builders with the protocol's exact Lc/Le bytes, the record/payload
//! encryption that provisions a card, and parsers that turn status words into
//! typed errors. The terminal and the card share the codec and the key
//! derivation, so both halves of the protocol live in this one crate and can
//! be exercised against each other.

pub mod enrollment;

use log::debug;
use thiserror::Error;

use crate::apdu::{ins, parse_apdu, Response, APDU, SW};
use crate::applet::pin::PIN_LEN;
use crate::applet::GymApplet;
use crate::crypto::rsa::{CHALLENGE_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::crypto::{aes, kdf};
use crate::record::{CardRecord, MemberPayload, MAX_PIN_RETRY, RECORD_SIZE};

/// Errors surfaced to terminal-side callers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminalError {
    #[error("wrong PIN, {retries_left} attempts remaining")]
    WrongPin { retries_left: u8 },

    #[error("card locked, admin unlock required")]
    Locked,

    #[error("command refused, PIN verification required")]
    SecurityStatus,

    #[error("card rejected the command length")]
    WrongLength,

    #[error("card does not support this instruction")]
    InstructionNotSupported,

    #[error("card-side cryptographic failure")]
    Crypto,

    #[error("unexpected status word {0:#06X}")]
    UnexpectedStatus(u16),

    #[error("malformed response from card")]
    InvalidResponse,
}

/// One synchronous APDU exchange
///
/// The applet implements this directly so card and terminal can be wired
/// together in-process; a PC/SC reader wrapper implements the same trait in
/// deployment.
pub trait CardTransport {
    /// Send raw command bytes, receive raw response bytes (data + SW1 SW2)
    fn transmit(&mut self, command: &[u8]) -> Vec<u8>;
}

impl CardTransport for GymApplet {
    fn transmit(&mut self, command: &[u8]) -> Vec<u8> {
        match parse_apdu(command) {
            Ok(apdu) => self.process(&apdu).to_bytes(),
            Err(_) => Response::error(SW::WRONG_LENGTH).to_bytes(),
        }
    }
}

/// APDU builders, one per instruction, with the protocol's Le values
pub mod commands {
    use super::*;

    pub fn read() -> APDU {
        APDU::new(0x00, ins::READ, 0x00, 0x00).expecting(RECORD_SIZE as u16)
    }

    pub fn write(record: &CardRecord) -> APDU {
        APDU::with_data(0x00, ins::WRITE, 0x00, 0x00, record.0.to_vec())
    }

    pub fn verify_pin(pin: &[u8]) -> APDU {
        APDU::with_data(0x00, ins::VERIFY_PIN, 0x00, 0x00, pin.to_vec())
            .expecting(RECORD_SIZE as u16)
    }

    pub fn change_pin(old_pin: &[u8], new_pin: &[u8]) -> APDU {
        let mut data = Vec::with_capacity(old_pin.len() + new_pin.len());
        data.extend_from_slice(old_pin);
        data.extend_from_slice(new_pin);
        APDU::with_data(0x00, ins::CHANGE_PIN, 0x00, 0x00, data)
    }

    pub fn get_public_key() -> APDU {
        APDU::new(0x00, ins::GET_PUBLIC_KEY, 0x00, 0x00).expecting(PUBLIC_KEY_LEN as u16)
    }

    pub fn sign_challenge(challenge: &[u8; CHALLENGE_LEN]) -> APDU {
        APDU::with_data(0x00, ins::SIGN_CHALLENGE, 0x00, 0x00, challenge.to_vec())
            .expecting(SIGNATURE_LEN as u16)
    }

    pub fn admin_unlock() -> APDU {
        APDU::new(0x00, ins::ADMIN_UNLOCK, 0x00, 0x00)
    }

    pub fn admin_reset_pin(new_pin: &[u8]) -> APDU {
        APDU::with_data(0x00, ins::ADMIN_RESET_PIN, 0x00, 0x00, new_pin.to_vec())
    }
}

/// Send one command and parse the raw reply into a [`Response`]
pub fn exchange<T: CardTransport>(card: &mut T, apdu: &APDU) -> Result<Response, TerminalError> {
    let raw = card.transmit(&apdu.to_bytes());
    debug!("Exchange INS 0x{:02X}: {} byte reply", apdu.ins, raw.len());
    Response::from_bytes(&raw).ok_or(TerminalError::InvalidResponse)
}

/// Map a non-success status word to the matching [`TerminalError`]
fn status_error(sw: u16) -> TerminalError {
    if let Some(retries_left) = SW::get_retry_count(sw) {
        return TerminalError::WrongPin { retries_left };
    }
    match sw {
        SW::AUTH_METHOD_BLOCKED => TerminalError::Locked,
        SW::SECURITY_STATUS_NOT_SATISFIED => TerminalError::SecurityStatus,
        SW::WRONG_LENGTH => TerminalError::WrongLength,
        SW::INS_NOT_SUPPORTED => TerminalError::InstructionNotSupported,
        SW::UNKNOWN_ERROR => TerminalError::Crypto,
        other => TerminalError::UnexpectedStatus(other),
    }
}

/// Require a 0x9000 reply, converting everything else into an error
pub fn expect_success(response: Response) -> Result<Response, TerminalError> {
    if response.is_okay() {
        Ok(response)
    } else {
        Err(status_error(response.sw()))
    }
}

/// What a READ reveals without a PIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicRecordView {
    pub user_id: u16,
    pub retry_counter: u8,
}

/// Provisioning input for a fresh card
#[derive(Debug, Clone)]
pub struct Provisioning {
    pub user_id: u16,
    pub pin: Vec<u8>,
    pub payload: MemberPayload,
}

/// Build the 80-byte record for a WRITE: encode the payload, encrypt it
/// under the PIN-derived key, and store the PIN hash with a full retry
/// counter
pub fn build_card_record(provisioning: &Provisioning) -> CardRecord {
    let key = kdf::derive_key(&provisioning.pin);
    let mut record = CardRecord::blank();
    record.set_user_id(provisioning.user_id);
    record.set_payload(&aes::encrypt_payload(&key, &provisioning.payload.encode()));
    record.set_retry_counter(MAX_PIN_RETRY);
    record.set_pin_hash(&kdf::hash_pin(&provisioning.pin));
    record
}

/// Parse a READ reply into the public (unauthenticated) view
pub fn parse_public_record(response: Response) -> Result<PublicRecordView, TerminalError> {
    let response = expect_success(response)?;
    let record = CardRecord::from_bytes(&response.data).ok_or(TerminalError::InvalidResponse)?;
    Ok(PublicRecordView {
        user_id: record.user_id(),
        retry_counter: record.retry_counter(),
    })
}

/// Decrypt a READ reply locally with a known PIN
///
/// READ never decrypts on-card; a terminal that already holds the member's
/// PIN can decrypt the payload itself without spending a retry attempt.
pub fn decrypt_record(response: Response, pin: &[u8]) -> Result<MemberPayload, TerminalError> {
    let response = expect_success(response)?;
    let record = CardRecord::from_bytes(&response.data).ok_or(TerminalError::InvalidResponse)?;
    let plain = aes::decrypt_payload(&kdf::derive_key(pin), &record.payload());
    Ok(MemberPayload::decode(&plain))
}

/// Parse a VERIFY_PIN reply: the card already decrypted the payload
pub fn parse_verified_record(response: Response) -> Result<MemberPayload, TerminalError> {
    let response = expect_success(response)?;
    let record = CardRecord::from_bytes(&response.data).ok_or(TerminalError::InvalidResponse)?;
    Ok(MemberPayload::decode(&record.payload()))
}

/// Human-readable PIN status line for the operator display
pub fn pin_status_message(sw: u16) -> String {
    if SW::is_success(sw) {
        return "PIN verified".to_string();
    }
    if let Some(retries) = SW::get_retry_count(sw) {
        return match retries {
            0 => "Wrong PIN, card is now locked".to_string(),
            1 => "Wrong PIN, 1 attempt remaining".to_string(),
            n => format!("Wrong PIN, {} attempts remaining", n),
        };
    }
    match sw {
        SW::AUTH_METHOD_BLOCKED => "Card locked, contact the front desk".to_string(),
        other => format!("Card error {:#06X}", other),
    }
}

/// High-level terminal operations over any transport
pub struct Terminal<T: CardTransport> {
    card: T,
}

impl<T: CardTransport> Terminal<T> {
    pub fn new(card: T) -> Self {
        Self { card }
    }

    pub fn into_inner(self) -> T {
        self.card
    }

    /// Unauthenticated READ: UserID and retry counter only
    pub fn read_public(&mut self) -> Result<PublicRecordView, TerminalError> {
        let resp = exchange(&mut self.card, &commands::read())?;
        parse_public_record(resp)
    }

    /// Verify the PIN on-card and return the decrypted member payload
    pub fn verify_pin(&mut self, pin: &[u8]) -> Result<MemberPayload, TerminalError> {
        let resp = exchange(&mut self.card, &commands::verify_pin(pin))?;
        parse_verified_record(resp)
    }

    /// Provision (or overwrite) the card's record
    pub fn write(&mut self, provisioning: &Provisioning) -> Result<(), TerminalError> {
        let record = build_card_record(provisioning);
        let resp = exchange(&mut self.card, &commands::write(&record))?;
        expect_success(resp).map(|_| ())
    }

    /// Change the PIN; requires a prior successful [`Terminal::verify_pin`]
    pub fn change_pin(&mut self, old_pin: &[u8], new_pin: &[u8]) -> Result<(), TerminalError> {
        let resp = exchange(&mut self.card, &commands::change_pin(old_pin, new_pin))?;
        expect_success(resp).map(|_| ())
    }

    /// Restore the retry counter after a lockout
    pub fn admin_unlock(&mut self) -> Result<(), TerminalError> {
        let resp = exchange(&mut self.card, &commands::admin_unlock())?;
        expect_success(resp).map(|_| ())
    }

    /// Replace the PIN hash without the old PIN. The payload stays encrypted
    /// under the previous PIN's key until the record is written again.
    pub fn admin_reset_pin(&mut self, new_pin: &[u8]) -> Result<(), TerminalError> {
        if new_pin.len() != PIN_LEN {
            return Err(TerminalError::WrongLength);
        }
        let resp = exchange(&mut self.card, &commands::admin_reset_pin(new_pin))?;
        expect_success(resp).map(|_| ())
    }

    /// Fetch the card's 131-byte public key export
    pub fn get_public_key(&mut self) -> Result<Vec<u8>, TerminalError> {
        let resp = exchange(&mut self.card, &commands::get_public_key())?;
        let resp = expect_success(resp)?;
        if resp.data.len() != PUBLIC_KEY_LEN {
            return Err(TerminalError::InvalidResponse);
        }
        Ok(resp.data)
    }

    /// Have the card sign a challenge
    pub fn sign_challenge(
        &mut self,
        challenge: &[u8; CHALLENGE_LEN],
    ) -> Result<Vec<u8>, TerminalError> {
        let resp = exchange(&mut self.card, &commands::sign_challenge(challenge))?;
        let resp = expect_success(resp)?;
        if resp.data.len() != SIGNATURE_LEN {
            return Err(TerminalError::InvalidResponse);
        }
        Ok(resp.data)
    }
}
