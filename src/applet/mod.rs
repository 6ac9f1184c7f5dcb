//! Gym card applet
//!
//! Card-side command dispatcher. Owns the single 80-byte record, the RSA
//! identity keypair, the transient session state, and the scratch arena, and
//! maps each incoming APDU to exactly one handler. Every handler checks
//! lengths and permissions before mutating anything; a failing PIN attempt's
//! retry decrement is the only state change a failure path is allowed.

pub mod pin;
pub mod scratch;
pub mod session;

use log::{debug, info, warn};

use crate::apdu::{ins, Response, APDU, SW};
use crate::crypto::rsa::{CardIdentity, RsaError, CHALLENGE_LEN};
use crate::crypto::{aes, kdf};
use crate::record::{CardRecord, RECORD_SIZE};

use self::pin::{PinOutcome, PIN_LEN};
use self::scratch::Scratch;
use self::session::Session;

/// The membership card applet
pub struct GymApplet {
    record: CardRecord,
    identity: CardIdentity,
    session: Session,
    scratch: Scratch,
}

impl GymApplet {
    /// Create a blank card with a fresh RSA identity
    pub fn new() -> Result<Self, RsaError> {
        Ok(Self {
            record: CardRecord::blank(),
            identity: CardIdentity::generate()?,
            session: Session::new(),
            scratch: Scratch::new(),
        })
    }

    /// Create a card that already holds the given record
    pub fn with_record(record: CardRecord) -> Result<Self, RsaError> {
        Ok(Self {
            record,
            identity: CardIdentity::generate()?,
            session: Session::new(),
            scratch: Scratch::new(),
        })
    }

    /// The current record, payload still encrypted
    pub fn record(&self) -> &CardRecord {
        &self.record
    }

    /// Whether the current session has passed PIN verification
    pub fn is_verified(&self) -> bool {
        self.session.is_verified()
    }

    /// Card removed from the reader: all transient state is lost
    pub fn deselect(&mut self) {
        debug!("Card deselected, clearing session");
        self.session.clear();
        self.scratch.wipe();
    }

    /// Process one APDU command and produce the response
    pub fn process(&mut self, cmd: &APDU) -> Response {
        debug!("Dispatching INS 0x{:02X}", cmd.ins);
        match cmd.ins {
            ins::READ => self.handle_read(),
            ins::WRITE => self.handle_write(cmd),
            ins::VERIFY_PIN => self.handle_verify_pin(cmd),
            ins::CHANGE_PIN => self.handle_change_pin(cmd),
            ins::GET_PUBLIC_KEY => self.handle_get_public_key(),
            ins::SIGN_CHALLENGE => self.handle_sign_challenge(cmd),
            ins::ADMIN_UNLOCK => self.handle_admin_unlock(),
            ins::ADMIN_RESET_PIN => self.handle_admin_reset_pin(cmd),
            _ => Response::error(SW::INS_NOT_SUPPORTED),
        }
    }

    /// READ: the raw record, payload encrypted; no PIN gate
    fn handle_read(&self) -> Response {
        Response::success(self.record.0.to_vec())
    }

    /// VERIFY_PIN: on success return the record with the payload decrypted
    fn handle_verify_pin(&mut self, cmd: &APDU) -> Response {
        if cmd.data.len() != PIN_LEN {
            return Response::error(SW::WRONG_LENGTH);
        }

        match pin::check_pin(&mut self.record, &cmd.data) {
            PinOutcome::Locked => Response::error(SW::AUTH_METHOD_BLOCKED),
            PinOutcome::Mismatch { retries_left } => {
                self.session.clear();
                Response::counter_warning(retries_left)
            }
            PinOutcome::Verified => {
                let key = kdf::derive_key(&cmd.data);
                let plain = aes::decrypt_payload(&key, &self.record.payload());
                self.session.verify_with(key);

                let mut out = self.record.clone();
                out.set_payload(&plain);
                Response::success(out.0.to_vec())
            }
        }
    }

    /// CHANGE_PIN: re-encrypt the payload under the new PIN's key
    ///
    /// The verified-session gate comes before the length check; an
    /// unauthenticated caller learns nothing about what a well-formed
    /// command looks like.
    fn handle_change_pin(&mut self, cmd: &APDU) -> Response {
        if !self.session.is_verified() {
            return Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        }
        if cmd.data.len() != PIN_LEN * 2 {
            return Response::error(SW::WRONG_LENGTH);
        }

        let (old_pin, new_pin) = cmd.data.split_at(PIN_LEN);

        match pin::check_pin(&mut self.record, old_pin) {
            PinOutcome::Locked => Response::error(SW::AUTH_METHOD_BLOCKED),
            PinOutcome::Mismatch { retries_left } => {
                self.session.clear();
                Response::counter_warning(retries_left)
            }
            PinOutcome::Verified => {
                let old_key = kdf::derive_key(old_pin);

                // The plaintext goes in the payload region, the new key in
                // the digest region. The split borrow keeps them disjoint, so
                // deriving the new key cannot clobber the old-key plaintext.
                let (digest, plain) = self.scratch.parts();
                *plain = aes::decrypt_payload(&old_key, &self.record.payload());
                digest[..kdf::KEY_SIZE].copy_from_slice(&kdf::derive_key(new_pin));

                let mut new_key = [0u8; kdf::KEY_SIZE];
                new_key.copy_from_slice(&digest[..kdf::KEY_SIZE]);

                self.record.set_payload(&aes::encrypt_payload(&new_key, plain));
                self.record.set_pin_hash(&kdf::hash_pin(new_pin));
                self.session.verify_with(new_key);
                self.scratch.wipe();

                info!("PIN changed, payload re-encrypted");
                Response::ok()
            }
        }
    }

    /// WRITE: replace the record with terminal-provided content
    ///
    /// Allowed on a blank card, in a verified session, or when the incoming
    /// record resets UserID to 0. Provisioning a blank card or resetting it
    /// regenerates the RSA identity so a re-issued card cannot answer for the
    /// previous member. The session never survives a WRITE.
    fn handle_write(&mut self, cmd: &APDU) -> Response {
        if cmd.data.len() != RECORD_SIZE {
            return Response::error(SW::WRONG_LENGTH);
        }
        let Some(incoming) = CardRecord::from_bytes(&cmd.data) else {
            return Response::error(SW::WRONG_LENGTH);
        };

        let was_blank = self.record.is_blank();
        let resetting = incoming.is_blank();
        if !(was_blank || self.session.is_verified() || resetting) {
            return Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        }

        self.record.set_user_id(incoming.user_id());
        self.record.set_payload(&incoming.payload());
        self.record.set_retry_counter(incoming.retry_counter());
        self.record.set_pin_hash(&incoming.pin_hash());

        if was_blank || resetting {
            info!("Provisioning transition, regenerating card identity");
            if self.identity.regenerate().is_err() {
                warn!("RSA key regeneration failed");
                self.session.clear();
                return Response::error(SW::UNKNOWN_ERROR);
            }
        }

        self.session.clear();
        Response::ok()
    }

    /// GET_PUBLIC_KEY: modulus and exponent, no PIN gate
    fn handle_get_public_key(&self) -> Response {
        Response::success(self.identity.public_key_bytes().to_vec())
    }

    /// SIGN_CHALLENGE: sign 32 bytes with the card's private key, no PIN gate
    fn handle_sign_challenge(&self, cmd: &APDU) -> Response {
        let Ok(challenge) = <&[u8; CHALLENGE_LEN]>::try_from(cmd.data.as_slice()) else {
            return Response::error(SW::WRONG_LENGTH);
        };
        match self.identity.sign_challenge(challenge) {
            Ok(signature) => Response::success(signature.to_vec()),
            Err(_) => Response::error(SW::UNKNOWN_ERROR),
        }
    }

    /// ADMIN_UNLOCK: restore the retry counter; session untouched
    fn handle_admin_unlock(&mut self) -> Response {
        pin::admin_unlock(&mut self.record);
        Response::ok()
    }

    /// ADMIN_RESET_PIN: replace the PIN hash; payload stays under the old key
    fn handle_admin_reset_pin(&mut self, cmd: &APDU) -> Response {
        if cmd.data.len() != PIN_LEN {
            return Response::error(SW::WRONG_LENGTH);
        }
        pin::admin_reset(&mut self.record, &cmd.data);
        Response::ok()
    }
}
