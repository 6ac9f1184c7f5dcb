//! PIN verification and retry counter management
//!
//! The retry counter lives inside the card record (byte 50) so it survives
//! power loss mid-sequence. These functions mutate the record directly; the
//! session consequences (setting or clearing the Verified flag) belong to the
//! dispatcher.

use log::{info, warn};

use crate::crypto::kdf;
use crate::record::{CardRecord, MAX_PIN_RETRY};

/// Expected PIN length (6 ASCII digits)
pub const PIN_LEN: usize = 6;

/// Outcome of a PIN comparison against the stored hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    /// Hash matched; retry counter restored to the maximum
    Verified,
    /// Hash mismatch; counter already decremented
    Mismatch { retries_left: u8 },
    /// Counter was already zero; nothing compared, nothing changed
    Locked,
}

/// Compare a candidate PIN against the record's stored hash
///
/// A locked card refuses the comparison outright, so the stored hash is never
/// exercised once the counter reaches zero. Success restores the counter to
/// [`MAX_PIN_RETRY`]; failure decrements it by one.
pub fn check_pin(record: &mut CardRecord, pin: &[u8]) -> PinOutcome {
    if record.retry_counter() == 0 {
        warn!("PIN presented to a locked card");
        return PinOutcome::Locked;
    }

    if kdf::hash_pin(pin) == record.pin_hash() {
        record.set_retry_counter(MAX_PIN_RETRY);
        info!("PIN verified, retry counter restored");
        PinOutcome::Verified
    } else {
        let retries_left = record.retry_counter().saturating_sub(1);
        record.set_retry_counter(retries_left);
        warn!("PIN mismatch, {} attempts remaining", retries_left);
        PinOutcome::Mismatch { retries_left }
    }
}

/// Restore the retry counter without touching the PIN hash
pub fn admin_unlock(record: &mut CardRecord) {
    info!("Admin unlock, retry counter restored");
    record.set_retry_counter(MAX_PIN_RETRY);
}

/// Overwrite the stored PIN hash and restore the retry counter
///
/// The encrypted payload is left exactly as it was, still under the key
/// derived from the previous PIN. The record therefore decrypts to garbage
/// until the next WRITE re-provisions it. This matches the deployed card
/// behavior and must not be changed unilaterally.
pub fn admin_reset(record: &mut CardRecord, new_pin: &[u8]) {
    warn!("Admin PIN reset, payload remains under the old key");
    record.set_pin_hash(&kdf::hash_pin(new_pin));
    record.set_retry_counter(MAX_PIN_RETRY);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioned_record() -> CardRecord {
        let mut record = CardRecord::blank();
        record.set_user_id(42);
        record.set_pin_hash(&kdf::hash_pin(b"123456"));
        record
    }

    #[test]
    fn test_correct_pin_restores_counter() {
        let mut record = provisioned_record();
        record.set_retry_counter(2);

        assert_eq!(check_pin(&mut record, b"123456"), PinOutcome::Verified);
        assert_eq!(record.retry_counter(), MAX_PIN_RETRY);
    }

    #[test]
    fn test_wrong_pin_decrements() {
        let mut record = provisioned_record();

        assert_eq!(
            check_pin(&mut record, b"000000"),
            PinOutcome::Mismatch { retries_left: 4 }
        );
        assert_eq!(record.retry_counter(), 4);
    }

    #[test]
    fn test_lockout_after_exhaustion() {
        let mut record = provisioned_record();
        for _ in 0..MAX_PIN_RETRY {
            check_pin(&mut record, b"000000");
        }
        assert_eq!(record.retry_counter(), 0);

        // Even the correct PIN is refused once locked
        assert_eq!(check_pin(&mut record, b"123456"), PinOutcome::Locked);
        assert_eq!(record.retry_counter(), 0);
    }

    #[test]
    fn test_admin_unlock_keeps_hash() {
        let mut record = provisioned_record();
        let hash = record.pin_hash();
        for _ in 0..MAX_PIN_RETRY {
            check_pin(&mut record, b"000000");
        }

        admin_unlock(&mut record);
        assert_eq!(record.retry_counter(), MAX_PIN_RETRY);
        assert_eq!(record.pin_hash(), hash);
        assert_eq!(check_pin(&mut record, b"123456"), PinOutcome::Verified);
    }

    #[test]
    fn test_admin_reset_replaces_hash_only() {
        let mut record = provisioned_record();
        let payload = record.payload();

        admin_reset(&mut record, b"999999");
        assert_eq!(record.retry_counter(), MAX_PIN_RETRY);
        assert_eq!(record.pin_hash(), kdf::hash_pin(b"999999"));
        assert_eq!(record.payload(), payload);
        assert_eq!(check_pin(&mut record, b"999999"), PinOutcome::Verified);
    }
}
