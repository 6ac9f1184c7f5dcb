//! Status Word (SW) constants for APDU responses
//!
//! The subset of ISO 7816-4 status words the gym card protocol uses.

/// Status Word constants
pub struct SW;

impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    /// Wrong command data length (checked before any state mutation)
    pub const WRONG_LENGTH: u16 = 0x6700;

    /// PIN required but the session is not verified
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;

    /// Retry counter exhausted; card locked until an admin override
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;

    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;

    /// Cipher or key-object initialization failure (fatal for the command)
    pub const UNKNOWN_ERROR: u16 = 0x6F00;

    /// Create a warning with counter (63Cx)
    /// Used to indicate PIN retry count remaining
    #[inline]
    pub fn counter_warning(retries: u8) -> u16 {
        0x63C0 | ((retries & 0x0F) as u16)
    }

    /// Check if a status word indicates success
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS
    }

    /// Check if a status word is a counter warning (63Cx)
    #[inline]
    pub fn is_counter_warning(sw: u16) -> bool {
        (sw & 0xFFF0) == 0x63C0
    }

    /// Extract retry count from counter warning (63Cx)
    #[inline]
    pub fn get_retry_count(sw: u16) -> Option<u8> {
        if Self::is_counter_warning(sw) {
            Some((sw & 0x0F) as u8)
        } else {
            None
        }
    }
}
