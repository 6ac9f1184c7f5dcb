//! On-card record layout and the member payload codec
//!
//! The card stores exactly one fixed 80-byte record. All multi-byte integers
//! are big-endian:
//!
//! ```text
//! [0-1]   UserID (2 bytes, public; 0 = blank card)
//! [2-49]  Encrypted payload (48 bytes, AES-128/ECB/NoPadding, 3 blocks)
//! [50]    PIN retry counter (0..5)
//! [51-66] PIN hash (16 bytes, SHA-256 truncated)
//! [67-79] Reserved (zeros)
//! ```
//!
//! The plaintext inside the encrypted area is a [`MemberPayload`]:
//!
//! ```text
//! [0-3]   Balance (i32, smallest currency unit)
//! [4-5]   ExpiryDays (i16)
//! [6]     BirthDay
//! [7]     BirthMonth
//! [8-9]   BirthYear (u16)
//! [10]    NameLength (0..21)
//! [11-31] Name (UTF-8, zero-padded)
//! [32-43] NationalID (ASCII, zero-padded)
//! [44-47] Padding (zeros)
//! ```

/// Total record size
pub const RECORD_SIZE: usize = 80;
/// Encrypted payload size (3 AES blocks)
pub const PAYLOAD_SIZE: usize = 48;
/// Truncated SHA-256 PIN hash size
pub const PIN_HASH_SIZE: usize = 16;
/// Retry counter value for a freshly provisioned or unlocked card
pub const MAX_PIN_RETRY: u8 = 5;
/// Maximum UTF-8 byte length of the member name
pub const MAX_NAME_LEN: usize = 21;
/// Fixed ASCII width of the national ID field
pub const NATIONAL_ID_LEN: usize = 12;

/// Byte offsets within the 80-byte record
pub mod offset {
    pub const USER_ID: usize = 0;
    pub const PAYLOAD: usize = 2;
    pub const PIN_RETRY: usize = 50;
    pub const PIN_HASH: usize = 51;
    pub const RESERVED: usize = 67;
}

/// The raw 80-byte on-card record
///
/// A thin view over the wire format. Accessors never validate field
/// semantics; the payload area is opaque ciphertext unless the caller has a
/// PIN-derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord(pub [u8; RECORD_SIZE]);

impl CardRecord {
    /// A blank record: UserID 0, full retry counter, everything else zero
    pub fn blank() -> Self {
        let mut data = [0u8; RECORD_SIZE];
        data[offset::PIN_RETRY] = MAX_PIN_RETRY;
        Self(data)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; RECORD_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn user_id(&self) -> u16 {
        u16::from_be_bytes([self.0[offset::USER_ID], self.0[offset::USER_ID + 1]])
    }

    pub fn set_user_id(&mut self, id: u16) {
        self.0[offset::USER_ID..offset::USER_ID + 2].copy_from_slice(&id.to_be_bytes());
    }

    /// A card is blank while no member has been assigned to it
    pub fn is_blank(&self) -> bool {
        self.user_id() == 0
    }

    pub fn payload(&self) -> [u8; PAYLOAD_SIZE] {
        let mut out = [0u8; PAYLOAD_SIZE];
        out.copy_from_slice(&self.0[offset::PAYLOAD..offset::PAYLOAD + PAYLOAD_SIZE]);
        out
    }

    pub fn set_payload(&mut self, payload: &[u8; PAYLOAD_SIZE]) {
        self.0[offset::PAYLOAD..offset::PAYLOAD + PAYLOAD_SIZE].copy_from_slice(payload);
    }

    pub fn retry_counter(&self) -> u8 {
        self.0[offset::PIN_RETRY]
    }

    pub fn set_retry_counter(&mut self, retries: u8) {
        self.0[offset::PIN_RETRY] = retries;
    }

    pub fn pin_hash(&self) -> [u8; PIN_HASH_SIZE] {
        let mut out = [0u8; PIN_HASH_SIZE];
        out.copy_from_slice(&self.0[offset::PIN_HASH..offset::PIN_HASH + PIN_HASH_SIZE]);
        out
    }

    pub fn set_pin_hash(&mut self, hash: &[u8; PIN_HASH_SIZE]) {
        self.0[offset::PIN_HASH..offset::PIN_HASH + PIN_HASH_SIZE].copy_from_slice(hash);
    }
}

impl Default for CardRecord {
    fn default() -> Self {
        Self::blank()
    }
}

/// Decoded member payload (the 48-byte plaintext)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberPayload {
    /// Account balance in the smallest currency unit
    pub balance: i32,
    /// Days of membership remaining (may be negative once expired)
    pub expiry_days: i16,
    pub birth_day: u8,
    pub birth_month: u8,
    pub birth_year: u16,
    /// Member name; truncated to 21 UTF-8 bytes on encode
    pub name: String,
    /// National ID; truncated to 12 ASCII bytes on encode
    pub national_id: String,
}

impl MemberPayload {
    /// Encode into the fixed 48-byte plaintext layout
    ///
    /// Name is truncated to 21 UTF-8 bytes at a character boundary, the
    /// national ID to 12 bytes. Unused trailing bytes are zero.
    pub fn encode(&self) -> [u8; PAYLOAD_SIZE] {
        let mut buf = [0u8; PAYLOAD_SIZE];
        buf[0..4].copy_from_slice(&self.balance.to_be_bytes());
        buf[4..6].copy_from_slice(&self.expiry_days.to_be_bytes());
        buf[6] = self.birth_day;
        buf[7] = self.birth_month;
        buf[8..10].copy_from_slice(&self.birth_year.to_be_bytes());

        let name = truncate_utf8(&self.name, MAX_NAME_LEN);
        buf[10] = name.len() as u8;
        buf[11..11 + name.len()].copy_from_slice(name.as_bytes());

        let id = &self.national_id.as_bytes()[..self.national_id.len().min(NATIONAL_ID_LEN)];
        buf[32..32 + id.len()].copy_from_slice(id);

        buf
    }

    /// Decode from the fixed 48-byte plaintext layout
    ///
    /// Performs no semantic validation (date plausibility and the like are a
    /// caller concern). A corrupt name length or non-UTF-8 name bytes, which
    /// happen when the payload was decrypted with the wrong key, degrade to a
    /// clamped length and lossy string rather than an error.
    pub fn decode(buf: &[u8; PAYLOAD_SIZE]) -> Self {
        let balance = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let expiry_days = i16::from_be_bytes([buf[4], buf[5]]);
        let name_len = (buf[10] as usize).min(MAX_NAME_LEN);
        let name = String::from_utf8_lossy(&buf[11..11 + name_len]).into_owned();
        let id_bytes = &buf[32..32 + NATIONAL_ID_LEN];
        let id_len = id_bytes.iter().position(|&b| b == 0).unwrap_or(NATIONAL_ID_LEN);
        let national_id = String::from_utf8_lossy(&id_bytes[..id_len]).into_owned();

        Self {
            balance,
            expiry_days,
            birth_day: buf[6],
            birth_month: buf[7],
            birth_year: u16::from_be_bytes([buf[8], buf[9]]),
            name,
            national_id,
        }
    }
}

/// Truncate a string to at most `max` bytes without splitting a UTF-8 char
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemberPayload {
        MemberPayload {
            balance: 100_000,
            expiry_days: 30,
            birth_day: 14,
            birth_month: 7,
            birth_year: 1998,
            name: "An Nguyen".to_string(),
            national_id: "079098001234".to_string(),
        }
    }

    #[test]
    fn test_encode_layout() {
        let buf = sample().encode();
        assert_eq!(&buf[0..4], &100_000i32.to_be_bytes());
        assert_eq!(&buf[4..6], &30i16.to_be_bytes());
        assert_eq!(buf[6], 14);
        assert_eq!(buf[7], 7);
        assert_eq!(&buf[8..10], &1998u16.to_be_bytes());
        assert_eq!(buf[10], 9);
        assert_eq!(&buf[11..20], b"An Nguyen");
        assert_eq!(&buf[32..44], b"079098001234");
        // Trailing padding stays zero
        assert!(buf[44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_roundtrip() {
        let payload = sample();
        assert_eq!(MemberPayload::decode(&payload.encode()), payload);
    }

    #[test]
    fn test_roundtrip_empty() {
        let payload = MemberPayload::default();
        assert_eq!(MemberPayload::decode(&payload.encode()), payload);
    }

    #[test]
    fn test_roundtrip_negative_balance_and_expiry() {
        let payload = MemberPayload {
            balance: -50_000,
            expiry_days: -3,
            ..sample()
        };
        assert_eq!(MemberPayload::decode(&payload.encode()), payload);
    }

    #[test]
    fn test_name_truncated_at_char_boundary() {
        let payload = MemberPayload {
            // 8 x 3-byte chars = 24 bytes; must truncate to 21 = 7 chars
            name: "ặặặặặặặặ".to_string(),
            ..sample()
        };
        let decoded = MemberPayload::decode(&payload.encode());
        assert_eq!(decoded.name, "ặặặặặặặ");
        assert_eq!(decoded.name.len(), 21);
    }

    #[test]
    fn test_national_id_truncated() {
        let payload = MemberPayload {
            national_id: "0790980012345678".to_string(),
            ..sample()
        };
        let decoded = MemberPayload::decode(&payload.encode());
        assert_eq!(decoded.national_id, "079098001234");
    }

    #[test]
    fn test_decode_clamps_corrupt_name_length() {
        // Garbage payload (wrong-key decryption) must not panic
        let buf = [0xA7u8; PAYLOAD_SIZE];
        let decoded = MemberPayload::decode(&buf);
        assert!(decoded.name.len() <= MAX_NAME_LEN * 3);
    }

    #[test]
    fn test_blank_record() {
        let rec = CardRecord::blank();
        assert!(rec.is_blank());
        assert_eq!(rec.retry_counter(), MAX_PIN_RETRY);
        assert_eq!(rec.pin_hash(), [0u8; PIN_HASH_SIZE]);
    }

    #[test]
    fn test_record_accessors() {
        let mut rec = CardRecord::blank();
        rec.set_user_id(0x1234);
        assert_eq!(rec.user_id(), 0x1234);
        assert!(!rec.is_blank());
        assert_eq!(&rec.0[0..2], &[0x12, 0x34]);

        rec.set_retry_counter(2);
        assert_eq!(rec.0[offset::PIN_RETRY], 2);

        let hash = [0xAB; PIN_HASH_SIZE];
        rec.set_pin_hash(&hash);
        assert_eq!(rec.pin_hash(), hash);

        let payload = [0xCD; PAYLOAD_SIZE];
        rec.set_payload(&payload);
        assert_eq!(rec.payload(), payload);
    }

    #[test]
    fn test_from_bytes_length_check() {
        assert!(CardRecord::from_bytes(&[0u8; 80]).is_some());
        assert!(CardRecord::from_bytes(&[0u8; 64]).is_none());
    }
}
