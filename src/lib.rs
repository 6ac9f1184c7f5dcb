//! gymcard - gym membership smart card security core
//!
//! Both halves of a gym's contactless membership card protocol:
//!
//! - The card applet ([`applet::GymApplet`]): one 80-byte record holding a
//!   public UserID and an AES-encrypted member payload, a PIN state machine
//!   with a 5-attempt retry counter, and an RSA-1024 identity for
//!   challenge-response authentication.
//! - The terminal side ([`terminal`]): APDU command builders, the mirror
//!   encoder that provisions records, typed error mapping for every status
//!   word the card can return, and the enrollment key directory.
//!
//! The two halves share the record codec and key derivation, so the crate
//! can exercise the full protocol in-process through [`terminal::CardTransport`].
//!
//! # Example
//!
//! ```
//! use gymcard::applet::GymApplet;
//! use gymcard::record::MemberPayload;
//! use gymcard::terminal::{Provisioning, Terminal};
//!
//! let mut terminal = Terminal::new(GymApplet::new()?);
//! terminal.write(&Provisioning {
//!     user_id: 7,
//!     pin: b"123456".to_vec(),
//!     payload: MemberPayload {
//!         balance: 100_000,
//!         expiry_days: 30,
//!         name: "An Nguyen".to_string(),
//!         ..Default::default()
//!     },
//! })?;
//!
//! let member = terminal.verify_pin(b"123456")?;
//! assert_eq!(member.balance, 100_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod apdu;
pub mod applet;
pub mod crypto;
pub mod record;
pub mod terminal;
