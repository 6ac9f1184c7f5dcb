//! End-to-end card/terminal protocol scenarios
//!
//! The applet plays the card and the terminal talks to it through the same
//! transport trait a PC/SC reader would implement, so every exchange here
//! crosses the real wire format (APDU bytes out, data + SW1 SW2 back).

use gymcard::apdu::SW;
use gymcard::applet::GymApplet;
use gymcard::record::{MemberPayload, MAX_PIN_RETRY};
use gymcard::terminal::enrollment::KeyDirectory;
use gymcard::terminal::{Provisioning, Terminal, TerminalError};
use tempfile::TempDir;

const PIN: &[u8] = b"123456";

fn an_nguyen() -> Provisioning {
    Provisioning {
        user_id: 7,
        pin: PIN.to_vec(),
        payload: MemberPayload {
            balance: 100_000,
            expiry_days: 30,
            birth_day: 14,
            birth_month: 7,
            birth_year: 1998,
            name: "An Nguyen".to_string(),
            national_id: "079098001234".to_string(),
        },
    }
}

fn provisioned_terminal() -> Terminal<GymApplet> {
    let mut terminal = Terminal::new(GymApplet::new().unwrap());
    terminal.write(&an_nguyen()).unwrap();
    terminal
}

#[test]
fn provision_read_verify() {
    let mut terminal = provisioned_terminal();

    // READ without a PIN shows the public fields only
    let view = terminal.read_public().unwrap();
    assert_eq!(view.user_id, 7);
    assert_eq!(view.retry_counter, MAX_PIN_RETRY);

    // VERIFY decrypts on-card
    let member = terminal.verify_pin(PIN).unwrap();
    assert_eq!(member, an_nguyen().payload);
}

#[test]
fn read_payload_stays_encrypted() {
    let mut terminal = provisioned_terminal();
    terminal.read_public().unwrap();

    let applet = terminal.into_inner();
    assert_ne!(applet.record().payload(), an_nguyen().payload.encode());
}

#[test]
fn lockout_and_admin_unlock() {
    let mut terminal = provisioned_terminal();

    for expected in (0..MAX_PIN_RETRY).rev() {
        assert_eq!(
            terminal.verify_pin(b"000000"),
            Err(TerminalError::WrongPin {
                retries_left: expected
            })
        );
    }

    // Locked: the correct PIN no longer works
    assert_eq!(terminal.verify_pin(PIN), Err(TerminalError::Locked));
    assert_eq!(terminal.read_public().unwrap().retry_counter, 0);

    // Admin override restores the counter without touching the PIN
    terminal.admin_unlock().unwrap();
    assert_eq!(terminal.read_public().unwrap().retry_counter, MAX_PIN_RETRY);
    assert_eq!(terminal.verify_pin(PIN).unwrap(), an_nguyen().payload);
}

#[test]
fn successful_verify_restores_counter() {
    let mut terminal = provisioned_terminal();

    terminal.verify_pin(b"000000").unwrap_err();
    terminal.verify_pin(b"111111").unwrap_err();
    assert_eq!(terminal.read_public().unwrap().retry_counter, MAX_PIN_RETRY - 2);

    terminal.verify_pin(PIN).unwrap();
    assert_eq!(terminal.read_public().unwrap().retry_counter, MAX_PIN_RETRY);
}

#[test]
fn change_pin_reencrypts_payload() {
    let mut terminal = provisioned_terminal();

    // Unverified change is refused before anything else is inspected
    assert_eq!(
        terminal.change_pin(PIN, b"654321"),
        Err(TerminalError::SecurityStatus)
    );

    terminal.verify_pin(PIN).unwrap();
    terminal.change_pin(PIN, b"654321").unwrap();

    // New PIN yields the pre-change payload
    assert_eq!(terminal.verify_pin(b"654321").unwrap(), an_nguyen().payload);

    // Old PIN now counts as a wrong attempt
    assert_eq!(
        terminal.verify_pin(PIN),
        Err(TerminalError::WrongPin { retries_left: 4 })
    );
}

#[test]
fn admin_reset_pin_leaves_payload_unreadable() {
    let mut terminal = provisioned_terminal();

    terminal.admin_reset_pin(b"999999").unwrap();

    // Hash check passes, but the payload is still under the old PIN's key,
    // so the decrypted fields are garbage until the next write
    let member = terminal.verify_pin(b"999999").unwrap();
    assert_ne!(member, an_nguyen().payload);

    // A fresh write makes the record readable again
    let mut provisioning = an_nguyen();
    provisioning.pin = b"999999".to_vec();
    terminal.write(&provisioning).unwrap();
    assert_eq!(terminal.verify_pin(b"999999").unwrap(), provisioning.payload);
}

#[test]
fn enrollment_authenticates_only_the_enrolled_card() {
    let tmp = TempDir::new().unwrap();
    let mut directory = KeyDirectory::new(Some(tmp.path().join("keys.json")));

    let mut enrolled = provisioned_terminal();
    directory.enroll(7, &mut enrolled).unwrap();
    assert!(directory.authenticate(7, &mut enrolled).unwrap());

    // A different card carrying a copied record still fails: the private
    // key never left the enrolled card
    let mut clone = Terminal::new(GymApplet::new().unwrap());
    clone.write(&an_nguyen()).unwrap();
    assert!(!directory.authenticate(7, &mut clone).unwrap());
}

#[test]
fn reset_write_rotates_the_identity() {
    let tmp = TempDir::new().unwrap();
    let mut directory = KeyDirectory::new(Some(tmp.path().join("keys.json")));

    let mut terminal = provisioned_terminal();
    directory.enroll(7, &mut terminal).unwrap();

    // Reset the card (UserID 0) and re-provision it for a new member
    terminal
        .write(&Provisioning {
            user_id: 0,
            pin: PIN.to_vec(),
            payload: MemberPayload::default(),
        })
        .unwrap();
    let mut provisioning = an_nguyen();
    provisioning.user_id = 8;
    terminal.write(&provisioning).unwrap();

    // The re-issued card cannot answer for the previous member
    assert!(!directory.authenticate(7, &mut terminal).unwrap());
}

#[test]
fn wrong_lengths_cost_nothing() {
    let mut terminal = provisioned_terminal();

    assert_eq!(terminal.verify_pin(b"1234"), Err(TerminalError::WrongLength));
    assert_eq!(
        terminal.read_public().unwrap().retry_counter,
        MAX_PIN_RETRY,
        "malformed commands must not spend a retry"
    );
}

#[test]
fn unknown_instruction_is_reported() {
    use gymcard::apdu::APDU;
    let mut applet = GymApplet::new().unwrap();
    let resp = applet.process(&APDU::new(0x00, 0xC3, 0x00, 0x00));
    assert_eq!(resp.sw(), SW::INS_NOT_SUPPORTED);
}
