//! One-time phone verification codes.
//!
//! Codes are six ASCII digits. Only an HMAC-SHA256 digest keyed by the
//! session secret and bound to the phone number is ever stored.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use ubuntu_lend_core::PhoneNumber;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

/// Failed attempts allowed before a code is dead.
pub const MAX_ATTEMPTS: i32 = 5;

/// Generate a random 6-digit code. Leading zeros are kept.
#[must_use]
pub fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{code:06}")
}

/// Check that `code` is exactly six ASCII digits, ignoring surrounding whitespace.
///
/// # Errors
///
/// Returns `AuthError::InvalidCodeFormat` otherwise.
pub fn parse_code(code: &str) -> Result<&str, AuthError> {
    let code = code.trim();
    if code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code)
    } else {
        Err(AuthError::InvalidCodeFormat)
    }
}

/// Hex digest of `code` for `phone`.
#[must_use]
pub fn digest(secret: &[u8], phone: &PhoneNumber, code: &str) -> String {
    hex::encode(mac(secret, phone, code).finalize().into_bytes())
}

/// Compare `code` against a stored digest in constant time.
#[must_use]
pub fn verify(secret: &[u8], phone: &PhoneNumber, code: &str, stored_digest: &str) -> bool {
    let Ok(expected) = hex::decode(stored_digest) else {
        return false;
    };
    mac(secret, phone, code).verify_slice(&expected).is_ok()
}

fn mac(secret: &[u8], phone: &PhoneNumber, code: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(phone.as_str().as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    mac
}
