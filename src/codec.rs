//! Luhn checksum, HMAC-SHA256 tokenization, and base64url helpers.
//!
//! Grounded in the teacher's `privacy::redaction::luhn_check` and
//! `privacy::pseudonym`'s HMAC + base64url pipeline; generalized from a
//! one-off pseudonym id into the spec's deterministic per-type token
//! format.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Minimum HMAC key length the spec requires for tokenization.
pub const MIN_HMAC_KEY_LEN: usize = 32;

/// Standard mod-10 Luhn checksum over a string of decimal digits.
/// Non-digit characters are not expected by the caller; any such
/// character is ignored for the purposes of the running sum (callers
/// should strip separators before calling this).
pub fn luhn_check(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut alternate = false;
    let mut any_digit = false;

    for c in digits.chars().rev() {
        if let Some(mut digit) = c.to_digit(10) {
            any_digit = true;
            if alternate {
                digit *= 2;
                if digit > 9 {
                    digit -= 9;
                }
            }
            sum += digit;
            alternate = !alternate;
        }
    }

    any_digit && sum % 10 == 0
}

/// Encodes `bytes` as URL-safe, unpadded base64.
pub fn base64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes a URL-safe, unpadded base64 string.
pub fn base64url_decode(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::InputInvalid(format!("invalid base64url: {e}")))
}

/// Validates an HMAC key is long enough to be used for tokenization.
pub fn validate_hmac_key(key: &[u8]) -> Result<()> {
    if key.len() < MIN_HMAC_KEY_LEN {
        return Err(Error::ConfigInvalid(format!(
            "hmac_key must be at least {MIN_HMAC_KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok(())
}

/// Produces `TKN_<UPPER_TYPE>_<hex16>` where `hex16` is the first 8 bytes
/// of `HMAC-SHA256(key, type || ':' || value)` rendered as lowercase hex.
/// Deterministic: the same `(key, type, value)` always yields the same
/// token.
pub fn tokenize(key: &[u8], pii_type: &str, value: &str) -> Result<String> {
    validate_hmac_key(key)?;

    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| Error::ConfigInvalid(e.to_string()))?;
    mac.update(pii_type.as_bytes());
    mac.update(b":");
    mac.update(value.as_bytes());
    let digest = mac.finalize().into_bytes();

    let hex16: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    let upper_snake = pii_type.to_uppercase().replace(['-', ' '], "_");
    Ok(format!("TKN_{upper_snake}_{hex16}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_valid_visa_test_card() {
        assert!(luhn_check("4242424242424242"));
    }

    #[test]
    fn luhn_rejects_bad_checksum() {
        assert!(!luhn_check("4242424242424241"));
    }

    #[test]
    fn luhn_empty_is_false() {
        assert!(!luhn_check(""));
    }

    const KEY: &[u8] = b"thisisalongersecretkey123456789012";

    #[test]
    fn tokenize_is_deterministic() {
        let a = tokenize(KEY, "credit_card", "4242424242424242").unwrap();
        let b = tokenize(KEY, "credit_card", "4242424242424242").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("TKN_CREDIT_CARD_"));
        assert_eq!(a.len(), "TKN_CREDIT_CARD_".len() + 16);
    }

    #[test]
    fn tokenize_differs_by_value() {
        let a = tokenize(KEY, "credit_card", "4242424242424242").unwrap();
        let b = tokenize(KEY, "credit_card", "4111111111111111").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tokenize_differs_by_key() {
        let a = tokenize(KEY, "credit_card", "4242424242424242").unwrap();
        let other_key = b"anotherlongersecretkey1234567890ab";
        let b = tokenize(other_key, "credit_card", "4242424242424242").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tokenize_rejects_short_key() {
        let result = tokenize(b"too-short", "email", "a@b.com");
        assert!(result.is_err());
    }

    #[test]
    fn base64url_roundtrip() {
        let encoded = base64url_encode(b"hello world");
        let decoded = base64url_decode(&encoded).unwrap();
        assert_eq!(decoded, b"hello world");
    }
}
