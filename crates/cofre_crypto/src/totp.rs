//! RFC 6238 time-based one-time passwords.
//!
//! 30-second step, HMAC-SHA1, 6 digits — the parameters every common
//! authenticator app assumes. Verification accepts the current step and the
//! two adjacent ones to tolerate clock skew.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::ct_eq;

pub const STEP_SECS: u64 = 30;
pub const DIGITS: usize = 6;

const B32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// A TOTP generator/verifier over a shared base32 secret.
pub struct Totp {
    key: Zeroizing<Vec<u8>>,
    secret_b32: Zeroizing<String>,
}

impl Totp {
    /// Parse a base32 secret (padding optional, case-insensitive).
    pub fn new(secret_b32: &str) -> Result<Self, CryptoError> {
        let normalised = secret_b32.trim().trim_end_matches('=').to_ascii_uppercase();
        if normalised.is_empty() {
            return Err(CryptoError::InvalidTotpSecret("empty secret".into()));
        }
        let key = base32::decode(B32, &normalised).ok_or_else(|| {
            CryptoError::InvalidTotpSecret("secret must be base32 (A-Z, 2-7)".into())
        })?;
        Ok(Self {
            key: Zeroizing::new(key),
            secret_b32: Zeroizing::new(normalised),
        })
    }

    /// Generate a fresh random 160-bit secret.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = Zeroizing::new(vec![0u8; 20]);
        rand::rngs::OsRng.fill_bytes(&mut key);
        let secret_b32 = Zeroizing::new(base32::encode(B32, &key));
        Self { key, secret_b32 }
    }

    /// The base32 form, as shown to the user / stored at enrollment.
    pub fn secret_base32(&self) -> &str {
        &self.secret_b32
    }

    /// The 6-digit code for the step containing `unix_time`.
    pub fn code_at(&self, unix_time: u64) -> String {
        self.code_for_step(unix_time / STEP_SECS)
    }

    /// The current code.
    pub fn current_code(&self) -> String {
        self.code_at(now_unix())
    }

    /// Verify `code` against the step containing `unix_time` plus the
    /// adjacent step on either side.
    pub fn verify_at(&self, code: &str, unix_time: u64) -> bool {
        let code = code.trim();
        if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let step = unix_time / STEP_SECS;
        let mut valid = false;
        for candidate in step.saturating_sub(1)..=step + 1 {
            // No early exit: each window gets a constant-time compare.
            valid |= ct_eq(self.code_for_step(candidate).as_bytes(), code.as_bytes());
        }
        valid
    }

    /// Verify against the current clock.
    pub fn verify(&self, code: &str) -> bool {
        self.verify_at(code, now_unix())
    }

    /// `otpauth://` provisioning URI, rendered externally as a QR code.
    pub fn provisioning_uri(&self, issuer: &str, account: &str) -> String {
        format!(
            "otpauth://totp/{issuer}:{account}?secret={}&issuer={issuer}",
            &*self.secret_b32
        )
    }

    fn code_for_step(&self, step: u64) -> String {
        let mut mac =
            Hmac::<Sha1>::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(&step.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation (RFC 4226 §5.3).
        let offset = (digest[19] & 0x0f) as usize;
        let bin = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        format!("{:06}", bin % 1_000_000)
    }
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B secret: ASCII "12345678901234567890".
    const RFC_SECRET_B32: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn rfc6238_test_vectors() {
        let totp = Totp::new(RFC_SECRET_B32).unwrap();
        // Low-order six digits of the RFC's 8-digit SHA-1 vectors.
        assert_eq!(totp.code_at(59), "287082");
        assert_eq!(totp.code_at(1_111_111_109), "081804");
        assert_eq!(totp.code_at(1_234_567_890), "005924");
        assert_eq!(totp.code_at(2_000_000_000), "279037");
    }

    #[test]
    fn verifies_within_one_step() {
        let totp = Totp::new(RFC_SECRET_B32).unwrap();
        let t = 1_234_567_890;
        let code = totp.code_at(t);
        assert!(totp.verify_at(&code, t));
        assert!(totp.verify_at(&code, t + STEP_SECS));
        assert!(totp.verify_at(&code, t - STEP_SECS));
        assert!(!totp.verify_at(&code, t + 3 * STEP_SECS));
    }

    #[test]
    fn code_from_different_secret_never_verifies() {
        let a = Totp::generate();
        let b = Totp::generate();
        let t = 1_700_000_000;
        assert!(!b.verify_at(&a.code_at(t), t));
    }

    #[test]
    fn rejects_malformed_codes() {
        let totp = Totp::new(RFC_SECRET_B32).unwrap();
        assert!(!totp.verify_at("28708", 59));
        assert!(!totp.verify_at("28708x", 59));
        assert!(!totp.verify_at("", 59));
    }

    #[test]
    fn base32_is_normalised() {
        let padded = Totp::new("gezdgnbvgy3tqojqgezdgnbvgy3tqojq==").unwrap();
        assert_eq!(padded.code_at(59), "287082");
        assert_eq!(padded.secret_base32(), RFC_SECRET_B32);
    }

    #[test]
    fn invalid_secret_is_rejected() {
        assert!(matches!(
            Totp::new("not base32 !"),
            Err(CryptoError::InvalidTotpSecret(_))
        ));
        assert!(matches!(
            Totp::new(""),
            Err(CryptoError::InvalidTotpSecret(_))
        ));
    }

    #[test]
    fn provisioning_uri_shape() {
        let totp = Totp::new(RFC_SECRET_B32).unwrap();
        assert_eq!(
            totp.provisioning_uri("Cofre", "vault"),
            format!("otpauth://totp/Cofre:vault?secret={RFC_SECRET_B32}&issuer=Cofre")
        );
    }

    #[test]
    fn generated_secret_round_trips() {
        let totp = Totp::generate();
        let reparsed = Totp::new(totp.secret_base32()).unwrap();
        assert_eq!(totp.code_at(59), reparsed.code_at(59));
    }
}
