//! Key derivation
//!
//! `derive_key` — PBKDF2-HMAC-SHA256 (100 000 rounds), derives the 32-byte
//! key that encrypts every stored credential field. Deterministic: the same
//! `(password, salt)` pair always yields the same key, so the stored master
//! hash and the live vault key come from one derivation.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

pub const PBKDF2_ROUNDS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// 32-byte vault key derived from the master password. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct VaultKey(pub(crate) [u8; KEY_LEN]);

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Derive the vault key from the master password + 16-byte salt.
/// The salt is stored alongside the master record (not secret).
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> VaultKey {
    let mut output = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut output);
    VaultKey(output)
}

/// Generate a fresh random 16-byte salt (call once on first run).
pub fn generate_salt() -> [u8; SALT_LEN] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key("correct horse", &salt);
        let b = derive_key("correct horse", &salt);
        assert_eq!(a.bytes(), b.bytes());
    }

    #[test]
    fn different_salts_yield_independent_keys() {
        let a = derive_key("correct horse", &[1u8; SALT_LEN]);
        let b = derive_key("correct horse", &[2u8; SALT_LEN]);
        assert_ne!(a.bytes(), b.bytes());
    }

    #[test]
    fn different_passwords_yield_independent_keys() {
        let salt = [9u8; SALT_LEN];
        let a = derive_key("alpha", &salt);
        let b = derive_key("beta", &salt);
        assert_ne!(a.bytes(), b.bytes());
    }

    #[test]
    fn generated_salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
