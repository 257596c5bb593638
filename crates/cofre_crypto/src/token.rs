//! Versioned authenticated-encryption token envelope
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce). Key: 32 bytes. Nonce: 24 bytes
//! (random). Tag: 16 bytes.
//!
//! Token format (before base64url-no-pad encoding):
//!   [ version (1 byte) | nonce (24 bytes) | ciphertext + tag ]
//!
//! The version byte is authenticated as associated data together with a
//! fixed domain string, so a token from a future format version fails the
//! tag check rather than decrypting to garbage.

use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    XChaCha20Poly1305,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::kdf::KEY_LEN;

pub const TOKEN_VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const DOMAIN: &[u8] = b"cofre-token";

const B64: base64::engine::general_purpose::GeneralPurpose =
    base64::engine::general_purpose::URL_SAFE_NO_PAD;

fn aad(version: u8) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[..11].copy_from_slice(DOMAIN);
    out[11] = version;
    out
}

/// Encrypt `plaintext` under the vault key, returning an opaque token string.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::TokenEncrypt)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: plaintext,
                aad: &aad(TOKEN_VERSION),
            },
        )
        .map_err(|_| CryptoError::TokenEncrypt)?;

    let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    raw.push(TOKEN_VERSION);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(B64.encode(raw))
}

/// Decrypt a token string. Every failure mode — bad encoding, truncation,
/// unknown version, tag mismatch — is reported as `TokenIntegrity`.
pub fn decrypt(key: &[u8; KEY_LEN], token: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let raw = B64.decode(token).map_err(|_| CryptoError::TokenIntegrity)?;
    if raw.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::TokenIntegrity);
    }
    let version = raw[0];
    if version != TOKEN_VERSION {
        return Err(CryptoError::TokenIntegrity);
    }
    let (nonce_bytes, ct) = raw[1..].split_at(NONCE_LEN);
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::TokenIntegrity)?;
    let plaintext = cipher
        .decrypt(
            nonce,
            chacha20poly1305::aead::Payload {
                msg: ct,
                aad: &aad(version),
            },
        )
        .map_err(|_| CryptoError::TokenIntegrity)?;

    Ok(Zeroizing::new(plaintext))
}
