//! SHA-256 utilities and constant-time comparison.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Constant-time equality for hashes and key material.
///
/// The early return on length mismatch is fine: lengths here (32-byte
/// digests, 6-digit codes) are public knowledge; the constant-time property
/// protects the values.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
