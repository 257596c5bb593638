//! cofre_crypto — cryptographic primitives for the cofre credential vault
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Decryption NEVER yields unauthenticated plaintext: any tag, shape or
//!   version failure is a single `TokenIntegrity` error.
//!
//! # Module layout
//! - `kdf`   — PBKDF2-HMAC-SHA256 master-key derivation
//! - `token` — versioned XChaCha20-Poly1305 token envelope
//! - `hash`  — SHA-256 + constant-time comparison
//! - `totp`  — RFC 6238 time-based one-time codes
//! - `error` — unified error type

pub mod error;
pub mod hash;
pub mod kdf;
pub mod token;
pub mod totp;

pub use error::CryptoError;
pub use kdf::VaultKey;
