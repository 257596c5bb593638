//! Master credential record: salt, password hash, recovery-key hash and the
//! optional TOTP secret.
//!
//! Stored as a small versioned JSON document rather than a fixed-offset
//! binary blob, so optional-field presence is explicit instead of inferred
//! from file length. Rewrites go through a temp file + rename so a crash
//! mid-write cannot leave a truncated record.
//!
//! The password hash IS the PBKDF2 output that also serves as the vault
//! key (same derivation, same parameters), mirroring the interop format
//! this store inherits. `verify`/`recover` compare in constant time.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use cofre_crypto::hash::{ct_eq, sha256};
use cofre_crypto::kdf::{self, SALT_LEN};
use cofre_crypto::VaultKey;

use crate::error::StoreError;

const MASTER_VERSION: u32 = 1;

const B64: base64::engine::general_purpose::GeneralPurpose =
    base64::engine::general_purpose::URL_SAFE_NO_PAD;

#[derive(Debug, Serialize, Deserialize)]
struct MasterRecord {
    version: u32,
    /// Hex, 16 bytes.
    salt: String,
    /// Hex, 32 bytes — PBKDF2-HMAC-SHA256 output.
    password_hash: String,
    /// Hex, 32 bytes — SHA-256 of the one-time-shown recovery key.
    recovery_key_hash: String,
    /// Base32; present only after 2FA enrollment.
    #[serde(skip_serializing_if = "Option::is_none")]
    totp_secret: Option<String>,
}

/// Persistent store for the master record.
pub struct MasterStore {
    path: PathBuf,
}

impl MasterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// First-run initialisation. Generates the salt, hashes the password,
    /// and returns the recovery key — shown to the user exactly once, never
    /// persisted in plaintext.
    pub fn create(&self, password: &str) -> Result<String, StoreError> {
        if password.is_empty() {
            return Err(StoreError::Validation(
                "master password must not be empty".into(),
            ));
        }
        if self.exists() {
            return Err(StoreError::MasterExists);
        }

        let salt = kdf::generate_salt();
        let key = kdf::derive_key(password, &salt);

        let recovery_key = {
            use rand::RngCore;
            let mut raw = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut raw);
            B64.encode(raw)
        };

        let record = MasterRecord {
            version: MASTER_VERSION,
            salt: hex::encode(salt),
            password_hash: hex::encode(key.bytes()),
            recovery_key_hash: hex::encode(sha256(recovery_key.as_bytes())),
            totp_secret: None,
        };
        self.persist(&record)?;
        info!("[master] record created at {}", self.path.display());
        Ok(recovery_key)
    }

    /// Derive the vault key and verify the password in one pass. Returns
    /// `None` on mismatch (constant-time comparison).
    pub fn authenticate(&self, password: &str) -> Result<Option<VaultKey>, StoreError> {
        let record = self.load()?;
        let salt = decode_salt(&record.salt)?;
        let stored_hash = decode_hash(&record.password_hash)?;

        let key = kdf::derive_key(password, &salt);
        if ct_eq(key.bytes(), &stored_hash) {
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    /// Check the master password without handing out the key.
    pub fn verify(&self, password: &str) -> Result<bool, StoreError> {
        Ok(self.authenticate(password)?.is_some())
    }

    /// Record the TOTP secret after successful enrollment verification.
    /// Valid once per master record lifetime.
    pub fn enroll_totp(&self, secret_b32: &str) -> Result<(), StoreError> {
        let mut record = self.load()?;
        if record.totp_secret.is_some() {
            return Err(StoreError::TotpAlreadyEnrolled);
        }
        record.totp_secret = Some(secret_b32.to_owned());
        self.persist(&record)?;
        info!("[master] TOTP secret enrolled");
        Ok(())
    }

    pub fn has_totp(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.totp_secret.is_some())
    }

    pub fn totp_secret(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.totp_secret)
    }

    /// Recovery-key reset. On match the whole record is deleted — TOTP
    /// enrollment included — forcing a fresh `create`. On mismatch nothing
    /// changes.
    pub fn recover(&self, candidate_key: &str) -> Result<bool, StoreError> {
        let record = self.load()?;
        let stored = decode_hash(&record.recovery_key_hash)?;
        let candidate = sha256(candidate_key.trim().as_bytes());
        if !ct_eq(&candidate, &stored) {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        info!("[master] record deleted via recovery key");
        Ok(true)
    }

    fn load(&self) -> Result<MasterRecord, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::MasterMissing)
            }
            Err(e) => return Err(e.into()),
        };
        let record: MasterRecord = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::MasterCorrupt(e.to_string()))?;
        if record.version != MASTER_VERSION {
            return Err(StoreError::MasterCorrupt(format!(
                "unsupported version {}",
                record.version
            )));
        }
        Ok(record)
    }

    fn persist(&self, record: &MasterRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn decode_salt(hex_salt: &str) -> Result<[u8; SALT_LEN], StoreError> {
    let bytes = hex::decode(hex_salt).map_err(|e| StoreError::MasterCorrupt(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| StoreError::MasterCorrupt("salt has wrong length".into()))
}

fn decode_hash(hex_hash: &str) -> Result<[u8; 32], StoreError> {
    let bytes = hex::decode(hex_hash).map_err(|e| StoreError::MasterCorrupt(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| StoreError::MasterCorrupt("hash has wrong length".into()))
}
