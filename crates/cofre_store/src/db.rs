//! Database abstraction over SQLite via sqlx.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use zeroize::Zeroizing;

use crate::error::StoreError;
use crate::vault::Vault;

/// Central store handle. Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
    pub vault: Vault,
}

impl Store {
    /// Open (or create) the SQLite database at `db_path` and run pending
    /// migrations.
    ///
    /// WAL journal mode and foreign-key enforcement are configured at
    /// connection time, not inside a migration — SQLite forbids changing
    /// `journal_mode` inside a transaction and sqlx wraps every migration
    /// in one. Foreign keys must be on for history cascade deletion.
    pub async fn open(db_path: &Path, vault: Vault) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self { pool, vault })
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Fail fast when the vault is locked or its idle timeout has expired.
    /// Record operations call this up front so a locked vault rejects them
    /// even when no row would need decryption.
    pub(crate) async fn ensure_unlocked(&self) -> Result<(), StoreError> {
        self.vault.with_key(|_| Ok(())).await
    }

    /// Encrypt a plaintext field with the vault key.
    pub async fn encrypt_field(&self, plaintext: &str) -> Result<String, StoreError> {
        self.vault
            .with_key(|key| {
                cofre_crypto::token::encrypt(key, plaintext.as_bytes()).map_err(StoreError::Crypto)
            })
            .await
    }

    /// Decrypt a vault-encrypted field back to text.
    pub async fn decrypt_field(&self, token: &str) -> Result<Zeroizing<String>, StoreError> {
        let plaintext = self
            .vault
            .with_key(|key| cofre_crypto::token::decrypt(key, token).map_err(StoreError::Crypto))
            .await?;
        let text = String::from_utf8(plaintext.to_vec())
            .map_err(|_| StoreError::Crypto(cofre_crypto::CryptoError::TokenIntegrity))?;
        Ok(Zeroizing::new(text))
    }

    /// Decrypt an optional column; NULL stays None.
    pub async fn decrypt_optional(
        &self,
        token: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        match token {
            Some(token) => Ok(Some(self.decrypt_field(token).await?.to_string())),
            None => Ok(None),
        }
    }
}
