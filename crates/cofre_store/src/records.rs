//! Encrypted credential CRUD with history, expiry, audit and export.
//!
//! Every sensitive field is encrypted independently under the vault key, so
//! a single record read never decrypts more than the caller asked for.
//! Bulk operations (`list`, `strength_audit`, `export`) abort on the first
//! decrypt failure — partial corruption must surface, not be skipped over.

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use cofre_crypto::totp::Totp;

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{
    is_expired, AuditReport, Credential, CredentialInput, CredentialListing, CredentialRow,
    ExportEntry, HistoryEntry, HistoryRow, ReuseMatch,
};
use crate::strength;

/// Fixed expiry applied to imported records.
pub const IMPORT_EXPIRY_DAYS: i64 = 180;

impl Store {
    /// Insert a new credential. `accept_reused_secret` bypasses the reuse
    /// warning after the user has confirmed it.
    pub async fn create_credential(
        &self,
        input: &CredentialInput,
        accept_reused_secret: bool,
    ) -> Result<i64, StoreError> {
        validate(input)?;
        if !accept_reused_secret {
            let matches = self.secret_reuse(None, &input.secret).await?;
            if !matches.is_empty() {
                warn!("[records] create blocked pending reuse confirmation");
                return Err(StoreError::SecretReused(matches));
            }
        }

        let url_enc = self.encrypt_field(&input.url).await?;
        let username_enc = self.encrypt_field(&input.username).await?;
        let secret_enc = self.encrypt_field(&input.secret).await?;
        let notes_enc = self.encrypt_optional_field(input.notes.as_deref()).await?;
        let category_enc = self.encrypt_optional_field(input.category.as_deref()).await?;
        let totp_enc = self
            .encrypt_optional_field(input.totp_secret.as_deref())
            .await?;

        let result = sqlx::query(
            "INSERT INTO credentials \
             (url_enc, username_enc, secret_enc, notes_enc, category_enc, totp_secret_enc, last_changed, expiry_days) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&url_enc)
        .bind(&username_enc)
        .bind(&secret_enc)
        .bind(&notes_enc)
        .bind(&category_enc)
        .bind(&totp_enc)
        .bind(Utc::now())
        .bind(input.expiry_days)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!("[records] created credential id={id}");
        Ok(id)
    }

    /// Overwrite a credential. The previous encrypted secret is appended to
    /// the history table inside the same transaction as the overwrite, so a
    /// crash can neither lose the old secret nor duplicate the entry.
    pub async fn update_credential(
        &self,
        id: i64,
        input: &CredentialInput,
        accept_reused_secret: bool,
    ) -> Result<(), StoreError> {
        validate(input)?;
        if !accept_reused_secret {
            let matches = self.secret_reuse(Some(id), &input.secret).await?;
            if !matches.is_empty() {
                warn!("[records] update of id={id} blocked pending reuse confirmation");
                return Err(StoreError::SecretReused(matches));
            }
        }

        let old_secret_enc: Option<(String,)> =
            sqlx::query_as("SELECT secret_enc FROM credentials WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let (old_secret_enc,) = old_secret_enc.ok_or(StoreError::NotFound(id))?;

        let url_enc = self.encrypt_field(&input.url).await?;
        let username_enc = self.encrypt_field(&input.username).await?;
        let secret_enc = self.encrypt_field(&input.secret).await?;
        let notes_enc = self.encrypt_optional_field(input.notes.as_deref()).await?;
        let category_enc = self.encrypt_optional_field(input.category.as_deref()).await?;
        let totp_enc = self
            .encrypt_optional_field(input.totp_secret.as_deref())
            .await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO credential_history (record_id, old_secret_enc, timestamp) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(&old_secret_enc)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE credentials SET url_enc = ?, username_enc = ?, secret_enc = ?, notes_enc = ?, \
             category_enc = ?, totp_secret_enc = ?, last_changed = ?, expiry_days = ? WHERE id = ?",
        )
        .bind(&url_enc)
        .bind(&username_enc)
        .bind(&secret_enc)
        .bind(&notes_enc)
        .bind(&category_enc)
        .bind(&totp_enc)
        .bind(now)
        .bind(input.expiry_days)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("[records] updated credential id={id}");
        Ok(())
    }

    /// Delete a credential; its history rows go with it (FK cascade).
    pub async fn delete_credential(&self, id: i64) -> Result<(), StoreError> {
        self.ensure_unlocked().await?;
        let result = sqlx::query("DELETE FROM credentials WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!("[records] deleted credential id={id}");
        Ok(())
    }

    /// Load one record fully decrypted (the edit view).
    pub async fn get_credential(&self, id: i64) -> Result<Credential, StoreError> {
        let row: Option<CredentialRow> =
            sqlx::query_as("SELECT * FROM credentials WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let row = row.ok_or(StoreError::NotFound(id))?;

        Ok(Credential {
            id: row.id,
            url: self.decrypt_field(&row.url_enc).await?.to_string(),
            username: self.decrypt_field(&row.username_enc).await?.to_string(),
            secret: self.decrypt_field(&row.secret_enc).await?.to_string(),
            notes: self.decrypt_optional(row.notes_enc.as_deref()).await?,
            category: self.decrypt_optional(row.category_enc.as_deref()).await?,
            totp_secret: self
                .decrypt_optional(row.totp_secret_enc.as_deref())
                .await?,
            last_changed: row.last_changed,
            expiry_days: row.expiry_days,
        })
    }

    /// Overview listing: case-insensitive substring search over decrypted
    /// URL, username and category, with the expiry flag computed per row.
    pub async fn list(&self, search_term: &str) -> Result<Vec<CredentialListing>, StoreError> {
        self.ensure_unlocked().await?;
        let rows: Vec<CredentialRow> =
            sqlx::query_as("SELECT * FROM credentials ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let term = search_term.to_lowercase();
        let now = Utc::now();
        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let url = self.decrypt_field(&row.url_enc).await?.to_string();
            let username = self.decrypt_field(&row.username_enc).await?.to_string();
            let category = self.decrypt_optional(row.category_enc.as_deref()).await?;

            let matches = term.is_empty()
                || url.to_lowercase().contains(&term)
                || username.to_lowercase().contains(&term)
                || category
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&term));
            if !matches {
                continue;
            }

            listings.push(CredentialListing {
                id: row.id,
                expired: is_expired(row.expiry_days, row.last_changed, now),
                url,
                username,
                category,
                last_changed: row.last_changed,
                expiry_days: row.expiry_days,
            });
        }
        Ok(listings)
    }

    /// Prior secrets for one record, oldest first.
    pub async fn history(&self, id: i64) -> Result<Vec<HistoryEntry>, StoreError> {
        self.ensure_unlocked().await?;
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT * FROM credential_history WHERE record_id = ? ORDER BY timestamp, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(HistoryEntry {
                id: row.id,
                secret: self.decrypt_field(&row.old_secret_enc).await?.to_string(),
                timestamp: row.timestamp,
            });
        }
        Ok(entries)
    }

    /// Current RFC 6238 code for a record's stored TOTP secret.
    pub async fn totp_code(&self, id: i64) -> Result<String, StoreError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT totp_secret_enc FROM credentials WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let (totp_enc,) = row.ok_or(StoreError::NotFound(id))?;
        let totp_enc = totp_enc.ok_or_else(|| {
            StoreError::Validation("this entry has no TOTP secret".into())
        })?;

        let secret = self.decrypt_field(&totp_enc).await?;
        let totp = Totp::new(&secret)?;
        Ok(totp.current_code())
    }

    /// Find existing uses of `secret`: every other record's current secret,
    /// plus — when updating — the record's own password history. O(n)
    /// decrypt sweep; fine at personal-vault sizes.
    pub async fn secret_reuse(
        &self,
        updating_id: Option<i64>,
        secret: &str,
    ) -> Result<Vec<ReuseMatch>, StoreError> {
        self.ensure_unlocked().await?;
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, url_enc, username_enc, secret_enc FROM credentials ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::new();
        for (id, url_enc, username_enc, secret_enc) in rows {
            if updating_id == Some(id) {
                // The record's own history counts; its current secret is the
                // one being replaced.
                let history: Vec<(String,)> = sqlx::query_as(
                    "SELECT old_secret_enc FROM credential_history WHERE record_id = ?",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
                for (old_enc,) in history {
                    if *self.decrypt_field(&old_enc).await? == secret {
                        matches.push(ReuseMatch {
                            record_id: id,
                            url: self.decrypt_field(&url_enc).await?.to_string(),
                            username: self.decrypt_field(&username_enc).await?.to_string(),
                            from_history: true,
                        });
                        break;
                    }
                }
                continue;
            }

            if *self.decrypt_field(&secret_enc).await? == secret {
                matches.push(ReuseMatch {
                    record_id: id,
                    url: self.decrypt_field(&url_enc).await?.to_string(),
                    username: self.decrypt_field(&username_enc).await?.to_string(),
                    from_history: false,
                });
            }
        }
        Ok(matches)
    }

    /// Decrypt and score every secret; read-only.
    pub async fn strength_audit(&self) -> Result<AuditReport, StoreError> {
        self.ensure_unlocked().await?;
        let rows: Vec<CredentialRow> =
            sqlx::query_as("SELECT * FROM credentials ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let now = Utc::now();
        let mut report = AuditReport {
            total: rows.len(),
            ..Default::default()
        };
        for row in rows {
            let secret = self.decrypt_field(&row.secret_enc).await?;
            if strength::score(&secret) < strength::WEAK_THRESHOLD {
                report.weak.push(row.id);
            }
            if is_expired(row.expiry_days, row.last_changed, now) {
                report.expired.push(row.id);
            }
        }
        Ok(report)
    }

    /// Export every record, decrypted, as one JSON array re-encrypted into a
    /// single token written to `path`. Returns the record count.
    pub async fn export(&self, path: &Path) -> Result<usize, StoreError> {
        let rows: Vec<CredentialRow> =
            sqlx::query_as("SELECT * FROM credentials ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(ExportEntry {
                url: self.decrypt_field(&row.url_enc).await?.to_string(),
                username: self.decrypt_field(&row.username_enc).await?.to_string(),
                secret: self.decrypt_field(&row.secret_enc).await?.to_string(),
                notes: self.decrypt_optional(row.notes_enc.as_deref()).await?,
                category: self.decrypt_optional(row.category_enc.as_deref()).await?,
                totp_secret: self
                    .decrypt_optional(row.totp_secret_enc.as_deref())
                    .await?,
            });
        }

        let payload = serde_json::to_vec(&entries)?;
        let token = self
            .vault
            .with_key(|key| {
                cofre_crypto::token::encrypt(key, &payload).map_err(StoreError::Crypto)
            })
            .await?;
        // Temp file + rename: a crash mid-write must not leave a truncated
        // backup behind.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, token)?;
        std::fs::rename(&tmp, path)?;
        info!("[records] exported {} records to {}", entries.len(), path.display());
        Ok(entries.len())
    }

    /// Import records from an export file, re-encrypting every field under
    /// the current key. Records are appended as new — no merge, no dedup —
    /// with a fixed default expiry.
    pub async fn import(&self, path: &Path) -> Result<usize, StoreError> {
        let token = std::fs::read_to_string(path)?;
        let payload = self
            .vault
            .with_key(|key| {
                cofre_crypto::token::decrypt(key, token.trim()).map_err(StoreError::Crypto)
            })
            .await?;
        let entries: Vec<ExportEntry> = serde_json::from_slice(&payload)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            let url_enc = self.encrypt_field(&entry.url).await?;
            let username_enc = self.encrypt_field(&entry.username).await?;
            let secret_enc = self.encrypt_field(&entry.secret).await?;
            let notes_enc = self.encrypt_optional_field(entry.notes.as_deref()).await?;
            let category_enc = self
                .encrypt_optional_field(entry.category.as_deref())
                .await?;
            let totp_enc = self
                .encrypt_optional_field(entry.totp_secret.as_deref())
                .await?;

            sqlx::query(
                "INSERT INTO credentials \
                 (url_enc, username_enc, secret_enc, notes_enc, category_enc, totp_secret_enc, last_changed, expiry_days) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&url_enc)
            .bind(&username_enc)
            .bind(&secret_enc)
            .bind(&notes_enc)
            .bind(&category_enc)
            .bind(&totp_enc)
            .bind(now)
            .bind(IMPORT_EXPIRY_DAYS)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("[records] imported {} records from {}", entries.len(), path.display());
        Ok(entries.len())
    }

    /// Empty or missing optional fields are stored as NULL.
    async fn encrypt_optional_field(
        &self,
        value: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        match value {
            Some(v) if !v.is_empty() => Ok(Some(self.encrypt_field(v).await?)),
            _ => Ok(None),
        }
    }
}

fn validate(input: &CredentialInput) -> Result<(), StoreError> {
    if input.url.is_empty() {
        return Err(StoreError::Validation("url must not be empty".into()));
    }
    if input.username.is_empty() {
        return Err(StoreError::Validation("username must not be empty".into()));
    }
    if input.secret.is_empty() {
        return Err(StoreError::Validation("secret must not be empty".into()));
    }
    if input.expiry_days != -1 && input.expiry_days <= 0 {
        return Err(StoreError::Validation(
            "expiry_days must be -1 or a positive day count".into(),
        ));
    }
    Ok(())
}
