//! Database row models and their decrypted views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw credentials row — encrypted columns carry `_enc` suffixes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub id: i64,
    pub url_enc: String,
    pub username_enc: String,
    pub secret_enc: String,
    pub notes_enc: Option<String>,
    pub category_enc: Option<String>,
    pub totp_secret_enc: Option<String>,
    pub last_changed: DateTime<Utc>,
    pub expiry_days: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub record_id: i64,
    pub old_secret_enc: String,
    pub timestamp: DateTime<Utc>,
}

/// Input for create/update. Optional fields left `None` are stored NULL.
#[derive(Debug, Clone)]
pub struct CredentialInput {
    pub url: String,
    pub username: String,
    pub secret: String,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub totp_secret: Option<String>,
    /// −1 = never expires, otherwise a positive day count.
    pub expiry_days: i64,
}

/// A fully decrypted record, as loaded for editing.
#[derive(Debug)]
pub struct Credential {
    pub id: i64,
    pub url: String,
    pub username: String,
    pub secret: String,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub totp_secret: Option<String>,
    pub last_changed: DateTime<Utc>,
    pub expiry_days: i64,
}

/// One row of `list` output — everything the overview table needs, secret
/// excluded.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialListing {
    pub id: i64,
    pub url: String,
    pub username: String,
    pub category: Option<String>,
    pub last_changed: DateTime<Utc>,
    pub expiry_days: i64,
    pub expired: bool,
}

/// A decrypted history entry for one record.
#[derive(Debug)]
pub struct HistoryEntry {
    pub id: i64,
    pub secret: String,
    pub timestamp: DateTime<Utc>,
}

/// Where a to-be-saved secret is already in use.
#[derive(Debug, Clone)]
pub struct ReuseMatch {
    pub record_id: i64,
    pub url: String,
    pub username: String,
    /// True when the match came from the record's own password history.
    pub from_history: bool,
}

/// Result of `strength_audit`.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub total: usize,
    pub weak: Vec<i64>,
    pub expired: Vec<i64>,
}

impl AuditReport {
    pub fn weak_count(&self) -> usize {
        self.weak.len()
    }

    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }
}

/// One record inside the encrypted export blob.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportEntry {
    pub url: String,
    pub username: String,
    pub secret: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub totp_secret: Option<String>,
}

/// Whether a record has expired relative to `now`.
pub fn is_expired(expiry_days: i64, last_changed: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiry_days != -1 && now > last_changed + chrono::Duration::days(expiry_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundaries() {
        let now = Utc::now();
        let days = |n: i64| now - chrono::Duration::days(n);

        assert!(is_expired(30, days(31), now));
        assert!(!is_expired(30, days(29), now));
        assert!(!is_expired(30, days(30), now)); // exactly at the boundary
        assert!(!is_expired(-1, days(10_000), now));
    }
}
