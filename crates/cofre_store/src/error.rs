use thiserror::Error;

use crate::models::ReuseMatch;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Vault is locked — unlock with the master password first")]
    VaultLocked,

    #[error("Crypto error: {0}")]
    Crypto(#[from] cofre_crypto::CryptoError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("No master record — initialise the vault first")]
    MasterMissing,

    #[error("Master record already exists")]
    MasterExists,

    #[error("Master record is corrupt or unreadable: {0}")]
    MasterCorrupt(String),

    #[error("A TOTP secret is already enrolled for this master record")]
    TotpAlreadyEnrolled,

    #[error("Secret is already in use at {} existing location(s)", .0.len())]
    SecretReused(Vec<ReuseMatch>),

    #[error("Migration error: {0}")]
    Migration(String),
}
