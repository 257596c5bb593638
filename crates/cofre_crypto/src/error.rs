use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Token encryption failed")]
    TokenEncrypt,

    #[error("Token authentication failed (tampering, corruption, or wrong key)")]
    TokenIntegrity,

    #[error("Invalid TOTP secret: {0}")]
    InvalidTotpSecret(String),
}
