use thiserror::Error;

use cofre_store::StoreError;

/// Authentication failures carry deliberately uniform messages: a caller
/// (or shoulder-surfer) learns nothing about which factor was closest.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid authentication code")]
    InvalidTotpCode,

    #[error("Invalid recovery key")]
    InvalidRecoveryKey,

    #[error("Operation not available in the current session state")]
    InvalidState,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<cofre_crypto::CryptoError> for AuthError {
    fn from(e: cofre_crypto::CryptoError) -> Self {
        AuthError::Store(StoreError::Crypto(e))
    }
}
