//! Vault: in-memory key material unlocked by the master password.
//!
//! Holds the 32-byte credential encryption key while the session is
//! unlocked. Locking (explicit logout or idle timeout) zeroizes the key;
//! after that every `with_key` call fails with `VaultLocked`, so a stale
//! handle can never decrypt anything.
//!
//! Idle lockout: any key access or explicit `touch` resets the activity
//! clock; `check_idle` (driven once per second by the session layer) locks
//! once inactivity reaches the timeout. 180 seconds by default.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use zeroize::ZeroizeOnDrop;

use cofre_crypto::VaultKey;

use crate::error::StoreError;

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(ZeroizeOnDrop)]
struct VaultInner {
    key: [u8; 32],
    #[zeroize(skip)]
    last_activity: Instant,
}

/// Thread-safe vault handle. Clone to share with the record store.
#[derive(Clone)]
pub struct Vault {
    inner: Arc<RwLock<Option<VaultInner>>>,
    idle_timeout: Duration,
}

impl Vault {
    pub fn new() -> Self {
        Self::with_idle_timeout(IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Take ownership of a freshly derived key and mark the vault unlocked.
    pub async fn unlock(&self, key: VaultKey) {
        let mut guard = self.inner.write().await;
        *guard = Some(VaultInner {
            key: *key.bytes(),
            last_activity: Instant::now(),
        });
    }

    /// Lock the vault — zeroizes the key.
    pub async fn lock(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }

    pub async fn is_locked(&self) -> bool {
        self.inner.read().await.is_none()
    }

    /// Record user activity (resets the idle clock).
    pub async fn touch(&self) {
        let mut guard = self.inner.write().await;
        if let Some(ref mut inner) = *guard {
            inner.last_activity = Instant::now();
        }
    }

    /// How long the vault has been idle, if unlocked.
    pub async fn idle_for(&self) -> Option<Duration> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|inner| inner.last_activity.elapsed())
    }

    /// Lock if the idle timeout has elapsed. Returns true when this call
    /// performed the lock.
    pub async fn check_idle(&self) -> bool {
        let mut guard = self.inner.write().await;
        match guard.as_ref() {
            Some(inner) if inner.last_activity.elapsed() >= self.idle_timeout => {
                *guard = None;
                true
            }
            _ => false,
        }
    }

    /// Access the raw key for an encrypt/decrypt operation. Fails when the
    /// vault is locked or the idle timeout has already expired. Touches the
    /// activity clock.
    pub async fn with_key<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&[u8; 32]) -> Result<R, StoreError>,
    {
        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(inner) if inner.last_activity.elapsed() >= self.idle_timeout => {
                *guard = None;
                Err(StoreError::VaultLocked)
            }
            Some(inner) => {
                inner.last_activity = Instant::now();
                f(&inner.key)
            }
            None => Err(StoreError::VaultLocked),
        }
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}
