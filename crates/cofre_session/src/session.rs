//! The login / two-factor / lockout state machine.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use cofre_crypto::totp::Totp;
use cofre_crypto::VaultKey;
use cofre_store::{MasterStore, Store, StoreError, Vault};

use crate::error::AuthError;

/// What the caller must supply next after a correct master password.
#[derive(Debug)]
pub enum Challenge {
    /// No TOTP enrolled yet: render the URI as a QR code and confirm one
    /// code to finish enrollment. The secret is persisted only after that
    /// confirmation succeeds, so closing mid-enrollment cannot brick login.
    EnrollTwoFactor { provisioning_uri: String },
    /// TOTP enrolled: supply the current code.
    TotpCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    AwaitingTwoFactor,
    Unlocked,
}

/// Key custody between password check and two-factor confirmation.
/// `VaultKey` and the TOTP secret both zeroize on drop, so discarding a
/// `Pending` (logout, recovery, failed enrollment, expiry) destroys the
/// material. An abandoned two-factor prompt expires on the same idle
/// interval as an unlocked vault.
struct Pending {
    key: VaultKey,
    totp: Totp,
    enrolling: bool,
    started: Instant,
}

/// Owns the live authentication state. Clone freely; clones share state.
#[derive(Clone)]
pub struct Session {
    master: Arc<MasterStore>,
    vault: Vault,
    pending: Arc<Mutex<Option<Pending>>>,
    store: Arc<Mutex<Option<Store>>>,
    issuer: String,
    account: String,
}

impl Session {
    pub fn new(
        master: MasterStore,
        issuer: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self::with_vault(master, Vault::new(), issuer, account)
    }

    /// Inject a pre-configured vault (e.g. a non-default idle timeout).
    pub fn with_vault(
        master: MasterStore,
        vault: Vault,
        issuer: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            master: Arc::new(master),
            vault,
            pending: Arc::new(Mutex::new(None)),
            store: Arc::new(Mutex::new(None)),
            issuer: issuer.into(),
            account: account.into(),
        }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// True on first run, before `create_master`.
    pub fn needs_initialisation(&self) -> bool {
        !self.master.exists()
    }

    pub async fn state(&self) -> LockState {
        self.expire_stale_pending().await;
        if self.pending.lock().await.is_some() {
            LockState::AwaitingTwoFactor
        } else if !self.vault.is_locked().await {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }

    /// First-run setup. Returns the recovery key — show it once, then it is
    /// gone. The session stays locked; unlocking goes through `login`.
    pub async fn create_master(&self, password: &str) -> Result<String, AuthError> {
        if self.state().await != LockState::Locked {
            return Err(AuthError::InvalidState);
        }
        let recovery_key = self.master.create(password)?;
        info!("[session] master record initialised");
        Ok(recovery_key)
    }

    /// Password check. On success the derived key is held pending until the
    /// second factor confirms. The error for a wrong password is identical
    /// whether or not TOTP is enrolled.
    pub async fn login(&self, password: &str) -> Result<Challenge, AuthError> {
        if self.state().await != LockState::Locked {
            return Err(AuthError::InvalidState);
        }

        let key = match self.master.authenticate(password)? {
            Some(key) => key,
            None => {
                warn!("[session] login rejected: bad master password");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let (pending, challenge) = match self.master.totp_secret()? {
            Some(secret) => {
                let totp = Totp::new(&secret)?;
                (
                    Pending {
                        key,
                        totp,
                        enrolling: false,
                        started: Instant::now(),
                    },
                    Challenge::TotpCode,
                )
            }
            None => {
                let totp = Totp::generate();
                let provisioning_uri = totp.provisioning_uri(&self.issuer, &self.account);
                info!("[session] password accepted — two-factor enrollment required");
                (
                    Pending {
                        key,
                        totp,
                        enrolling: true,
                        started: Instant::now(),
                    },
                    Challenge::EnrollTwoFactor { provisioning_uri },
                )
            }
        };

        *self.pending.lock().await = Some(pending);
        Ok(challenge)
    }

    /// Second factor. A valid code (current or adjacent 30 s step) moves the
    /// key into the vault; in enrollment mode it also persists the TOTP
    /// secret. An invalid code leaves the state untouched.
    pub async fn verify_totp(&self, code: &str) -> Result<(), AuthError> {
        self.expire_stale_pending().await;
        let mut guard = self.pending.lock().await;
        let pending = guard.as_ref().ok_or(AuthError::InvalidState)?;

        if !pending.totp.verify(code) {
            warn!("[session] two-factor code rejected");
            return Err(AuthError::InvalidTotpCode);
        }

        let pending = guard.take().expect("pending checked above");
        if pending.enrolling {
            self.master.enroll_totp(pending.totp.secret_base32())?;
        }
        self.vault.unlock(pending.key).await;
        drop(guard);
        info!("[session] vault unlocked");
        Ok(())
    }

    /// Recovery-key fallback, reachable from `Locked` and
    /// `AwaitingTwoFactor`. A correct key deletes the master record — TOTP
    /// enrollment included — and the user must `create_master` again.
    pub async fn recover(&self, candidate_key: &str) -> Result<(), AuthError> {
        if self.state().await == LockState::Unlocked {
            return Err(AuthError::InvalidState);
        }
        if !self.master.recover(candidate_key)? {
            warn!("[session] recovery key rejected");
            return Err(AuthError::InvalidRecoveryKey);
        }
        *self.pending.lock().await = None;
        info!("[session] master record reset via recovery key");
        Ok(())
    }

    /// Explicit lock: drops the key and any pending two-factor state.
    pub async fn logout(&self) {
        *self.pending.lock().await = None;
        self.vault.lock().await;
        info!("[session] vault locked");
    }

    /// User-activity notification; resets the idle clock while unlocked.
    pub async fn touch(&self) {
        self.vault.touch().await;
    }

    /// One idle poll. Returns true when this call locked the vault. Also
    /// sweeps any abandoned two-factor prompt.
    pub async fn check_idle(&self) -> bool {
        self.expire_stale_pending().await;
        let locked = self.vault.check_idle().await;
        if locked {
            info!("[session] idle timeout reached — vault locked");
        }
        locked
    }

    /// Drop pending two-factor state older than the vault's idle timeout:
    /// the derived key must not outlive an abandoned prompt.
    async fn expire_stale_pending(&self) {
        let mut guard = self.pending.lock().await;
        if guard
            .as_ref()
            .is_some_and(|p| p.started.elapsed() >= self.vault.idle_timeout())
        {
            *guard = None;
            info!("[session] pending two-factor state expired");
        }
    }

    /// Open (or create) the credential database sharing this session's
    /// vault. The handle works only while the session is unlocked.
    pub async fn open_store(&self, db_path: &Path) -> Result<Store, StoreError> {
        let store = Store::open(db_path, self.vault.clone()).await?;
        *self.store.lock().await = Some(store.clone());
        Ok(store)
    }

    pub async fn store(&self) -> Option<Store> {
        self.store.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cofre_store::models::CredentialInput;
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;

    const PASSWORD: &str = "correct horse battery staple";

    fn temp_master() -> (MasterStore, PathBuf) {
        let path = PathBuf::from(format!("/tmp/cofre-session-test-{}.json", Uuid::new_v4()));
        (MasterStore::new(path.clone()), path)
    }

    fn temp_db() -> PathBuf {
        PathBuf::from(format!("/tmp/cofre-session-db-{}.db", Uuid::new_v4()))
    }

    fn cleanup(master_path: &Path, db_path: Option<&Path>) {
        let _ = std::fs::remove_file(master_path);
        if let Some(db) = db_path {
            let _ = std::fs::remove_file(db);
            let _ = std::fs::remove_file(db.with_extension("db-wal"));
            let _ = std::fs::remove_file(db.with_extension("db-shm"));
        }
    }

    fn secret_from_uri(uri: &str) -> String {
        uri.split("secret=")
            .nth(1)
            .expect("uri has secret param")
            .split('&')
            .next()
            .unwrap()
            .to_string()
    }

    /// Drive a fresh session through create → login → enrollment → unlocked.
    async fn unlock_fresh(session: &Session) -> String {
        let recovery_key = session.create_master(PASSWORD).await.unwrap();
        let challenge = session.login(PASSWORD).await.unwrap();
        let Challenge::EnrollTwoFactor { provisioning_uri } = challenge else {
            panic!("expected enrollment challenge on first login");
        };
        let totp = Totp::new(&secret_from_uri(&provisioning_uri)).unwrap();
        session.verify_totp(&totp.current_code()).await.unwrap();
        assert_eq!(session.state().await, LockState::Unlocked);
        recovery_key
    }

    #[tokio::test]
    async fn enrollment_flow_reaches_unlocked() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");
        assert!(session.needs_initialisation());

        unlock_fresh(&session).await;
        assert!(!session.needs_initialisation());
        assert!(MasterStore::new(&master_path).has_totp().unwrap());
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn wrong_password_stays_locked() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");
        session.create_master(PASSWORD).await.unwrap();

        let err = session.login("wrong password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(session.state().await, LockState::Locked);
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn relogin_requires_enrolled_code() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");
        unlock_fresh(&session).await;
        session.logout().await;
        assert_eq!(session.state().await, LockState::Locked);

        let challenge = session.login(PASSWORD).await.unwrap();
        assert!(matches!(challenge, Challenge::TotpCode));
        assert_eq!(session.state().await, LockState::AwaitingTwoFactor);

        // Malformed code: rejected, state unchanged.
        let err = session.verify_totp("12345").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidTotpCode));
        assert_eq!(session.state().await, LockState::AwaitingTwoFactor);

        let secret = MasterStore::new(&master_path).totp_secret().unwrap().unwrap();
        let totp = Totp::new(&secret).unwrap();
        session.verify_totp(&totp.current_code()).await.unwrap();
        assert_eq!(session.state().await, LockState::Unlocked);
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn failed_enrollment_persists_nothing() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");
        session.create_master(PASSWORD).await.unwrap();
        session.login(PASSWORD).await.unwrap();

        let err = session.verify_totp("000000x").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidTotpCode));
        // Secret not written: a later login starts enrollment again.
        assert!(!MasterStore::new(&master_path).has_totp().unwrap());
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn recovery_resets_master_from_two_factor_state() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");
        let recovery_key = unlock_fresh(&session).await;
        session.logout().await;
        session.login(PASSWORD).await.unwrap();

        // Wrong key: nothing changes, enrollment survives.
        let err = session.recover("not-the-key").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRecoveryKey));
        assert!(MasterStore::new(&master_path).has_totp().unwrap());
        assert_eq!(session.state().await, LockState::AwaitingTwoFactor);

        // Correct key: master record gone, back to first-run.
        session.recover(&recovery_key).await.unwrap();
        assert_eq!(session.state().await, LockState::Locked);
        assert!(session.needs_initialisation());
        let err = session.login(PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::MasterMissing)));
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn idle_timeout_locks_and_revokes_access() {
        let (master, master_path) = temp_master();
        let session = Session::with_vault(
            master,
            Vault::with_idle_timeout(Duration::from_millis(60)),
            "Cofre",
            "vault",
        );
        unlock_fresh(&session).await;

        let db_path = temp_db();
        let store = session.open_store(&db_path).await.unwrap();
        let input = CredentialInput {
            url: "https://example.com".into(),
            username: "alice".into(),
            secret: "hunter2!".into(),
            notes: None,
            category: None,
            totp_secret: None,
            expiry_days: -1,
        };
        let id = store.create_credential(&input, false).await.unwrap();

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert!(session.check_idle().await);
        assert_eq!(session.state().await, LockState::Locked);
        assert!(matches!(
            store.get_credential(id).await,
            Err(StoreError::VaultLocked)
        ));
        cleanup(&master_path, Some(&db_path));
    }

    #[tokio::test]
    async fn touch_defers_idle_lock() {
        let (master, master_path) = temp_master();
        let session = Session::with_vault(
            master,
            Vault::with_idle_timeout(Duration::from_millis(100)),
            "Cofre",
            "vault",
        );
        unlock_fresh(&session).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        session.touch().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!session.check_idle().await);
        assert_eq!(session.state().await, LockState::Unlocked);
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn abandoned_two_factor_prompt_expires() {
        let (master, master_path) = temp_master();
        let session = Session::with_vault(
            master,
            Vault::with_idle_timeout(Duration::from_millis(50)),
            "Cofre",
            "vault",
        );
        session.create_master(PASSWORD).await.unwrap();
        let Challenge::EnrollTwoFactor { provisioning_uri } =
            session.login(PASSWORD).await.unwrap()
        else {
            panic!("expected enrollment challenge");
        };
        let totp = Totp::new(&secret_from_uri(&provisioning_uri)).unwrap();
        assert_eq!(session.state().await, LockState::AwaitingTwoFactor);

        // Walk away from the prompt: the held key times out like an
        // unlocked vault would, and even a correct code is refused.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(session.state().await, LockState::Locked);
        let err = session.verify_totp(&totp.current_code()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
        assert!(!MasterStore::new(&master_path).has_totp().unwrap());
        cleanup(&master_path, None);
    }

    #[tokio::test]
    async fn logout_revokes_store_access() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");
        unlock_fresh(&session).await;

        let db_path = temp_db();
        let store = session.open_store(&db_path).await.unwrap();
        session.logout().await;
        assert!(matches!(
            store.list("").await,
            Err(StoreError::VaultLocked)
        ));
        cleanup(&master_path, Some(&db_path));
    }

    #[tokio::test]
    async fn operations_reject_wrong_states() {
        let (master, master_path) = temp_master();
        let session = Session::new(master, "Cofre", "vault");

        // Nothing initialised yet.
        assert!(matches!(
            session.verify_totp("123456").await.unwrap_err(),
            AuthError::InvalidState
        ));

        unlock_fresh(&session).await;
        // Already unlocked: no login, no create, no recovery.
        assert!(matches!(
            session.login(PASSWORD).await.unwrap_err(),
            AuthError::InvalidState
        ));
        assert!(matches!(
            session.create_master(PASSWORD).await.unwrap_err(),
            AuthError::InvalidState
        ));
        assert!(matches!(
            session.recover("whatever").await.unwrap_err(),
            AuthError::InvalidState
        ));
        cleanup(&master_path, None);
    }
}
