//! Idle watcher: polls the session once per second and locks on timeout.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::session::Session;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the recurring idle check. Runs until the handle is aborted (or the
/// runtime shuts down); locking is idempotent, so it is safe to keep the
/// watcher alive across logins.
pub fn watch_idle(session: Session) -> JoinHandle<()> {
    watch_idle_every(session, POLL_INTERVAL)
}

pub fn watch_idle_every(session: Session, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; harmless.
        loop {
            interval.tick().await;
            session.check_idle().await;
        }
    })
}
