//! cofre_session — the authentication gate in front of the credential store.
//!
//! A `Session` owns the master record handle, the in-memory vault key and
//! the two-factor state, replacing the module-level globals the UI would
//! otherwise juggle. The UI layer calls `create_master`, `login`,
//! `verify_totp`, `recover` and `logout`; `watch_idle` drives the
//! once-per-second idle-lockout check.
//!
//! State machine: `Locked → AwaitingTwoFactor → Unlocked`, with every
//! transition away from `Unlocked` zeroizing the key.

pub mod error;
pub mod idle;
pub mod session;

pub use error::AuthError;
pub use session::{Challenge, LockState, Session};
