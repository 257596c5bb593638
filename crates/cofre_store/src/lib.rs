//! cofre_store — encrypted local storage for the cofre credential vault
//!
//! # Encryption strategy
//! SQLite does NOT natively encrypt. We use application-level encryption:
//! - Sensitive columns (URLs, usernames, secrets, notes, categories, TOTP
//!   seeds) are stored as versioned XChaCha20-Poly1305 tokens.
//! - The vault key is derived from the master password via PBKDF2 and held
//!   in memory only while the vault is unlocked.
//! - Non-sensitive metadata (`last_changed`, `expiry_days`) is stored in
//!   plaintext so expiry checks need no decryption.
//!
//! The master record (salt, password hash, recovery-key hash, optional TOTP
//! secret) lives outside the database in a small versioned JSON file; see
//! `master`.
//!
//! # Migration
//! SQLx migrations in `migrations/` are run on first open.

pub mod db;
pub mod error;
pub mod master;
pub mod models;
pub mod records;
pub mod strength;
pub mod vault;

pub use db::Store;
pub use error::StoreError;
pub use master::MasterStore;
pub use vault::Vault;
