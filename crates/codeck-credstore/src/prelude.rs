//! Convenience re-exports for consumers of this crate.

pub use crate::error::{CredStoreError, CredStoreResult};
pub use crate::store::CredStore;
pub use crate::types::{AccountInfo, OAuthCredential, PasswordAlgorithm, PasswordRecord, ScryptCost};
pub use crate::watcher::spawn_backup_restore_watcher;
