//! Encrypted OAuth credential storage.
//!
//! Layout per store:
//! - `credentials.json` — primary, encrypted-v2 (or legacy plaintext, read
//!   transparently and re-encrypted on next write).
//! - `credentials.json.backup` — mirror, restored from automatically if the
//!   primary disappears.
//! - `credentials.token-cache.json` — plaintext token cache under a name the
//!   upstream CLI will not touch; either file surviving independent deletion
//!   of the other keeps the daemon authorised.
//! - an in-memory authoritative copy held for the process lifetime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use codeck_core::atomic::{remove_if_present, write_atomic, ActiveWriteGuard};
use codeck_core::dirs::{needs_tightening, secure_file};

use crate::crypto::{decrypt, encrypt, hostname_fallback_key, resolve_master_key};
use crate::error::{CredStoreError, CredStoreResult};
use crate::password::{read_password, write_password};
use crate::types::{OAuthCredential, PasswordRecord};

#[derive(Serialize, Deserialize)]
struct EncryptedEnvelope {
    version: u32,
    encrypted: bool,
    blob_b64: String,
}

/// Encrypted credential + password store for a single workspace.
pub struct CredStore {
    credentials_path: PathBuf,
    credentials_backup_path: PathBuf,
    token_cache_path: PathBuf,
    password_path: PathBuf,
    guard: Arc<ActiveWriteGuard>,
    master_key: Vec<u8>,
    /// Authoritative in-memory copy; survives deletion of either on-disk
    /// file for the lifetime of the process.
    memory_cred: RwLock<Option<OAuthCredential>>,
}

impl CredStore {
    /// Open (or initialise) a credential store rooted at the given paths.
    ///
    /// # Errors
    ///
    /// Returns [`CredStoreError::MasterKeyUnavailable`] if the master key
    /// cannot be resolved or persisted.
    pub fn open(
        credentials_path: PathBuf,
        credentials_backup_path: PathBuf,
        token_cache_path: PathBuf,
        password_path: PathBuf,
        encryption_key_path: &Path,
    ) -> CredStoreResult<Self> {
        let master_key = resolve_master_key(encryption_key_path)
            .or_else(|_| Ok::<_, CredStoreError>(hostname_fallback_key()))?;
        Ok(Self {
            credentials_path,
            credentials_backup_path,
            token_cache_path,
            password_path,
            guard: Arc::new(ActiveWriteGuard::new()),
            master_key,
            memory_cred: RwLock::new(None),
        })
    }

    /// Read the OAuth credential, preferring the in-memory authoritative
    /// copy, then the primary file, then the backup, then the plaintext
    /// token cache.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be decrypted or parsed.
    pub async fn read_cred(&self) -> CredStoreResult<Option<OAuthCredential>> {
        if let Some(cred) = self.memory_cred.read().await.clone() {
            return Ok(Some(cred));
        }

        for path in [
            &self.credentials_path,
            &self.credentials_backup_path,
            &self.token_cache_path,
        ] {
            if let Some(cred) = self.try_read_file(path).await? {
                *self.memory_cred.write().await = Some(cred.clone());
                return Ok(Some(cred));
            }
        }
        Ok(None)
    }

    async fn try_read_file(&self, path: &Path) -> CredStoreResult<Option<OAuthCredential>> {
        if !path.exists() {
            return Ok(None);
        }
        if needs_tightening(path) {
            secure_file(path)?;
        }
        let bytes = tokio::fs::read(path).await?;
        if let Ok(envelope) = serde_json::from_slice::<EncryptedEnvelope>(&bytes) {
            if envelope.encrypted {
                let blob = base64::Engine::decode(
                    &base64::engine::general_purpose::STANDARD,
                    &envelope.blob_b64,
                )
                .map_err(|_| CredStoreError::DecryptionFailed)?;
                let plaintext = decrypt(&self.master_key, &blob)?;
                let cred: OAuthCredential = serde_json::from_slice(&plaintext)?;
                return Ok(Some(cred));
            }
        }
        // Legacy plaintext layout: the file is the credential JSON directly.
        match serde_json::from_slice::<OAuthCredential>(&bytes) {
            Ok(cred) => {
                tracing::warn!(path = %path.display(), "read legacy plaintext credential; will re-encrypt on next write");
                Ok(Some(cred))
            }
            Err(_) => Ok(None),
        }
    }

    /// Atomically persist `cred`: encrypts and writes the primary file, a
    /// mirrored backup, and a plaintext token cache, then updates the
    /// in-memory authoritative copy.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption, serialization, or any atomic write
    /// fails.
    pub async fn write_cred(&self, cred: &OAuthCredential) -> CredStoreResult<()> {
        let plaintext = serde_json::to_vec(cred)?;
        let blob = encrypt(&self.master_key, &plaintext)?;
        let envelope = EncryptedEnvelope {
            version: OAuthCredential::CURRENT_VERSION,
            encrypted: true,
            blob_b64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &blob),
        };
        let encrypted_bytes = serde_json::to_vec_pretty(&envelope)?;

        write_atomic(&self.guard, &self.credentials_path, &encrypted_bytes).await?;
        write_atomic(&self.guard, &self.credentials_backup_path, &encrypted_bytes).await?;
        write_atomic(&self.guard, &self.token_cache_path, &plaintext).await?;

        *self.memory_cred.write().await = Some(cred.clone());
        Ok(())
    }

    /// Remove every on-disk credential file and clear the in-memory copy
    /// (used when the upstream token is irrecoverably invalid).
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails for a reason other than absence.
    pub async fn clear_cred(&self) -> CredStoreResult<()> {
        remove_if_present(&self.credentials_path).await?;
        remove_if_present(&self.credentials_backup_path).await?;
        remove_if_present(&self.token_cache_path).await?;
        *self.memory_cred.write().await = None;
        Ok(())
    }

    /// Restore the primary credential file from the backup, if the primary
    /// is missing and the backup exists. Called by the debounced directory
    /// watcher, and safe to call unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub async fn restore_from_backup_if_needed(&self) -> CredStoreResult<bool> {
        if self.credentials_path.exists() || !self.credentials_backup_path.exists() {
            return Ok(false);
        }
        let bytes = tokio::fs::read(&self.credentials_backup_path).await?;
        write_atomic(&self.guard, &self.credentials_path, &bytes).await?;
        tracing::info!("restored primary credential file from backup");
        Ok(true)
    }

    /// The directory the primary credential file lives in, for the caller
    /// to point a filesystem watcher at.
    #[must_use]
    pub fn credentials_dir(&self) -> PathBuf {
        self.credentials_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Read the operator password record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub async fn read_password(&self) -> CredStoreResult<Option<PasswordRecord>> {
        read_password(&self.password_path).await
    }

    /// Atomically persist the operator password record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub async fn write_password(&self, record: &PasswordRecord) -> CredStoreResult<()> {
        write_password(&self.guard, &self.password_path, record).await
    }
}
