//! AEAD encryption-at-rest and master-key resolution.
//!
//! Master-key priority: explicit env override > persisted random key in
//! `<store>/.encryption-key` > hostname-derived fallback (logged as a
//! warning, since it is not secret and should only ever be reached on a
//! misconfigured install).

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use scrypt::Params;

use crate::error::{CredStoreError, CredStoreResult};

const MASTER_KEY_ENV: &str = "CODECK_MASTER_KEY";
const KDF_SALT: &[u8] = b"codeck-credential-store-v1-fixed-salt";
const NONCE_LEN: usize = 12;

/// Resolve the raw master key bytes, in priority order.
///
/// # Errors
///
/// Returns [`CredStoreError::MasterKeyUnavailable`] if the persisted key
/// file exists but cannot be read, or cannot be created.
pub fn resolve_master_key(encryption_key_path: &std::path::Path) -> CredStoreResult<Vec<u8>> {
    if let Ok(env_key) = std::env::var(MASTER_KEY_ENV) {
        tracing::info!("using master key from {MASTER_KEY_ENV}");
        return Ok(env_key.into_bytes());
    }

    match std::fs::read(encryption_key_path) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => {
            if let Some(parent) = encryption_key_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CredStoreError::MasterKeyUnavailable(e.to_string()))?;
            }
            let mut key = vec![0u8; 32];
            OsRng.fill_bytes(&mut key);
            std::fs::write(encryption_key_path, &key)
                .map_err(|e| CredStoreError::MasterKeyUnavailable(e.to_string()))?;
            codeck_core::dirs::secure_file(encryption_key_path)
                .map_err(|e| CredStoreError::MasterKeyUnavailable(e.to_string()))?;
            tracing::info!(path = %encryption_key_path.display(), "generated new master key");
            Ok(key)
        }
    }
}

/// Hostname-derived fallback master key, used only if neither the env
/// override nor the persisted key file is available (e.g. the key
/// directory is read-only). Logged loudly since it weakens at-rest
/// protection to "known if you can read `/etc/hostname`".
#[must_use]
pub fn hostname_fallback_key() -> Vec<u8> {
    tracing::warn!(
        "falling back to hostname-derived master key; credential encryption is weaker than normal"
    );
    let hostname = hostname_or_default();
    format!("codeck-fallback-key-{hostname}").into_bytes()
}

fn hostname_or_default() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}

/// Derive a 32-byte AEAD key from `master_key` via scrypt with a fixed
/// application salt (the master key itself supplies the entropy; the fixed
/// salt only domain-separates this derivation from any other use of the
/// same master key).
fn derive_key(master_key: &[u8]) -> CredStoreResult<[u8; 32]> {
    let params = Params::new(15, 8, 1, 32)
        .map_err(|e| CredStoreError::MasterKeyUnavailable(e.to_string()))?;
    let mut out = [0u8; 32];
    scrypt::scrypt(master_key, KDF_SALT, &params, &mut out)
        .map_err(|e| CredStoreError::MasterKeyUnavailable(e.to_string()))?;
    Ok(out)
}

/// Encrypt `plaintext` under `master_key`, returning `nonce || ciphertext`
/// (the ciphertext includes the AEAD tag, per the `aes-gcm` crate's
/// convention).
///
/// # Errors
///
/// Returns [`CredStoreError::MasterKeyUnavailable`] if key derivation
/// fails.
pub fn encrypt(master_key: &[u8], plaintext: &[u8]) -> CredStoreResult<Vec<u8>> {
    let key_bytes = derive_key(master_key)?;
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CredStoreError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CredStoreError::DecryptionFailed`] if the blob is too short,
/// or if the ciphertext/tag fails authentication (corruption or tampering).
pub fn decrypt(master_key: &[u8], blob: &[u8]) -> CredStoreResult<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(CredStoreError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let key_bytes = derive_key(master_key)?;
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CredStoreError::DecryptionFailed)
}
