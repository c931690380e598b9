//! Password record storage (no encryption — only a hash and salt are ever
//! persisted).

use serde::{Deserialize, Serialize};
use std::path::Path;

use codeck_core::atomic::{write_atomic, ActiveWriteGuard};
use codeck_core::dirs::{needs_tightening, secure_file};

use crate::error::CredStoreResult;
use crate::types::PasswordRecord;

#[derive(Serialize, Deserialize)]
struct PasswordFile {
    record: PasswordRecord,
}

/// Read the password record from `path`, tightening its permissions in
/// place if they are looser than `0600`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed.
pub async fn read_password(path: &Path) -> CredStoreResult<Option<PasswordRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    if needs_tightening(path) {
        secure_file(path)?;
    }
    let bytes = tokio::fs::read(path).await?;
    let file: PasswordFile = serde_json::from_slice(&bytes)?;
    Ok(Some(file.record))
}

/// Atomically persist `record` to `path` with mode `0600`.
///
/// # Errors
///
/// Returns an error if serialization or the atomic write fails.
pub async fn write_password(
    guard: &ActiveWriteGuard,
    path: &Path,
    record: &PasswordRecord,
) -> CredStoreResult<()> {
    let file = PasswordFile {
        record: record.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&file)?;
    write_atomic(guard, path, &bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PasswordAlgorithm;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("auth.json");
        let guard = ActiveWriteGuard::new();
        let record = PasswordRecord {
            algorithm: PasswordAlgorithm::ScryptV1,
            salt: "c2FsdA==".to_string(),
            hash: "aGFzaA==".to_string(),
            cost: 17,
        };
        write_password(&guard, &path, &record).await.expect("write");
        let read = read_password(&path).await.expect("read").expect("present");
        assert_eq!(read.hash, record.hash);
        assert_eq!(read.cost, 17);
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("auth.json");
        assert!(read_password(&path).await.expect("read").is_none());
    }
}
