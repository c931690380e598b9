//! CredStore error types.

use thiserror::Error;

/// Errors from credential storage operations.
#[derive(Debug, Error)]
pub enum CredStoreError {
    /// The stored ciphertext or tag did not authenticate; the file is
    /// corrupt or was tampered with.
    #[error("decryption failed: ciphertext or tag invalid")]
    DecryptionFailed,

    /// The master key could not be resolved or read.
    #[error("master key unavailable: {0}")]
    MasterKeyUnavailable(String),

    /// Serialization or deserialization of a credential record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An atomic write could not be completed.
    #[error("write failed: {0}")]
    Write(#[from] codeck_core::atomic::AtomicWriteError),
}

/// Result type for credential storage operations.
pub type CredStoreResult<T> = Result<T, CredStoreError>;
