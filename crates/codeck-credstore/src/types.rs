//! Credential record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Password hashing algorithm, tagged so a stored record can be read and
/// transparently upgraded across algorithm changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordAlgorithm {
    /// Legacy plaintext-salted sha256, readable but always rehashed on next
    /// successful verify.
    LegacySha256,
    /// scrypt with OWASP-target parameters.
    ScryptV1,
}

/// Operator password hash record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRecord {
    /// Which algorithm produced `hash`.
    pub algorithm: PasswordAlgorithm,
    /// Random per-password salt, base64-encoded.
    pub salt: String,
    /// The password hash, base64-encoded.
    pub hash: String,
    /// The scrypt cost parameter (`log2(N)`); `0` for legacy records.
    pub cost: u8,
}

/// scrypt parameters targeting the OWASP-recommended cost.
pub struct ScryptCost {
    /// CPU/memory cost parameter, log2(N).
    pub log_n: u8,
    /// Block size parameter.
    pub r: u32,
    /// Parallelization parameter.
    pub p: u32,
}

impl ScryptCost {
    /// The current target cost: `N=2^17, r=8, p=1`.
    pub const CURRENT: ScryptCost = ScryptCost {
        log_n: 17,
        r: 8,
        p: 1,
    };
}

/// Upstream model-provider account information, attached to an
/// [`OAuthCredential`].
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize)]
pub struct AccountInfo {
    /// Account email address.
    pub email: String,
    /// Stable account identifier.
    pub account_uuid: String,
    /// Organisation display name.
    pub org_name: String,
    /// Organisation identifier.
    pub org_uuid: String,
}

/// OAuth credential for the upstream model provider.
///
/// `access_token` and `refresh_token` are held in memory only for the
/// process lifetime and encrypted at rest; they are never `Debug`-printed.
#[derive(Clone, Serialize, Deserialize, Zeroize, zeroize::ZeroizeOnDrop)]
pub struct OAuthCredential {
    /// Bearer token for upstream API calls.
    pub access_token: String,
    /// Token used to mint a new access token when this one expires.
    pub refresh_token: String,
    /// Absolute expiry of `access_token`.
    #[zeroize(skip)]
    pub expires_at: DateTime<Utc>,
    /// Upstream account metadata.
    #[zeroize(skip)]
    pub account_info: AccountInfo,
    /// On-disk schema version, bumped when the encrypted layout changes.
    pub version: u32,
}

impl std::fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("account_info", &self.account_info.email)
            .field("version", &self.version)
            .finish()
    }
}

impl OAuthCredential {
    /// Current on-disk schema version.
    pub const CURRENT_VERSION: u32 = 2;

    /// `true` if `expires_at - now <= window`.
    #[must_use]
    pub fn expires_within(&self, window: chrono::Duration) -> bool {
        self.expires_at - Utc::now() <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_tokens() {
        let cred = OAuthCredential {
            access_token: "super-secret-access".to_string(),
            refresh_token: "super-secret-refresh".to_string(),
            expires_at: Utc::now(),
            account_info: AccountInfo {
                email: "a@b.com".to_string(),
                account_uuid: "u".to_string(),
                org_name: "o".to_string(),
                org_uuid: "ou".to_string(),
            },
            version: OAuthCredential::CURRENT_VERSION,
        };
        let debug = format!("{cred:?}");
        assert!(!debug.contains("super-secret-access"));
        assert!(!debug.contains("super-secret-refresh"));
    }

    #[test]
    fn expires_within_detects_upcoming_expiry() {
        let cred = OAuthCredential {
            access_token: "a".to_string(),
            refresh_token: "b".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(10),
            account_info: AccountInfo {
                email: "a@b.com".to_string(),
                account_uuid: "u".to_string(),
                org_name: "o".to_string(),
                org_uuid: "ou".to_string(),
            },
            version: 2,
        };
        assert!(cred.expires_within(chrono::Duration::minutes(30)));
        assert!(!cred.expires_within(chrono::Duration::minutes(5)));
    }
}
