//! Background token refresh monitor.
//!
//! Runs every five minutes; proactively refreshes when the held credential
//! is within 30 minutes of expiry. Also exposes a recovery path a consumer
//! can trigger after observing an upstream 401. Both paths are serialised
//! by a single in-flight flag so a proactive refresh and a recovery
//! refresh never race each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codeck_credstore::{CredStore, OAuthCredential};

use crate::error::AuthResult;
use crate::oauth::{refresh_token, OAuthProviderConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
const REFRESH_WINDOW: chrono::Duration = chrono::Duration::minutes(30);

/// Drives proactive and on-demand OAuth token refresh.
pub struct RefreshMonitor {
    store: Arc<CredStore>,
    config: OAuthProviderConfig,
    http: reqwest::Client,
    in_flight: AtomicBool,
}

impl RefreshMonitor {
    /// Construct a monitor for `store`'s held credential.
    #[must_use]
    pub fn new(store: Arc<CredStore>, config: OAuthProviderConfig) -> Self {
        Self {
            store,
            config,
            http: reqwest::Client::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Spawn the five-minute polling loop. Returns a handle; dropping it
    /// (or aborting it) stops the loop.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = self.tick().await {
                    tracing::warn!(error = %e, "proactive token refresh tick failed");
                }
            }
        })
    }

    /// Run one check: refresh if the held credential is within the
    /// refresh window of expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the credential or the refresh exchange
    /// fails; does not error when there is simply no credential to check.
    pub async fn tick(&self) -> AuthResult<()> {
        let Some(cred) = self.store.read_cred().await? else {
            return Ok(());
        };
        if cred.expires_within(REFRESH_WINDOW) {
            self.do_refresh(&cred).await?;
        }
        Ok(())
    }

    /// Trigger a recovery refresh after a consumer observes an upstream
    /// 401. No-op (returns `Ok`) if a refresh is already in flight or no
    /// credential is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh exchange fails.
    pub async fn recover_from_401(&self) -> AuthResult<()> {
        let Some(cred) = self.store.read_cred().await? else {
            return Ok(());
        };
        self.do_refresh(&cred).await
    }

    async fn do_refresh(&self, cred: &OAuthCredential) -> AuthResult<()> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        let result = refresh_token(&self.http, &self.config, &cred.refresh_token).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(new_cred) => {
                self.store.write_cred(&new_cred).await?;
                tracing::info!("refreshed oauth token");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codeck_credstore::AccountInfo;

    fn config() -> OAuthProviderConfig {
        OAuthProviderConfig {
            authorize_url: "https://example.com/authorize".to_string(),
            token_url: "https://example.invalid/token".to_string(),
            client_id: "client-123".to_string(),
            redirect_uri: "https://localhost/callback".to_string(),
            scope: "read write".to_string(),
        }
    }

    async fn open_store(tmp: &std::path::Path) -> Arc<CredStore> {
        Arc::new(
            CredStore::open(
                tmp.join("credentials.json"),
                tmp.join("credentials.json.backup"),
                tmp.join("credentials.token-cache.json"),
                tmp.join("auth.json"),
                &tmp.join(".encryption-key"),
            )
            .expect("open store"),
        )
    }

    #[tokio::test]
    async fn tick_with_no_credential_is_a_noop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = open_store(tmp.path()).await;
        let monitor = RefreshMonitor::new(store, config());
        monitor.tick().await.expect("tick");
    }

    #[tokio::test]
    async fn tick_with_far_future_expiry_does_not_refresh() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = open_store(tmp.path()).await;
        let cred = OAuthCredential {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(6),
            account_info: AccountInfo {
                email: "a@b.com".to_string(),
                account_uuid: "u".to_string(),
                org_name: "o".to_string(),
                org_uuid: "ou".to_string(),
            },
            version: OAuthCredential::CURRENT_VERSION,
        };
        store.write_cred(&cred).await.expect("write");
        let monitor = RefreshMonitor::new(store.clone(), config());
        monitor.tick().await.expect("tick");
        let still = store.read_cred().await.expect("read").expect("present");
        assert_eq!(still.access_token, "a");
    }
}
