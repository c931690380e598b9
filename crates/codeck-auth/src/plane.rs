//! `AuthPlane`: the facade gateway and daemon wiring construct, bundling
//! password setup/verify, sessions, WS tickets, brute-force lockout, and
//! OAuth login/refresh for a single workspace.

use std::net::IpAddr;
use std::sync::Arc;

use codeck_credstore::{CredStore, PasswordRecord};

use crate::error::{AuthError, AuthResult};
use crate::lockout::LockoutTable;
use crate::oauth::{OAuthFlow, OAuthProviderConfig};
use crate::password::{hash_password, needs_rehash, verify_password};
use crate::refresh::RefreshMonitor;
use crate::session::{SessionData, SessionStore, DEFAULT_SESSION_TTL};
use crate::ticket::TicketStore;

/// The authentication plane for a single workspace.
pub struct AuthPlane {
    cred_store: Arc<CredStore>,
    sessions: SessionStore,
    lockout: LockoutTable,
    tickets: TicketStore,
    oauth: OAuthFlow,
    refresh: Arc<RefreshMonitor>,
}

impl AuthPlane {
    /// Construct an `AuthPlane` wired to `cred_store`, with sessions
    /// persisted at `sessions_path` and in-flight PKCE state at
    /// `oauth_state_path`.
    #[must_use]
    pub fn new(
        cred_store: Arc<CredStore>,
        sessions_path: std::path::PathBuf,
        oauth_state_path: std::path::PathBuf,
        oauth_config: OAuthProviderConfig,
    ) -> Self {
        let refresh = Arc::new(RefreshMonitor::new(cred_store.clone(), oauth_config.clone()));
        Self {
            cred_store,
            sessions: SessionStore::new(sessions_path),
            lockout: LockoutTable::new(),
            tickets: TicketStore::new(),
            oauth: OAuthFlow::new(oauth_config, oauth_state_path),
            refresh,
        }
    }

    /// Load persisted sessions and restore any in-flight OAuth login.
    ///
    /// # Errors
    ///
    /// Returns an error if either load fails.
    pub async fn restore(&self) -> AuthResult<()> {
        self.sessions.load().await?;
        self.oauth.restore().await?;
        Ok(())
    }

    /// Spawn the background refresh-monitor loop.
    pub fn spawn_refresh_monitor(&self) -> tokio::task::JoinHandle<()> {
        self.refresh.clone().spawn()
    }

    /// Configure the operator password. Rejects if already configured.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlreadyConfigured`] if a password record
    /// already exists.
    pub async fn setup_password(&self, password: &str) -> AuthResult<()> {
        if self.cred_store.read_password().await?.is_some() {
            return Err(AuthError::AlreadyConfigured);
        }
        let record = hash_password(password)?;
        self.cred_store.write_password(&record).await?;
        Ok(())
    }

    /// `true` if a password has already been configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the password record cannot be read.
    pub async fn is_configured(&self) -> AuthResult<bool> {
        Ok(self.cred_store.read_password().await?.is_some())
    }

    /// Verify `password` from `ip`. On success, issues a session and
    /// clears the IP's failure counter. On failure, ticks the brute-force
    /// counter. An IP over the failure threshold is rejected even with a
    /// correct password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RateLimited`] if the IP is locked out, or
    /// [`AuthError::InvalidCredentials`] on a wrong password.
    pub async fn verify_password(
        &self,
        password: &str,
        ip: IpAddr,
    ) -> AuthResult<(String, SessionData)> {
        if let Some(retry_after_secs) = self.lockout.check(ip) {
            return Err(AuthError::RateLimited { retry_after_secs });
        }

        let Some(record) = self.cred_store.read_password().await? else {
            self.lockout.record_failure(ip);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &record)? {
            self.lockout.record_failure(ip);
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.record_success(ip);

        if needs_rehash(&record) {
            if let Ok(rehashed) = hash_password(password) {
                if let Err(e) = self.cred_store.write_password(&rehashed).await {
                    tracing::warn!(error = %e, "opportunistic password rehash failed");
                }
            }
        }

        let (token, data) = self
            .sessions
            .create(&ip.to_string(), DEFAULT_SESSION_TTL)
            .await?;
        Ok((token, data))
    }

    /// Look up a session by bearer token.
    pub async fn session_for_token(&self, token: &str) -> Option<SessionData> {
        self.sessions.get_by_token(token).await
    }

    /// Revoke a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the revocation fails.
    pub async fn revoke_session(&self, session_id: &str) -> AuthResult<()> {
        self.sessions.revoke_by_id(session_id).await
    }

    /// Issue a one-time WS upgrade ticket for an already-authenticated
    /// session.
    #[must_use]
    pub fn issue_ws_ticket(&self, session: SessionData) -> String {
        self.tickets.issue(session)
    }

    /// Consume a WS upgrade ticket.
    pub fn consume_ws_ticket(&self, ticket: &str) -> Option<SessionData> {
        self.tickets.consume(ticket)
    }

    /// Start an OAuth PKCE login, returning the authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the PKCE state fails.
    pub async fn start_oauth_login(&self) -> AuthResult<String> {
        self.oauth.start_login().await
    }

    /// Submit the OAuth callback payload and complete the exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is not awaiting a code, the state
    /// does not match, or the exchange fails.
    pub async fn send_oauth_code(&self, payload: &str) -> AuthResult<()> {
        let cred = self.oauth.send_code(payload).await?;
        self.cred_store.write_cred(&cred).await?;
        Ok(())
    }

    /// Cancel an in-progress OAuth login.
    ///
    /// # Errors
    ///
    /// Returns an error if removing the persisted PKCE state fails.
    pub async fn cancel_oauth_login(&self) -> AuthResult<()> {
        self.oauth.cancel().await
    }

    /// Trigger a recovery token refresh after a consumer observes an
    /// upstream 401.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh exchange fails.
    pub async fn recover_from_401(&self) -> AuthResult<()> {
        self.refresh.recover_from_401().await
    }

    /// Access the underlying password record, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the password record cannot be read.
    pub async fn password_record(&self) -> AuthResult<Option<PasswordRecord>> {
        Ok(self.cred_store.read_password().await?)
    }

    /// Environment variables carrying the current OAuth access token, to
    /// be merged into an agent session's environment. Empty if no
    /// credential is stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be read.
    pub async fn oauth_env(&self) -> AuthResult<std::collections::HashMap<String, String>> {
        let mut env = std::collections::HashMap::new();
        if let Some(cred) = self.cred_store.read_cred().await? {
            env.insert("CLAUDE_CODE_OAUTH_TOKEN".to_string(), cred.access_token);
        }
        Ok(env)
    }
}
