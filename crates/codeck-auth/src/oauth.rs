//! OAuth PKCE login flow.
//!
//! ```text
//! Idle ──startLogin──▶ AwaitingCode ──sendCode──▶ Exchanging ──ok──▶ Idle (authenticated)
//!                          │                          │
//!                          │                          └─fail─▶ Idle (cleaned)
//!                          └──cancel / timeout (5 min)─▶ Idle
//! ```

use std::path::PathBuf;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use codeck_core::atomic::{remove_if_present, write_atomic, ActiveWriteGuard};
use codeck_credstore::{AccountInfo, OAuthCredential};

use crate::error::{AuthError, AuthResult};

const PKCE_TIMEOUT: chrono::Duration = chrono::Duration::minutes(5);

/// Persisted PKCE state for an in-progress login, so a daemon restart
/// mid-flow does not force the user to start over.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PkceState {
    code_verifier: String,
    state: String,
    nonce: String,
    started_at: DateTime<Utc>,
}

/// Current phase of the OAuth login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthPhase {
    /// No login in progress.
    Idle,
    /// `startLogin` has run; waiting for the provider to redirect back
    /// with a code.
    AwaitingCode,
    /// A code was submitted; exchanging it at the token endpoint.
    Exchanging,
}

/// Configuration for the provider's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    /// Authorization endpoint the user is sent to.
    pub authorize_url: String,
    /// Token endpoint used for the code exchange.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Requested scopes, space-separated.
    pub scope: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    account: Option<TokenResponseAccount>,
}

#[derive(Deserialize)]
struct TokenResponseAccount {
    email: String,
    uuid: String,
    #[serde(default)]
    organization_name: String,
    #[serde(default)]
    organization_uuid: String,
}

/// Drives the PKCE state machine for a single workspace.
pub struct OAuthFlow {
    config: OAuthProviderConfig,
    state_path: PathBuf,
    guard: ActiveWriteGuard,
    http: reqwest::Client,
    phase: Mutex<OAuthPhase>,
    pkce: Mutex<Option<PkceState>>,
}

impl OAuthFlow {
    /// Construct a flow bound to `config`, persisting in-flight PKCE state
    /// at `state_path`.
    #[must_use]
    pub fn new(config: OAuthProviderConfig, state_path: PathBuf) -> Self {
        Self {
            config,
            state_path,
            guard: ActiveWriteGuard::new(),
            http: reqwest::Client::new(),
            phase: Mutex::new(OAuthPhase::Idle),
            pkce: Mutex::new(None),
        }
    }

    /// Current phase.
    pub async fn phase(&self) -> OAuthPhase {
        self.phase.lock().await.clone()
    }

    /// Restore a persisted in-flight PKCE state from a prior process, if
    /// present and not yet timed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub async fn restore(&self) -> AuthResult<()> {
        if !self.state_path.exists() {
            return Ok(());
        }
        let bytes = tokio::fs::read(&self.state_path).await?;
        let state: PkceState = serde_json::from_slice(&bytes)?;
        if Utc::now() - state.started_at >= PKCE_TIMEOUT {
            remove_if_present(&self.state_path).await?;
            return Ok(());
        }
        *self.pkce.lock().await = Some(state);
        *self.phase.lock().await = OAuthPhase::AwaitingCode;
        Ok(())
    }

    /// Begin a login: generates verifier/challenge/state/nonce, persists
    /// them, and returns the authorization URL to send the user to.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the PKCE state fails.
    pub async fn start_login(&self) -> AuthResult<String> {
        let code_verifier = random_url_safe_token(64);
        let code_challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(Sha256::digest(code_verifier.as_bytes()));
        let state = random_url_safe_token(32);
        let nonce = random_url_safe_token(32);

        let pkce = PkceState {
            code_verifier,
            state: state.clone(),
            nonce,
            started_at: Utc::now(),
        };
        self.persist(&pkce).await?;
        *self.pkce.lock().await = Some(pkce);
        *self.phase.lock().await = OAuthPhase::AwaitingCode;

        let url = format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.authorize_url,
            urlencode(&self.config.client_id),
            urlencode(&self.config.redirect_uri),
            urlencode(&self.config.scope),
            urlencode(&state),
            urlencode(&code_challenge),
        );
        Ok(url)
    }

    /// Cancel an in-progress login, or handle its 5-minute timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if removing the persisted PKCE state fails.
    pub async fn cancel(&self) -> AuthResult<()> {
        *self.pkce.lock().await = None;
        *self.phase.lock().await = OAuthPhase::Idle;
        remove_if_present(&self.state_path).await?;
        Ok(())
    }

    /// `true` if the in-progress login has exceeded its 5-minute timeout.
    pub async fn is_timed_out(&self) -> bool {
        match &*self.pkce.lock().await {
            Some(pkce) => Utc::now() - pkce.started_at >= PKCE_TIMEOUT,
            None => false,
        }
    }

    /// Submit the provider's callback payload: accepts `code#state`, a
    /// full redirect URL, a raw code, or a direct long-lived token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::OAuthNotInProgress`] if no login is awaiting a
    /// code, [`AuthError::OAuthStateMismatch`] on CSRF mismatch, or
    /// [`AuthError::OAuthExchangeFailed`] if the token endpoint rejects
    /// the exchange. On any failure the PKCE state is cleaned (codes are
    /// single-use).
    pub async fn send_code(&self, payload: &str) -> AuthResult<OAuthCredential> {
        if *self.phase.lock().await != OAuthPhase::AwaitingCode {
            return Err(AuthError::OAuthNotInProgress);
        }
        let pkce = self
            .pkce
            .lock()
            .await
            .clone()
            .ok_or(AuthError::OAuthNotInProgress)?;

        let (code, returned_state) = parse_callback_payload(payload);
        if let Some(returned_state) = returned_state {
            if returned_state != pkce.state {
                self.clean_up().await?;
                return Err(AuthError::OAuthStateMismatch);
            }
        }

        *self.phase.lock().await = OAuthPhase::Exchanging;
        let result = self.exchange(&code, &pkce.code_verifier).await;

        match result {
            Ok(cred) => {
                self.clean_up().await?;
                Ok(cred)
            }
            Err(e) => {
                self.clean_up().await?;
                Err(e)
            }
        }
    }

    async fn exchange(&self, code: &str, code_verifier: &str) -> AuthResult<OAuthCredential> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::OAuthExchangeFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::OAuthExchangeFailed(e.to_string()))?;

        let account = parsed.account.unwrap_or(TokenResponseAccount {
            email: String::new(),
            uuid: String::new(),
            organization_name: String::new(),
            organization_uuid: String::new(),
        });

        Ok(OAuthCredential {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in),
            account_info: AccountInfo {
                email: account.email,
                account_uuid: account.uuid,
                org_name: account.organization_name,
                org_uuid: account.organization_uuid,
            },
            version: OAuthCredential::CURRENT_VERSION,
        })
    }

    async fn clean_up(&self) -> AuthResult<()> {
        *self.pkce.lock().await = None;
        *self.phase.lock().await = OAuthPhase::Idle;
        remove_if_present(&self.state_path).await?;
        Ok(())
    }

    async fn persist(&self, pkce: &PkceState) -> AuthResult<()> {
        let bytes = serde_json::to_vec_pretty(pkce)?;
        write_atomic(&self.guard, &self.state_path, &bytes).await?;
        Ok(())
    }
}

/// Refresh an access token using `refresh_token` against `config`.
///
/// # Errors
///
/// Returns [`AuthError::OAuthExchangeFailed`] if the token endpoint
/// rejects the refresh.
pub async fn refresh_token(
    http: &reqwest::Client,
    config: &OAuthProviderConfig,
    refresh_token: &str,
) -> AuthResult<OAuthCredential> {
    let response = http
        .post(&config.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(AuthError::OAuthExchangeFailed(format!(
            "refresh endpoint returned {status}"
        )));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::OAuthExchangeFailed(e.to_string()))?;
    let account = parsed.account.unwrap_or(TokenResponseAccount {
        email: String::new(),
        uuid: String::new(),
        organization_name: String::new(),
        organization_uuid: String::new(),
    });

    Ok(OAuthCredential {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token,
        expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in),
        account_info: AccountInfo {
            email: account.email,
            account_uuid: account.uuid,
            org_name: account.organization_name,
            org_uuid: account.organization_uuid,
        },
        version: OAuthCredential::CURRENT_VERSION,
    })
}

/// Parses the callback payload in any of the four forms the spec allows:
/// `code#state`, a full redirect URL, a raw code, or a direct long-lived
/// token (treated as a bare code with no state to check).
fn parse_callback_payload(payload: &str) -> (String, Option<String>) {
    let trimmed = payload.trim();

    if let Ok(url) = url::Url::parse(trimmed) {
        let mut code = None;
        let mut state = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "code" => code = Some(v.to_string()),
                "state" => state = Some(v.to_string()),
                _ => {}
            }
        }
        if let Some(code) = code {
            return (code, state);
        }
    }

    if let Some((code, state)) = trimmed.split_once('#') {
        return (code.to_string(), Some(state.to_string()));
    }

    (trimmed.to_string(), None)
}

fn random_url_safe_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
