use std::fmt;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use super::TwitchError;
use crate::db::services::{account_service, token_service};
use crate::server::config::AppConfig;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// The identity a bearer token is resolved for: the application itself, or
/// one tracked account identified by its upstream id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    App,
    Account(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::App => write!(f, "app"),
            Principal::Account(id) => write!(f, "account {id}"),
        }
    }
}

/// Resolves and replaces bearer tokens. `refresh` supersedes exactly one
/// credential and never retries internally; the single-retry policy lives
/// in the request client.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn resolve(&self, principal: &Principal) -> Result<String, TwitchError>;
    async fn refresh(
        &self,
        principal: &Principal,
        failed_token: &str,
    ) -> Result<String, TwitchError>;
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Vec<String>,
}

/// Owns all credential state. Callers get tokens by value and never touch
/// the stored rows directly.
pub struct TokenAuthority {
    db: DatabaseConnection,
    http: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    // Serializes app-token replacement so concurrent refreshes cannot mint
    // duplicate rows.
    refresh_guard: Mutex<()>,
}

impl TokenAuthority {
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            http: Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: TOKEN_URL.to_string(),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Client-credential exchange. Persists the minted token before
    /// returning it.
    async fn mint_app_token(&self, scopes: &[String]) -> Result<String, TwitchError> {
        let mut params = vec![
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("grant_type", "client_credentials".to_string()),
        ];
        if !scopes.is_empty() {
            params.push(("scope", scopes.join(" ")));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TwitchError::RefreshFailed(format!("token endpoint unreachable: {e}")))?;
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TwitchError::RefreshFailed(format!(
                "client credential exchange rejected: {body}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TwitchError::InvalidResponse(e.to_string()))?;

        let ttl = token.expires_in.ok_or_else(|| {
            TwitchError::InvalidResponse("token response missing expires_in".to_string())
        })?;
        let expires_at = Utc::now() + Duration::seconds(ttl);
        token_service::store(
            &self.db,
            token.access_token.clone(),
            expires_at,
            token.scope.join(" "),
        )
        .await?;
        info!("Minted new app token, valid until {}", expires_at);
        Ok(token.access_token)
    }

    /// Delete-then-recreate, carrying the superseded token's scope set
    /// forward.
    async fn refresh_app_token(&self, failed_token: &str) -> Result<String, TwitchError> {
        let _guard = self.refresh_guard.lock().await;

        // A concurrent caller may already have replaced the failed token.
        if let Some(current) = token_service::current(&self.db).await? {
            if current.access_token != failed_token {
                return Ok(current.access_token);
            }
        }

        let scopes = match token_service::find_by_value(&self.db, failed_token).await? {
            Some(stale) => {
                token_service::delete_by_value(&self.db, &stale.access_token).await?;
                if stale.scopes.is_empty() {
                    Vec::new()
                } else {
                    stale.scopes.split(' ').map(str::to_string).collect()
                }
            }
            None => Vec::new(),
        };
        self.mint_app_token(&scopes).await
    }

    /// Refresh-token grant for a user-scoped credential. An upstream
    /// rejection (revoked authorization) surfaces as `RefreshFailed`.
    async fn refresh_account_token(&self, twitch_id: &str) -> Result<String, TwitchError> {
        let account = account_service::find_by_twitch_id(&self.db, twitch_id)
            .await?
            .ok_or_else(|| TwitchError::NoCredential(twitch_id.to_string()))?;
        let refresh_token = account
            .refresh_token
            .clone()
            .ok_or_else(|| TwitchError::NoCredential(twitch_id.to_string()))?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TwitchError::RefreshFailed(format!("token endpoint unreachable: {e}")))?;
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TwitchError::RefreshFailed(format!(
                "refresh rejected for account {twitch_id}: {body}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TwitchError::InvalidResponse(e.to_string()))?;

        let expires_at = token.expires_in.map(|ttl| Utc::now() + Duration::seconds(ttl));
        let access_token = token.access_token.clone();
        account_service::update_tokens(
            &self.db,
            account,
            token.access_token,
            token.refresh_token,
            expires_at,
        )
        .await?;
        info!("Refreshed user token for account {}", twitch_id);
        Ok(access_token)
    }
}

#[async_trait]
impl TokenSource for TokenAuthority {
    async fn resolve(&self, principal: &Principal) -> Result<String, TwitchError> {
        match principal {
            Principal::App => {
                if let Some(token) = token_service::current(&self.db).await? {
                    return Ok(token.access_token);
                }
                self.mint_app_token(&[]).await
            }
            Principal::Account(twitch_id) => {
                let account = account_service::find_by_twitch_id(&self.db, twitch_id)
                    .await?
                    .ok_or_else(|| TwitchError::NoCredential(twitch_id.clone()))?;
                account
                    .access_token
                    .ok_or_else(|| TwitchError::NoCredential(twitch_id.clone()))
            }
        }
    }

    async fn refresh(
        &self,
        principal: &Principal,
        failed_token: &str,
    ) -> Result<String, TwitchError> {
        match principal {
            Principal::App => self.refresh_app_token(failed_token).await,
            Principal::Account(twitch_id) => self.refresh_account_token(twitch_id).await,
        }
    }
}
