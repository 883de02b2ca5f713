//! Bearer-token sources: a personal access token or a GitHub App installation.

use crate::config::{CrawlConfig, GitHubAppConfig};
use crate::error::ApiError;
use crate::providers::github_api::RateLimitedClient;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;
use tracing::info;

/// Installation tokens are refreshed this long before they expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

pub(crate) type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send + 'a>>;

pub enum Credentials {
    Token(String),
    App(GitHubAppAuth),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Credentials::Token([REDACTED])"),
            Self::App(app) => write!(f, "Credentials::App({:?})", app),
        }
    }
}

impl Credentials {
    /// App credentials win when configured; otherwise the personal token is used.
    pub fn from_config(config: &CrawlConfig) -> Result<Self, ApiError> {
        if let Some(app) = &config.github_app {
            return Ok(Self::App(GitHubAppAuth::from_config(app)?));
        }
        match config.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(Self::Token(token.to_string())),
            _ => Err(ApiError::Auth("no token or GitHub App credentials configured".to_string())),
        }
    }

    /// The App exchange sends through `client`, so its future is boxed to break the cycle.
    pub(crate) fn bearer_token<'a>(&'a self, client: &'a RateLimitedClient) -> TokenFuture<'a> {
        match self {
            Self::Token(token) => {
                let token = token.clone();
                Box::pin(async move { Ok(token) })
            }
            Self::App(app) => Box::pin(app.installation_token(client)),
        }
    }
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Clone, Deserialize)]
struct InstallationToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::minutes(REFRESH_MARGIN_MINUTES) > now
    }
}

/// GitHub App identity that exchanges a signed JWT for installation tokens.
pub struct GitHubAppAuth {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
    cached: RwLock<Option<InstallationToken>>,
}

impl fmt::Debug for GitHubAppAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubAppAuth")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

impl GitHubAppAuth {
    pub fn from_config(config: &GitHubAppConfig) -> Result<Self, ApiError> {
        let pem = config
            .private_key_pem()
            .map_err(|e| ApiError::Auth(e.to_string()))?;
        Self::new(config.app_id, config.installation_id, pem.as_bytes())
    }

    pub fn new(app_id: u64, installation_id: u64, private_key_pem: &[u8]) -> Result<Self, ApiError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| ApiError::Auth(format!("invalid GitHub App private key: {}", e)))?;
        Ok(Self {
            app_id,
            installation_id,
            key,
            cached: RwLock::new(None),
        })
    }

    fn app_jwt(&self, now: DateTime<Utc>) -> Result<String, ApiError> {
        // Backdated to tolerate clock drift; GitHub rejects lifetimes over ten minutes.
        let claims = AppClaims {
            iat: (now - Duration::seconds(60)).timestamp(),
            exp: (now + Duration::minutes(9)).timestamp(),
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ApiError::Auth(format!("failed to sign app JWT: {}", e)))
    }

    async fn installation_token(&self, client: &RateLimitedClient) -> Result<String, ApiError> {
        let now = Utc::now();
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.token.clone());
            }
        }

        let url = client.url(&format!("/app/installations/{}/access_tokens", self.installation_id));
        let response = client.post_with_bearer(&url, &self.app_jwt(now)?).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Auth(format!(
                "installation token exchange returned {}: {}",
                status, body
            )));
        }
        let fresh: InstallationToken = response.json().await?;
        info!(
            installation_id = self.installation_id,
            expires_at = %fresh.expires_at,
            "obtained GitHub App installation token"
        );
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
