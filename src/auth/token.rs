//! Google "authorized user" credential file (`token.json`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::TokenSource;
use crate::error::AuthError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed early.
const EXPIRY_SKEW_SECS: i64 = 60;

/// On-disk credential, field names as written by Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Fields this crate does not read (`universe_domain`, `account`, ...),
    /// kept so a write-back does not drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl CredentialFile {
    /// True if the access token is present and not about to expire.
    /// A token without an expiry is treated as valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (Some(token), Some(expiry)) if !token.is_empty() => {
                expiry - chrono::Duration::seconds(EXPIRY_SKEW_SECS) > now
            }
            (Some(token), None) => !token.is_empty(),
            _ => false,
        }
    }

    fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
            && !self.client_id.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Credential backed by a `token.json` file, refreshed with the
/// refresh-token grant and written back after each refresh.
pub struct AuthorizedUserToken {
    path: PathBuf,
    state: Mutex<CredentialFile>,
    client: reqwest::Client,
}

impl AuthorizedUserToken {
    /// Load the credential file. A missing file is fatal.
    pub async fn load(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::MissingCredential {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(AuthError::Io(e)),
        };

        let credential: CredentialFile =
            serde_json::from_str(&raw).map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        if credential.token.is_none() && !credential.can_refresh() {
            return Err(AuthError::InvalidCredential(
                "neither an access token nor a refresh token is present".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::RefreshFailed(format!("HTTP client: {e}")))?;

        debug!(path = %path.display(), "Loaded OAuth credential");
        Ok(Self {
            path,
            state: Mutex::new(credential),
            client,
        })
    }

    async fn refresh(&self, credential: &mut CredentialFile) -> Result<(), AuthError> {
        if !credential.can_refresh() {
            return Err(AuthError::NotRefreshable);
        }
        let resp = self
            .client
            .post(&credential.token_uri)
            .form(&[
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
                ("refresh_token", credential.refresh_token.as_deref().unwrap_or_default()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("status {status}: {body}")));
        }

        let refreshed: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("bad token response: {e}")))?;

        credential.token = Some(refreshed.access_token);
        credential.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        // The refreshed token is still usable for this process if the write fails.
        match serde_json::to_string_pretty(&*credential) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&self.path, json).await {
                    warn!(path = %self.path.display(), error = %e, "Failed to persist refreshed token");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize refreshed token"),
        }

        info!("OAuth access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl TokenSource for AuthorizedUserToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut credential = self.state.lock().await;
        if !credential.is_valid_at(Utc::now()) {
            self.refresh(&mut credential).await?;
        }
        credential.token.clone().ok_or(AuthError::NotRefreshable)
    }
}

/// Fixed bearer token, e.g. from an environment variable.
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.expose_secret().to_string())
    }
}
