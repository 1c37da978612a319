//! Client-credentials access token with a pluggable cache
//!
//! [`TokenCache::get_token`] returns the stored credential while it is
//! unexpired and otherwise performs exactly one token exchange, persisting
//! the result before handing the token out. Expiry is recorded 60 seconds
//! ahead of the provider's TTL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pn_core::GraphConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::client::http_client;
use crate::error::{GraphError, Result};

/// Scope for application permissions on Graph
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Subtracted from the provider TTL when computing `expires_at`
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The persisted credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedCredential {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Build from a token response received at `issued_at`
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            expires_at: issued_at + Duration::seconds(response.expires_in - EXPIRY_MARGIN_SECS),
        }
    }

    /// Usable only while `now < expires_at`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Token endpoint success body
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// Token endpoint error body
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

// =============================================================================
// Credential storage
// =============================================================================

/// Backing store for the single cached credential.
///
/// Each call reads or writes the whole record.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<CachedCredential>>;

    async fn save(&self, credential: &CachedCredential) -> Result<()>;
}

#[async_trait]
impl<S: TokenStore + ?Sized> TokenStore for Arc<S> {
    async fn load(&self) -> Result<Option<CachedCredential>> {
        (**self).load().await
    }

    async fn save(&self, credential: &CachedCredential) -> Result<()> {
        (**self).save(credential).await
    }
}

/// JSON file store (`graph_token.json` by default)
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<CachedCredential>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                // A corrupt cache is replaced by the next exchange
                warn!(
                    "Ignoring unreadable token cache {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, credential: &CachedCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// In-process store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credential: Mutex<Option<CachedCredential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: CachedCredential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<CachedCredential>> {
        let guard = self
            .credential
            .lock()
            .map_err(|_| GraphError::TokenStore("token store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, credential: &CachedCredential) -> Result<()> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| GraphError::TokenStore("token store lock poisoned".to_string()))?;
        *guard = Some(credential.clone());
        Ok(())
    }
}

// =============================================================================
// Token cache
// =============================================================================

/// Acquires and caches the Graph access token
pub struct TokenCache<S> {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    store: S,
}

impl<S: TokenStore> TokenCache<S> {
    /// Create a token cache for the configured tenant and app registration
    pub fn new(config: &GraphConfig, store: S) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            store,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return a usable access token, exchanging credentials only when the
    /// cached one is absent or expired.
    pub async fn get_token(&self) -> Result<String> {
        if let Some(credential) = self.store.load().await? {
            if credential.is_valid_at(Utc::now()) {
                debug!("Using cached Graph token (expires {})", credential.expires_at);
                return Ok(credential.access_token);
            }
            debug!("Cached Graph token expired at {}", credential.expires_at);
        }

        let credential = self.exchange().await?;
        self.store.save(&credential).await?;
        info!("Graph token refreshed (expires {})", credential.expires_at);

        Ok(credential.access_token)
    }

    /// One client-credentials exchange against the token endpoint
    async fn exchange(&self) -> Result<CachedCredential> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", GRAPH_DEFAULT_SCOPE),
        ];

        debug!("POST {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => format!("{} - {}: {}", status, err.error, err.error_description),
                Err(_) => format!("{} - {}", status, body),
            };
            error!("Graph token request failed: {}", detail);
            return Err(GraphError::Auth(detail));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedCredential::from_response(token, Utc::now()))
    }
}
