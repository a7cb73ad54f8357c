use serde::Serialize;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::fetch::HybridFetchClient;

/// Personal access token held in process memory only. Nothing here is ever
/// written to disk; a restart always starts without a token.
#[derive(Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").field("token", &"<redacted>").finish()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Option<&str>) -> Self {
        Self {
            token: RwLock::new(normalize(token)),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn set(&self, token: Option<&str>) {
        *self.token.write().await = normalize(token);
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

fn normalize(token: Option<&str>) -> Option<String> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Missing,
    Valid,
    /// The API answered 401 for this token.
    Rejected,
    /// Any other failure; the token may still be good.
    Unverified,
}

/// Probe `GET /user` with the given token.
pub async fn validate_token(client: &HybridFetchClient, token: &str) -> TokenStatus {
    match client.probe_with_token("/user", token.trim()).await {
        Ok(status) if (200..300).contains(&status) => TokenStatus::Valid,
        Ok(401) => TokenStatus::Rejected,
        Ok(status) => {
            warn!("Token validation returned status {}", status);
            TokenStatus::Unverified
        }
        Err(e) => {
            warn!("Token validation failed: {}", e);
            TokenStatus::Unverified
        }
    }
}

/// Store the token only when the API confirms it.
pub async fn validate_and_save(client: &HybridFetchClient, token: &str) -> TokenStatus {
    let token = token.trim();
    if token.is_empty() {
        return TokenStatus::Missing;
    }

    let status = validate_token(client, token).await;
    if status == TokenStatus::Valid {
        client.tokens().set(Some(token)).await;
        info!("GitHub token validated and stored in memory");
    }
    status
}

/// Re-check the stored token; a confirmed 401 clears it.
pub async fn revalidate(client: &HybridFetchClient) -> TokenStatus {
    let Some(token) = client.tokens().get().await else {
        return TokenStatus::Missing;
    };

    let status = validate_token(client, &token).await;
    if status == TokenStatus::Rejected {
        warn!("Stored GitHub token was rejected; clearing it");
        client.tokens().clear().await;
    }
    status
}
