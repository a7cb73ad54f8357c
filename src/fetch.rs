use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenStore;
use crate::config::{SyncConfig, JSON_ACCEPT_HEADER, RAW_ACCEPT_HEADER, USER_AGENT};
use crate::error::SyncError;

// --- Transport seam ---

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. Errors are network-level only; any HTTP status is a response.
pub trait HttpTransport: Send + Sync {
    fn get(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, SyncError>>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, SyncError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, SyncError>> {
        async move {
            let mut builder = self.client.get(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(*name, value);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?;

            Ok(HttpResponse { status, body })
        }
        .boxed()
    }
}

// --- Hybrid fetch ---

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub payload: Bytes,
    /// True when the authenticated API served the payload; false means the
    /// public mirror did and the content may lag behind the branch.
    pub used_api: bool,
}

/// Resolves catalog paths through the authenticated contents API when a token
/// is available, and through the public raw mirror otherwise or on any
/// primary failure.
pub struct HybridFetchClient {
    config: Arc<SyncConfig>,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
}

impl HybridFetchClient {
    pub fn new(
        config: Arc<SyncConfig>,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenStore>,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn fetch(&self, path: &str) -> Result<FetchOutcome, SyncError> {
        if let Some(token) = self.tokens.get().await {
            match self.fetch_primary(path, &token).await {
                Ok(payload) => {
                    return Ok(FetchOutcome {
                        payload,
                        used_api: true,
                    })
                }
                Err(e) => {
                    warn!("API fetch of {} failed ({}), falling back to mirror", path, e);
                }
            }
        }

        let payload = self.fetch_mirror(path).await?;
        Ok(FetchOutcome {
            payload,
            used_api: false,
        })
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<(T, bool), SyncError> {
        let outcome = self.fetch(path).await?;
        let value = serde_json::from_slice(&outcome.payload)?;
        Ok((value, outcome.used_api))
    }

    async fn fetch_primary(&self, path: &str, token: &str) -> Result<Bytes, SyncError> {
        let url = self.config.contents_url(path);
        let request = HttpRequest::get(url.clone())
            .header("Accept", RAW_ACCEPT_HEADER)
            .header("Authorization", format!("token {}", token));

        let resp = self.transport.get(request).await?;
        match resp.status {
            401 | 403 | 429 => {
                debug!("Primary API rejected {} with {} (auth or rate limit)", path, resp.status);
                Err(SyncError::Http {
                    status: resp.status,
                    url,
                })
            }
            _ if !resp.is_success() => Err(SyncError::Http {
                status: resp.status,
                url,
            }),
            _ => Ok(resp.body),
        }
    }

    /// Unauthenticated read from the raw mirror, always cache-busted.
    pub async fn fetch_mirror(&self, path: &str) -> Result<Bytes, SyncError> {
        let url = cache_busted(&self.config.mirror_url(path), "t")?;
        let resp = self.transport.get(HttpRequest::get(url.clone())).await?;
        if !resp.is_success() {
            return Err(SyncError::Http {
                status: resp.status,
                url,
            });
        }
        Ok(resp.body)
    }

    /// GET against the REST API, authenticated when a token is present.
    pub async fn api_get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, SyncError> {
        let url = cache_busted(&self.config.api_url(endpoint), "_t")?;
        let mut request = HttpRequest::get(url.clone()).header("Accept", JSON_ACCEPT_HEADER);
        if let Some(token) = self.tokens.get().await {
            request = request.header("Authorization", format!("token {}", token));
        }

        let resp = self.transport.get(request).await?;
        if !resp.is_success() {
            return Err(SyncError::Http {
                status: resp.status,
                url,
            });
        }
        Ok(serde_json::from_slice(&resp.body)?)
    }

    /// Status of a direct API call with an explicit token, bypassing the store.
    pub async fn probe_with_token(&self, endpoint: &str, token: &str) -> Result<u16, SyncError> {
        let request = HttpRequest::get(self.config.api_url(endpoint))
            .header("Accept", JSON_ACCEPT_HEADER)
            .header("Authorization", format!("token {}", token));
        let resp = self.transport.get(request).await?;
        Ok(resp.status)
    }
}

fn cache_busted(base: &str, param: &str) -> Result<String, SyncError> {
    let mut url =
        Url::parse(base).map_err(|e| SyncError::Other(format!("Invalid URL {}: {}", base, e)))?;
    url.query_pairs_mut()
        .append_pair(param, &Utc::now().timestamp_millis().to_string());
    Ok(url.into())
}
