#![allow(dead_code)]

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use scorecards_sync::config::SyncConfig;
use scorecards_sync::error::SyncError;
use scorecards_sync::fetch::{HttpRequest, HttpResponse, HttpTransport};

pub const API: &str = "https://api.test";
pub const MIRROR: &str = "https://raw.test";

pub fn test_config(settings_dir: &Path) -> SyncConfig {
    SyncConfig {
        repo_owner: "acme".to_string(),
        repo_name: "scorecards".to_string(),
        catalog_branch: "catalog".to_string(),
        api_base: API.to_string(),
        mirror_base: MIRROR.to_string(),
        port: 0,
        settings_path: settings_dir.join("settings.json"),
        fetch_timeout: None,
    }
}

pub fn contents_url(path: &str) -> String {
    format!("{}/repos/acme/scorecards/contents/{}?ref=catalog", API, path)
}

pub fn mirror_url(path: &str) -> String {
    format!("{}/acme/scorecards/catalog/{}", MIRROR, path)
}

/// Case-insensitive header lookup on a recorded request.
pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

enum Reply {
    Status(u16, String),
    NetworkError,
}

struct Rule {
    prefix: String,
    reply: Reply,
}

/// Answers by URL prefix, first matching rule wins; anything unmatched is a 404.
/// Every request is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: impl Into<String>, status: u16, body: impl Into<String>) {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.into(),
            reply: Reply::Status(status, body.into()),
        });
    }

    pub fn fail(&self, prefix: impl Into<String>) {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.into(),
            reply: Reply::NetworkError,
        });
    }

    /// Delay every reply by `latency` on the tokio clock.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Drop every rule for this prefix, so later requests use the next match.
    pub fn clear(&self, prefix: &str) {
        self.rules.lock().unwrap().retain(|r| r.prefix != prefix);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .count()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, SyncError>> {
        let reply = {
            let rules = self.rules.lock().unwrap();
            match rules.iter().find(|r| request.url.starts_with(&r.prefix)) {
                Some(Rule {
                    reply: Reply::Status(status, body),
                    ..
                }) => Ok(HttpResponse {
                    status: *status,
                    body: Bytes::from(body.clone()),
                }),
                Some(Rule {
                    reply: Reply::NetworkError,
                    ..
                }) => Err(SyncError::Transport("connection refused".to_string())),
                None => Ok(HttpResponse {
                    status: 404,
                    body: Bytes::from_static(b"{\"message\":\"Not Found\"}"),
                }),
            }
        };
        self.requests.lock().unwrap().push(request);
        let latency = *self.latency.lock().unwrap();
        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            reply
        }
        .boxed()
    }
}
