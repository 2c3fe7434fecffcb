// Match-history source for one identity and page, plus bounded retry.
//
// A page that still fails after the last attempt is reported as a
// `FetchFailure` and contributes zero records; it never aborts the run.

use std::time::Duration;

use async_trait::async_trait;
use pennant_core::config::SourceConfig;
use pennant_league::record::RawMatchRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed body from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Anything that can serve one page of an identity's match history.
#[async_trait]
pub trait MatchSource: Send + Sync {
    async fn fetch_page(
        &self,
        identity: &str,
        page: u32,
    ) -> Result<Vec<RawMatchRecord>, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// `GET <url>?username=<identity>&platform=<platform>&page=<page>`.
#[derive(Debug, Clone)]
pub struct HttpMatchSource {
    http: reqwest::Client,
    url: String,
    platform: String,
}

impl HttpMatchSource {
    pub fn new(
        url: impl Into<String>,
        platform: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pennant/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            platform: platform.into(),
        })
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self, reqwest::Error> {
        Self::new(&source.url, &source.platform, source.timeout())
    }
}

#[async_trait]
impl MatchSource for HttpMatchSource {
    async fn fetch_page(
        &self,
        identity: &str,
        page: u32,
    ) -> Result<Vec<RawMatchRecord>, FetchError> {
        let page = page.to_string();
        let network = |source: reqwest::Error| FetchError::Network {
            url: self.url.clone(),
            source,
        };

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("username", identity),
                ("platform", self.platform.as_str()),
                ("page", page.as_str()),
            ])
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.text().await.map_err(network)?;
        parse_game_history(&body).map_err(|source| FetchError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GameHistoryPage {
    #[serde(default)]
    game_history: Option<Vec<Value>>,
}

/// Decode a response body. A missing or null `game_history` is an empty page.
/// Elements that do not decode are dropped one by one.
pub fn parse_game_history(body: &str) -> Result<Vec<RawMatchRecord>, serde_json::Error> {
    let page: Option<GameHistoryPage> = serde_json::from_str(body)?;
    let items = page.and_then(|p| p.game_history).unwrap_or_default();
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("skipping undecodable match entry: {e}");
                None
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first. Zero is treated as one.
    pub attempts: u32,
    pub delay: Duration,
    /// Upper bound on each single try.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(source: &SourceConfig) -> Self {
        Self {
            attempts: source.attempts,
            delay: source.retry_delay(),
            timeout: source.timeout(),
        }
    }
}

/// A page that produced no data after every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub identity: String,
    pub page: u32,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PageFetch {
    pub records: Vec<RawMatchRecord>,
    pub failure: Option<FetchFailure>,
}

pub async fn fetch_with_retry(
    source: &dyn MatchSource,
    identity: &str,
    page: u32,
    policy: RetryPolicy,
) -> PageFetch {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = tokio::time::timeout(policy.timeout, source.fetch_page(identity, page))
            .await
            .unwrap_or(Err(FetchError::Timeout(policy.timeout)));
        match result {
            Ok(records) => {
                debug!(identity, page, attempt, count = records.len(), "page fetched");
                return PageFetch {
                    records,
                    failure: None,
                };
            }
            Err(e) => {
                debug!(identity, page, attempt, error = %e, "fetch attempt failed");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    let message = last_error.map(|e| e.to_string()).unwrap_or_default();
    warn!(identity, page, attempts, "no data after retries: {message}");
    PageFetch {
        records: Vec::new(),
        failure: Some(FetchFailure {
            identity: identity.to_string(),
            page,
            attempts,
            message,
        }),
    }
}
