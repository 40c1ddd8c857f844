//! JSON API client with challenge-aware retries.
//!
//! A request is retried only for failures that can clear up on their own:
//! anti-bot challenges (long backoff tier), throttling and gateway errors,
//! and socket-level errors (short tier). Every other status, 404 included,
//! is returned to the caller immediately.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::rate_limiter::RateLimiter;
use crate::config::ApiConfig;
use crate::retry::{BackoffConfig, BackoffTier, Sleeper, TokioSleeper};

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Connection-level failure: nothing usable came back
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

/// Failure of a single logical fetch, after retries
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("anti-bot challenge persisted after {attempts} attempts: {url}")]
    Challenge { url: String, attempts: usize },

    #[error("not found (404): {url}")]
    NotFound { url: String },

    #[error("HTTP {status}: {url}")]
    Status { url: String, status: u16 },

    #[error("network error on {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn is_challenge(&self) -> bool {
        matches!(self, FetchError::Challenge { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    /// Operator-facing hint for failures that need more than a rerun
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            FetchError::Challenge { .. } => Some(
                "the API is actively blocking this client; wait 15-30 minutes before retrying, \
                 or switch network/VPN or harvest a browser session",
            ),
            _ => None,
        }
    }
}

/// Network seam: performs one GET and reports the raw outcome
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport with browser-like headers and a fixed timeout
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(api: &ApiConfig, timeout: Duration) -> anyhow::Result<Self> {
        use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&api.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_str(&api.accept)?);
        headers.insert(REFERER, HeaderValue::from_str(&api.referer)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| TransportError {
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError {
            message: format!("failed to read body: {e}"),
        })?;
        Ok(RawResponse { status, body })
    }
}

/// How a non-success response should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Challenge,
    Throttled,
    NotFound,
    Fatal,
}

fn classify(response: &RawResponse) -> Classification {
    match response.status {
        403 if is_challenge_body(&response.body) => Classification::Challenge,
        404 => Classification::NotFound,
        429 | 502 | 503 => Classification::Throttled,
        _ => Classification::Fatal,
    }
}

/// The upstream marks challenges with `{"error": {"code": 403, "reason": "challenge"}}`.
/// A 403 whose body is not JSON at all (an HTML interstitial) counts too.
fn is_challenge_body(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return true;
    };
    let error = &value["error"];
    error["code"].as_i64() == Some(403)
        && error["reason"]
            .as_str()
            .is_some_and(|r| r.eq_ignore_ascii_case("challenge"))
}

/// Client for the upstream JSON API
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    backoff: BackoffConfig,
    limiter: RateLimiter,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        backoff: BackoffConfig,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            sleeper: Arc::new(TokioSleeper),
            backoff,
            limiter,
        }
    }

    /// Replace the sleeper used between retries
    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url` and decode the JSON body
    pub async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.fetch_body(url).await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// GET `url`, retrying per tier, and return the raw success body
    pub async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        let mut challenge_retries = 0usize;
        let mut throttle_retries = 0usize;
        let mut attempts = 0usize;

        loop {
            self.limiter.acquire().await;
            attempts += 1;

            let (tier, retry, failure) = match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    if attempts > 1 {
                        debug!("{} succeeded after {} attempts", url, attempts);
                    }
                    return Ok(response.body);
                }
                Ok(response) => match classify(&response) {
                    Classification::Challenge => (
                        BackoffTier::Challenge,
                        challenge_retries,
                        FetchError::Challenge {
                            url: url.to_string(),
                            attempts,
                        },
                    ),
                    Classification::Throttled => (
                        BackoffTier::Throttle,
                        throttle_retries,
                        FetchError::Status {
                            url: url.to_string(),
                            status: response.status,
                        },
                    ),
                    Classification::NotFound => {
                        return Err(FetchError::NotFound {
                            url: url.to_string(),
                        })
                    }
                    Classification::Fatal => {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: response.status,
                        })
                    }
                },
                Err(source) => (
                    BackoffTier::Throttle,
                    throttle_retries,
                    FetchError::Network {
                        url: url.to_string(),
                        source,
                    },
                ),
            };

            let Some(delay) = self.backoff.delay_for(tier, retry) else {
                debug!(
                    "Giving up on {} after {} attempts (budget {})",
                    url,
                    attempts,
                    self.backoff.max_attempts()
                );
                return Err(failure);
            };

            warn!(
                "{} (attempt {}); retrying in {:?}",
                failure, attempts, delay
            );
            match tier {
                BackoffTier::Challenge => challenge_retries += 1,
                BackoffTier::Throttle => throttle_retries += 1,
            }
            self.sleeper.sleep(delay).await;
        }
    }
}
